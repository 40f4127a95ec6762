//! In-process speaker request store.
//!
//! Requests are partitioned by event. Each partition sits behind its own
//! mutex, so mutations for one event serialise while different events never
//! contend. The pair uniqueness check, the write, and the re-rank all happen
//! under the partition lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::ports::{
    SpeakerRequestRepository, SpeakerRequestRepositoryError, TransitionOutcome,
};
use crate::domain::{
    EventId, RequestId, RequestMessage, SiblingEffect, SpeakerId, SpeakerRequest, Transition,
    TransitionError, TransitionPlan, rank_pending,
};

#[derive(Debug, Default)]
struct EventPartition {
    requests: HashMap<RequestId, SpeakerRequest>,
    by_speaker: HashMap<SpeakerId, RequestId>,
}

impl EventPartition {
    fn rerank(&mut self, at: DateTime<Utc>) {
        let candidates = self
            .requests
            .values()
            .filter(|request| request.is_pending())
            .map(|request| (request.rank_candidate(), request.rank()))
            .collect::<Vec<_>>();
        for assignment in rank_pending(candidates).into_iter().filter(|a| a.changed) {
            if let Some(request) = self.requests.get_mut(&assignment.id) {
                request.assign_rank(assignment.rank, at);
            }
        }
    }

    fn pending_target(
        &mut self,
        id: &RequestId,
    ) -> Result<&mut SpeakerRequest, SpeakerRequestRepositoryError> {
        let request = self
            .requests
            .get_mut(id)
            .ok_or_else(|| SpeakerRequestRepositoryError::not_found(*id))?;
        if !request.is_pending() {
            return Err(SpeakerRequestRepositoryError::not_pending(*id, request.status()));
        }
        Ok(request)
    }
}

type Partition = Arc<Mutex<EventPartition>>;

fn poisoned(what: &str) -> SpeakerRequestRepositoryError {
    SpeakerRequestRepositoryError::query(format!("{what} lock poisoned"))
}

fn lock(
    partition: &Partition,
) -> Result<MutexGuard<'_, EventPartition>, SpeakerRequestRepositoryError> {
    partition.lock().map_err(|_| poisoned("event partition"))
}

fn transition_error(id: RequestId, error: TransitionError) -> SpeakerRequestRepositoryError {
    match error {
        TransitionError::NotPending { status } => {
            SpeakerRequestRepositoryError::not_pending(id, status)
        }
    }
}

/// Speaker request repository held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemorySpeakerRequestRepository {
    partitions: RwLock<HashMap<EventId, Partition>>,
    index: RwLock<HashMap<RequestId, EventId>>,
}

impl InMemorySpeakerRequestRepository {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn existing_partition(
        &self,
        event_id: &EventId,
    ) -> Result<Option<Partition>, SpeakerRequestRepositoryError> {
        let partitions = self.partitions.read().map_err(|_| poisoned("partition map"))?;
        Ok(partitions.get(event_id).cloned())
    }

    fn partition_for_write(
        &self,
        event_id: EventId,
    ) -> Result<Partition, SpeakerRequestRepositoryError> {
        if let Some(partition) = self.existing_partition(&event_id)? {
            return Ok(partition);
        }
        let mut partitions = self
            .partitions
            .write()
            .map_err(|_| poisoned("partition map"))?;
        Ok(Arc::clone(partitions.entry(event_id).or_default()))
    }

    fn partition_of(&self, id: &RequestId) -> Result<Partition, SpeakerRequestRepositoryError> {
        let event_id = self
            .index
            .read()
            .map_err(|_| poisoned("request index"))?
            .get(id)
            .copied()
            .ok_or_else(|| SpeakerRequestRepositoryError::not_found(*id))?;
        self.existing_partition(&event_id)?
            .ok_or_else(|| SpeakerRequestRepositoryError::not_found(*id))
    }
}

#[async_trait]
impl SpeakerRequestRepository for InMemorySpeakerRequestRepository {
    async fn find_by_id(
        &self,
        id: &RequestId,
    ) -> Result<Option<SpeakerRequest>, SpeakerRequestRepositoryError> {
        match self.partition_of(id) {
            Ok(partition) => Ok(lock(&partition)?.requests.get(id).cloned()),
            Err(SpeakerRequestRepositoryError::NotFound { .. }) => Ok(None),
            Err(other) => Err(other),
        }
    }

    async fn find_by_pair(
        &self,
        speaker_id: &SpeakerId,
        event_id: &EventId,
    ) -> Result<Option<SpeakerRequest>, SpeakerRequestRepositoryError> {
        let Some(partition) = self.existing_partition(event_id)? else {
            return Ok(None);
        };
        let guard = lock(&partition)?;
        Ok(guard
            .by_speaker
            .get(speaker_id)
            .and_then(|id| guard.requests.get(id))
            .cloned())
    }

    async fn list_pending_for_event(
        &self,
        event_id: &EventId,
    ) -> Result<Vec<SpeakerRequest>, SpeakerRequestRepositoryError> {
        let Some(partition) = self.existing_partition(event_id)? else {
            return Ok(Vec::new());
        };
        let mut pending = lock(&partition)?
            .requests
            .values()
            .filter(|request| request.is_pending())
            .cloned()
            .collect::<Vec<_>>();
        pending.sort_by_key(SpeakerRequest::rank);
        Ok(pending)
    }

    async fn insert_pending(
        &self,
        request: SpeakerRequest,
    ) -> Result<SpeakerRequest, SpeakerRequestRepositoryError> {
        let id = request.id();
        let event_id = request.event_id();
        let speaker_id = request.speaker_id();
        let at = request.created_at();

        let partition = self.partition_for_write(event_id)?;
        let mut guard = lock(&partition)?;
        if guard.by_speaker.contains_key(&speaker_id) {
            return Err(SpeakerRequestRepositoryError::duplicate_pair(
                speaker_id, event_id,
            ));
        }
        let mut index = self.index.write().map_err(|_| poisoned("request index"))?;
        guard.by_speaker.insert(speaker_id, id);
        guard.requests.insert(id, request);
        guard.rerank(at);
        index.insert(id, event_id);
        drop(index);

        let stored = guard
            .requests
            .get(&id)
            .cloned()
            .ok_or_else(|| SpeakerRequestRepositoryError::not_found(id))?;
        debug!(request_id = %id, event_id = %event_id, rank = ?stored.rank(), "stored in memory");
        Ok(stored)
    }

    async fn apply_transition(
        &self,
        id: &RequestId,
        plan: &TransitionPlan,
        responded_at: DateTime<Utc>,
    ) -> Result<TransitionOutcome, SpeakerRequestRepositoryError> {
        let partition = self.partition_of(id)?;
        let mut guard = lock(&partition)?;

        let target = guard.pending_target(id)?;
        target
            .apply(&plan.transition, responded_at)
            .map_err(|err| transition_error(*id, err))?;

        let mut rejected_siblings = Vec::new();
        if let SiblingEffect::RejectPending(reason) = &plan.siblings {
            let sibling_transition = Transition::Reject(reason.clone());
            for sibling in guard
                .requests
                .values_mut()
                .filter(|r| r.is_pending() && r.id() != *id)
            {
                sibling
                    .apply(&sibling_transition, responded_at)
                    .map_err(|err| transition_error(sibling.id(), err))?;
                rejected_siblings.push(sibling.id());
            }
        }
        rejected_siblings.sort();
        guard.rerank(responded_at);

        let request = guard
            .requests
            .get(id)
            .cloned()
            .ok_or_else(|| SpeakerRequestRepositoryError::not_found(*id))?;
        Ok(TransitionOutcome {
            request,
            rejected_siblings,
        })
    }

    async fn update_message(
        &self,
        id: &RequestId,
        message: Option<RequestMessage>,
        updated_at: DateTime<Utc>,
    ) -> Result<SpeakerRequest, SpeakerRequestRepositoryError> {
        let partition = self.partition_of(id)?;
        let mut guard = lock(&partition)?;
        let target = guard.pending_target(id)?;
        target
            .edit_message(message, updated_at)
            .map_err(|err| transition_error(*id, err))?;
        Ok(target.clone())
    }
}
