//! Speaker request domain service.
//!
//! Implements the command and query driving ports on top of the repository,
//! reference directory, and match scorer. Uniqueness and ranking are the
//! repository's responsibility; this service validates input, scores new
//! requests, chooses the transition plan, and translates port failures into
//! domain errors.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::domain::ports::{
    AcceptSpeakerRequest, CreateSpeakerRequest, EditSpeakerRequestMessage, ReferenceDirectory,
    ReferenceDirectoryError, RejectSpeakerRequest, SpeakerRequestCommand, SpeakerRequestPayload,
    SpeakerRequestQuery, SpeakerRequestRepository, SpeakerRequestRepositoryError,
    TransitionOutcome,
};
use crate::domain::{
    AcceptanceRules, Error, EventId, MatchScorer, RejectionReason, RequestId, RequestMessage,
    ScoringError, SpeakerId, SpeakerRequest, SpeakerRequestDraft, TextValidationError,
    TransitionPlan, storage_timestamp,
};

fn map_repository_error(error: SpeakerRequestRepositoryError) -> Error {
    match error {
        SpeakerRequestRepositoryError::Connection { message } => {
            debug!(%message, "speaker request store unreachable");
            Error::service_unavailable(format!("speaker request store unavailable: {message}"))
        }
        SpeakerRequestRepositoryError::Query { message } => {
            debug!(%message, "speaker request store query failed");
            Error::internal(format!("speaker request store error: {message}"))
        }
        SpeakerRequestRepositoryError::DuplicatePair {
            speaker_id,
            event_id,
        } => duplicate_error(speaker_id, event_id, None),
        SpeakerRequestRepositoryError::NotFound { request_id } => request_not_found(request_id),
        SpeakerRequestRepositoryError::NotPending { request_id, status } => {
            warn!(%request_id, %status, "transition refused on terminal request");
            Error::invalid_transition(format!(
                "speaker request {request_id} is {status}; only pending requests can change"
            ))
            .with_details(json!({
                "requestId": request_id,
                "status": status,
            }))
        }
    }
}

fn map_directory_error(error: ReferenceDirectoryError) -> Error {
    match error {
        ReferenceDirectoryError::Unavailable { message } => {
            debug!(%message, "reference directory unreachable");
            Error::service_unavailable(format!("reference directory unavailable: {message}"))
        }
    }
}

fn duplicate_error(speaker_id: SpeakerId, event_id: EventId, existing: Option<RequestId>) -> Error {
    warn!(%speaker_id, %event_id, existing_request_id = ?existing, "duplicate speaker request");
    let mut details = json!({
        "speakerId": speaker_id,
        "eventId": event_id,
    });
    if let Some(existing) = existing {
        details["existingRequestId"] = json!(existing);
    }
    Error::duplicate_request(format!(
        "a request already exists for speaker {speaker_id} and event {event_id}"
    ))
    .with_details(details)
}

fn request_not_found(request_id: RequestId) -> Error {
    Error::not_found(format!("speaker request {request_id} not found"))
        .with_details(json!({ "requestId": request_id }))
}

fn reference_not_found(field: &str, id: impl ToString) -> Error {
    let id = id.to_string();
    Error::not_found(format!("{field} {id} does not exist"))
        .with_details(json!({ "field": field, "id": id }))
}

fn text_error(error: TextValidationError) -> Error {
    let field = match &error {
        TextValidationError::Empty { field } | TextValidationError::TooLong { field, .. } => *field,
    };
    Error::invalid_request(error.to_string()).with_details(json!({ "field": field }))
}

fn scoring_error(error: ScoringError) -> Error {
    Error::invalid_request(error.to_string()).with_details(json!({ "field": error.field() }))
}

/// Speaker request service implementing the command and query ports.
#[derive(Clone)]
pub struct SpeakerRequestService<R, D> {
    requests: Arc<R>,
    directory: Arc<D>,
    scorer: Arc<dyn MatchScorer>,
    clock: Arc<dyn Clock>,
    rules: AcceptanceRules,
}

impl<R, D> SpeakerRequestService<R, D> {
    /// Create a service with non-exclusive acceptance.
    pub fn new(
        requests: Arc<R>,
        directory: Arc<D>,
        scorer: Arc<dyn MatchScorer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            requests,
            directory,
            scorer,
            clock,
            rules: AcceptanceRules::default(),
        }
    }

    /// Replace the acceptance rules.
    #[must_use]
    pub fn with_acceptance_rules(mut self, rules: AcceptanceRules) -> Self {
        self.rules = rules;
        self
    }

    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        storage_timestamp(self.clock.utc())
    }
}

impl<R, D> SpeakerRequestService<R, D>
where
    R: SpeakerRequestRepository,
    D: ReferenceDirectory,
{
    async fn ensure_references(&self, request: &CreateSpeakerRequest) -> Result<(), Error> {
        if !self
            .directory
            .speaker_exists(&request.speaker_id)
            .await
            .map_err(map_directory_error)?
        {
            return Err(reference_not_found("speakerId", request.speaker_id));
        }
        if !self
            .directory
            .event_exists(&request.event_id)
            .await
            .map_err(map_directory_error)?
        {
            return Err(reference_not_found("eventId", request.event_id));
        }
        if !self
            .directory
            .organizer_exists(&request.organizer_id)
            .await
            .map_err(map_directory_error)?
        {
            return Err(reference_not_found("organizerId", request.organizer_id));
        }
        Ok(())
    }

    async fn existing_for_pair(&self, speaker_id: SpeakerId, event_id: EventId) -> Option<RequestId> {
        match self.requests.find_by_pair(&speaker_id, &event_id).await {
            Ok(found) => found.map(|request| request.id()),
            Err(error) => {
                debug!(%error, "lookup of existing request after duplicate failed");
                None
            }
        }
    }

    async fn transition(
        &self,
        request_id: RequestId,
        plan: TransitionPlan,
    ) -> Result<TransitionOutcome, Error> {
        let outcome = self
            .requests
            .apply_transition(&request_id, &plan, self.now())
            .await
            .map_err(map_repository_error)?;
        info!(
            request_id = %request_id,
            event_id = %outcome.request.event_id(),
            status = %outcome.request.status(),
            rejected_siblings = outcome.rejected_siblings.len(),
            "speaker request transitioned"
        );
        Ok(outcome)
    }
}

#[async_trait]
impl<R, D> SpeakerRequestCommand for SpeakerRequestService<R, D>
where
    R: SpeakerRequestRepository,
    D: ReferenceDirectory,
{
    async fn create(&self, request: CreateSpeakerRequest) -> Result<SpeakerRequestPayload, Error> {
        let message = RequestMessage::optional(request.message.as_deref()).map_err(text_error)?;
        let match_score = self
            .scorer
            .score(&request.scoring_signals)
            .map_err(scoring_error)?;
        self.ensure_references(&request).await?;

        let CreateSpeakerRequest {
            speaker_id,
            event_id,
            organizer_id,
            ..
        } = request;

        if let Some(existing) = self
            .requests
            .find_by_pair(&speaker_id, &event_id)
            .await
            .map_err(map_repository_error)?
        {
            return Err(duplicate_error(speaker_id, event_id, Some(existing.id())));
        }

        let draft = SpeakerRequest::new_pending(SpeakerRequestDraft {
            id: RequestId::random(),
            speaker_id,
            event_id,
            organizer_id,
            message,
            match_score,
            created_at: self.now(),
        });

        let stored = match self.requests.insert_pending(draft).await {
            Ok(stored) => stored,
            Err(SpeakerRequestRepositoryError::DuplicatePair {
                speaker_id,
                event_id,
            }) => {
                let existing = self.existing_for_pair(speaker_id, event_id).await;
                return Err(duplicate_error(speaker_id, event_id, existing));
            }
            Err(other) => return Err(map_repository_error(other)),
        };

        info!(
            request_id = %stored.id(),
            event_id = %stored.event_id(),
            speaker_id = %stored.speaker_id(),
            match_score = stored.match_score().value(),
            rank = ?stored.rank(),
            "speaker request created"
        );
        Ok(stored.into())
    }

    async fn accept(&self, request: AcceptSpeakerRequest) -> Result<SpeakerRequestPayload, Error> {
        let outcome = self
            .transition(request.request_id, self.rules.accept_plan())
            .await?;
        Ok(outcome.request.into())
    }

    async fn reject(&self, request: RejectSpeakerRequest) -> Result<SpeakerRequestPayload, Error> {
        let reason = RejectionReason::new(&request.reason).map_err(text_error)?;
        let outcome = self
            .transition(request.request_id, self.rules.reject_plan(reason))
            .await?;
        Ok(outcome.request.into())
    }

    async fn edit_message(
        &self,
        request: EditSpeakerRequestMessage,
    ) -> Result<SpeakerRequestPayload, Error> {
        let message = RequestMessage::optional(request.message.as_deref()).map_err(text_error)?;
        let updated = self
            .requests
            .update_message(&request.request_id, message, self.now())
            .await
            .map_err(map_repository_error)?;
        info!(request_id = %updated.id(), "speaker request message updated");
        Ok(updated.into())
    }
}

#[async_trait]
impl<R, D> SpeakerRequestQuery for SpeakerRequestService<R, D>
where
    R: SpeakerRequestRepository,
    D: ReferenceDirectory,
{
    async fn get(&self, request_id: RequestId) -> Result<SpeakerRequestPayload, Error> {
        self.requests
            .find_by_id(&request_id)
            .await
            .map_err(map_repository_error)?
            .map(Into::into)
            .ok_or_else(|| request_not_found(request_id))
    }

    async fn list_ranked_pending(
        &self,
        event_id: EventId,
    ) -> Result<Vec<SpeakerRequestPayload>, Error> {
        let pending = self
            .requests
            .list_pending_for_event(&event_id)
            .await
            .map_err(map_repository_error)?;
        Ok(pending.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
#[path = "speaker_request_service_tests.rs"]
mod tests;
