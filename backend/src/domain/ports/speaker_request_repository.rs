//! Driven port for speaker request storage.
//!
//! Adapters own the per-event critical section: every method that changes
//! an event's pending set also re-ranks that set before returning, and the
//! two steps are observed atomically by other callers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    EventId, RequestId, RequestMessage, RequestStatus, SpeakerId, SpeakerRequest, TransitionPlan,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by speaker request repository adapters.
    pub enum SpeakerRequestRepositoryError {
        /// The store could not be reached.
        Connection { message: String } =>
            "speaker request repository connection failed: {message}",
        /// A query or mutation failed during execution.
        Query { message: String } =>
            "speaker request repository query failed: {message}",
        /// A request already exists for the (speaker, event) pair.
        DuplicatePair { speaker_id: SpeakerId, event_id: EventId } =>
            "a request already exists for speaker {speaker_id} and event {event_id}",
        /// No request has the given id.
        NotFound { request_id: RequestId } =>
            "speaker request {request_id} not found",
        /// The request has already left `pending`.
        NotPending { request_id: RequestId, status: RequestStatus } =>
            "speaker request {request_id} is {status}",
    }
}

/// Result of an atomic transition.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    /// The transitioned request.
    pub request: SpeakerRequest,
    /// Siblings rejected in the same step by an exclusive acceptance.
    pub rejected_siblings: Vec<RequestId>,
}

/// Port for persisting speaker requests and their ranks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeakerRequestRepository: Send + Sync {
    /// Find a request by id.
    async fn find_by_id(
        &self,
        id: &RequestId,
    ) -> Result<Option<SpeakerRequest>, SpeakerRequestRepositoryError>;

    /// Find the request for a (speaker, event) pair, whatever its status.
    async fn find_by_pair(
        &self,
        speaker_id: &SpeakerId,
        event_id: &EventId,
    ) -> Result<Option<SpeakerRequest>, SpeakerRequestRepositoryError>;

    /// Pending requests of an event, rank ascending.
    async fn list_pending_for_event(
        &self,
        event_id: &EventId,
    ) -> Result<Vec<SpeakerRequest>, SpeakerRequestRepositoryError>;

    /// Insert a new pending request and re-rank its event.
    ///
    /// Fails with `DuplicatePair` when the pair is taken; nothing is
    /// written in that case. Returns the stored request with its rank.
    async fn insert_pending(
        &self,
        request: SpeakerRequest,
    ) -> Result<SpeakerRequest, SpeakerRequestRepositoryError>;

    /// Move a pending request to a terminal state and re-rank its event.
    ///
    /// Fails with `NotFound` or `NotPending`; the stored record is left
    /// unchanged on failure.
    async fn apply_transition(
        &self,
        id: &RequestId,
        plan: &TransitionPlan,
        responded_at: DateTime<Utc>,
    ) -> Result<TransitionOutcome, SpeakerRequestRepositoryError>;

    /// Replace the message of a pending request.
    async fn update_message(
        &self,
        id: &RequestId,
        message: Option<RequestMessage>,
        updated_at: DateTime<Utc>,
    ) -> Result<SpeakerRequest, SpeakerRequestRepositoryError>;
}
