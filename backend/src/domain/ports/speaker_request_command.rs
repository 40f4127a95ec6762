//! Driving port for speaker request mutations.
//!
//! Create, accept, reject, and message edits all flow through this port.
//! Responses carry the request as stored after the mutation, including its
//! refreshed rank.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Error, EventId, OrganizerId, RequestId, RequestStatus, ScoringSignals, SpeakerId,
    SpeakerRequest,
};

/// Serializable view of a speaker request for driving ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerRequestPayload {
    pub id: RequestId,
    pub speaker_id: SpeakerId,
    pub event_id: EventId,
    pub organizer_id: OrganizerId,
    pub message: Option<String>,
    pub match_score: f64,
    pub rank: Option<u32>,
    pub status: RequestStatus,
    pub responded_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SpeakerRequest> for SpeakerRequestPayload {
    fn from(value: SpeakerRequest) -> Self {
        Self {
            id: value.id(),
            speaker_id: value.speaker_id(),
            event_id: value.event_id(),
            organizer_id: value.organizer_id(),
            message: value.message().map(|m| m.as_str().to_owned()),
            match_score: value.match_score().value(),
            rank: value.rank(),
            status: value.status(),
            responded_at: value.responded_at(),
            rejection_reason: value.rejection_reason().map(|r| r.as_str().to_owned()),
            created_at: value.created_at(),
            updated_at: value.updated_at(),
        }
    }
}

/// Input for `createRequest`.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateSpeakerRequest {
    pub speaker_id: SpeakerId,
    pub event_id: EventId,
    pub organizer_id: OrganizerId,
    pub message: Option<String>,
    pub scoring_signals: ScoringSignals,
}

/// Input for `acceptRequest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptSpeakerRequest {
    pub request_id: RequestId,
}

/// Input for `rejectRequest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectSpeakerRequest {
    pub request_id: RequestId,
    pub reason: String,
}

/// Input for editing the message of a pending request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSpeakerRequestMessage {
    pub request_id: RequestId,
    pub message: Option<String>,
}

/// Use-case port for speaker request mutations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeakerRequestCommand: Send + Sync {
    /// Validate, score, and store a new pending request.
    async fn create(&self, request: CreateSpeakerRequest) -> Result<SpeakerRequestPayload, Error>;

    /// Accept a pending request.
    async fn accept(&self, request: AcceptSpeakerRequest) -> Result<SpeakerRequestPayload, Error>;

    /// Reject a pending request with a reason.
    async fn reject(&self, request: RejectSpeakerRequest) -> Result<SpeakerRequestPayload, Error>;

    /// Replace the message of a pending request.
    async fn edit_message(
        &self,
        request: EditSpeakerRequestMessage,
    ) -> Result<SpeakerRequestPayload, Error>;
}
