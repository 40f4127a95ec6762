//! Domain primitives, aggregates, and services.
//!
//! Purpose: model speaker requests, their scoring and ranking, and the
//! lifecycle rules that keep an event's pending set consistent. Nothing in
//! here knows about HTTP or SQL; adapters reach the domain through [`ports`].
//!
//! Public surface:
//! - `SpeakerRequest` and its value types: the aggregate and lifecycle.
//! - `MatchScorer` / `WeightedSignalScorer`: pure scoring of signal bundles.
//! - `rank_pending`: dense ranking of an event's pending set.
//! - `SpeakerRequestService`: implementation of the driving ports.
//! - `Error` / `ErrorCode`: transport-agnostic failures.

pub mod acceptance;
pub mod error;
pub mod ids;
pub mod ports;
pub mod ranking;
pub mod scoring;
pub mod speaker_request;
mod speaker_request_service;
pub mod trace_id;

pub use self::acceptance::{
    AcceptancePolicy, AcceptanceRules, DEFAULT_SIBLING_REJECTION_REASON,
    ParseAcceptancePolicyError,
};
pub use self::error::{Error, ErrorCode};
pub use self::ids::{EventId, IdValidationError, OrganizerId, RequestId, SpeakerId};
pub use self::ranking::{RankAssignment, RankCandidate, rank_pending};
pub use self::scoring::{
    AvailabilityWindow, MatchScore, MatchScorer, ProfileSignals, ScoringError, ScoringSignals,
    ScoringWeights, WeightedSignalScorer,
};
pub use self::speaker_request::{
    ParseRequestStatusError, REJECTION_REASON_MAX, REQUEST_MESSAGE_MAX, RejectionReason,
    RequestMessage, RequestStatus, SiblingEffect, SpeakerRequest, SpeakerRequestDraft,
    SpeakerRequestRecord, SpeakerRequestRestoreError, TextValidationError, Transition,
    TransitionError, TransitionPlan,
};
pub use self::speaker_request_service::SpeakerRequestService;
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};

/// Truncate a timestamp to the microsecond precision PostgreSQL stores.
///
/// Applied to every clock reading so in-memory and database adapters break
/// ranking ties identically.
pub fn storage_timestamp(at: chrono::DateTime<chrono::Utc>) -> chrono::DateTime<chrono::Utc> {
    use chrono::SubsecRound;
    at.trunc_subsecs(6)
}
