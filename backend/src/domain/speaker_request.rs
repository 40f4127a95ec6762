//! The `SpeakerRequest` aggregate and its lifecycle rules.
//!
//! A request proposes a speaker for an event on behalf of an organizer. It is
//! created `pending`, ranked against the other pending requests of its event,
//! and terminated exactly once by an accept or reject.
//!
//! ## Invariants
//! - `responded_at` is set if and only if the status is terminal.
//! - `rejection_reason` is set if and only if the status is `rejected`.
//! - Terminal requests never change status, `responded_at`, or reason.
//! - `rank` is only written by storage adapters through the ranker.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ranking::RankCandidate;
use super::{EventId, MatchScore, OrganizerId, RequestId, SpeakerId};

/// Maximum length of a rejection reason, in characters.
pub const REJECTION_REASON_MAX: usize = 1000;
/// Maximum length of an organizer message, in characters.
pub const REQUEST_MESSAGE_MAX: usize = 2000;

/// Lifecycle state of a speaker request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Awaiting an organizer decision; ranked against siblings.
    Pending,
    /// Accepted; terminal.
    Accepted,
    /// Rejected with a reason; terminal.
    Rejected,
}

impl RequestStatus {
    /// Storage representation.
    ///
    /// # Examples
    /// ```
    /// # use speaker_requests::domain::RequestStatus;
    /// assert_eq!(RequestStatus::Accepted.as_str(), "accepted");
    /// ```
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    /// Whether no further transition is permitted.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown request status: {input}")]
pub struct ParseRequestStatusError {
    /// The unrecognised input value.
    pub input: String,
}

impl FromStr for RequestStatus {
    type Err = ParseRequestStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ParseRequestStatusError {
                input: s.to_owned(),
            }),
        }
    }
}

/// Validation errors for free-text fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TextValidationError {
    /// The value is empty once trimmed.
    #[error("{field} must not be empty")]
    Empty {
        /// Field name as exposed to callers.
        field: &'static str,
    },
    /// The value exceeds the permitted length.
    #[error("{field} must be at most {max} characters")]
    TooLong {
        /// Field name as exposed to callers.
        field: &'static str,
        /// Maximum permitted length.
        max: usize,
    },
}

fn validated_text(
    raw: &str,
    field: &'static str,
    max: usize,
) -> Result<String, TextValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TextValidationError::Empty { field });
    }
    if trimmed.chars().count() > max {
        return Err(TextValidationError::TooLong { field, max });
    }
    Ok(trimmed.to_owned())
}

/// Non-empty explanation recorded when a request is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RejectionReason(pub(super) String);

impl RejectionReason {
    /// Validate a reason; surrounding whitespace is trimmed.
    ///
    /// # Examples
    /// ```
    /// # use speaker_requests::domain::RejectionReason;
    /// assert!(RejectionReason::new("  ").is_err());
    /// assert_eq!(RejectionReason::new(" full ").unwrap().as_str(), "full");
    /// ```
    pub fn new(raw: impl AsRef<str>) -> Result<Self, TextValidationError> {
        validated_text(raw.as_ref(), "reason", REJECTION_REASON_MAX).map(Self)
    }

    /// Borrow the reason text.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Optional organizer note attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestMessage(String);

impl RequestMessage {
    /// Validate a message; surrounding whitespace is trimmed.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, TextValidationError> {
        validated_text(raw.as_ref(), "message", REQUEST_MESSAGE_MAX).map(Self)
    }

    /// Treat blank input as "no message".
    pub fn optional(raw: Option<&str>) -> Result<Option<Self>, TextValidationError> {
        match raw {
            Some(text) if !text.trim().is_empty() => Self::new(text).map(Some),
            _ => Ok(None),
        }
    }

    /// Borrow the message text.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// A terminal transition requested by an organizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Move the request to `accepted`.
    Accept,
    /// Move the request to `rejected` with the given reason.
    Reject(RejectionReason),
}

impl Transition {
    /// Status the request holds after the transition.
    pub const fn target_status(&self) -> RequestStatus {
        match self {
            Self::Accept => RequestStatus::Accepted,
            Self::Reject(_) => RequestStatus::Rejected,
        }
    }
}

/// Effect a transition has on the other pending requests of the same event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiblingEffect {
    /// Siblings are untouched apart from re-ranking.
    Keep,
    /// Every other pending sibling is rejected with the given reason.
    RejectPending(RejectionReason),
}

/// A transition together with its effect on siblings, applied atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    /// Transition applied to the target request.
    pub transition: Transition,
    /// Effect on pending siblings of the same event.
    pub siblings: SiblingEffect,
}

impl TransitionPlan {
    /// Plan that leaves siblings untouched.
    pub const fn isolated(transition: Transition) -> Self {
        Self {
            transition,
            siblings: SiblingEffect::Keep,
        }
    }
}

/// Error raised when a lifecycle rule forbids a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The request already left `pending`.
    #[error("request is {status}; only pending requests can change")]
    NotPending {
        /// Current status of the request.
        status: RequestStatus,
    },
}

/// Error raised when stored values violate the aggregate invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpeakerRequestRestoreError {
    /// `responded_at` disagrees with the status.
    #[error("respondedAt must be set exactly when status is terminal (status {status})")]
    RespondedAtMismatch {
        /// Stored status.
        status: RequestStatus,
    },
    /// `rejection_reason` disagrees with the status.
    #[error("rejectionReason must be set exactly when status is rejected (status {status})")]
    RejectionReasonMismatch {
        /// Stored status.
        status: RequestStatus,
    },
}

/// Input for creating a fresh pending request.
#[derive(Debug, Clone)]
pub struct SpeakerRequestDraft {
    /// Identifier assigned at creation.
    pub id: RequestId,
    /// Proposed speaker.
    pub speaker_id: SpeakerId,
    /// Target event.
    pub event_id: EventId,
    /// Initiating organizer.
    pub organizer_id: OrganizerId,
    /// Optional note.
    pub message: Option<RequestMessage>,
    /// Score computed by the match scorer.
    pub match_score: MatchScore,
    /// Creation timestamp; also used as the initial `updated_at`.
    pub created_at: DateTime<Utc>,
}

/// Every stored field of a request, used to rehydrate from storage.
#[derive(Debug, Clone)]
pub struct SpeakerRequestRecord {
    /// Request identifier.
    pub id: RequestId,
    /// Proposed speaker.
    pub speaker_id: SpeakerId,
    /// Target event.
    pub event_id: EventId,
    /// Initiating organizer.
    pub organizer_id: OrganizerId,
    /// Optional note.
    pub message: Option<RequestMessage>,
    /// Score fixed at creation.
    pub match_score: MatchScore,
    /// Last rank written by the ranker.
    pub rank: Option<u32>,
    /// Lifecycle state.
    pub status: RequestStatus,
    /// Response timestamp.
    pub responded_at: Option<DateTime<Utc>>,
    /// Reason recorded on rejection.
    pub rejection_reason: Option<RejectionReason>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Association of a speaker with an event, tracked through approval.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerRequest {
    id: RequestId,
    speaker_id: SpeakerId,
    event_id: EventId,
    organizer_id: OrganizerId,
    message: Option<RequestMessage>,
    match_score: MatchScore,
    rank: Option<u32>,
    status: RequestStatus,
    responded_at: Option<DateTime<Utc>>,
    rejection_reason: Option<RejectionReason>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SpeakerRequest {
    /// Create a pending, not yet ranked request.
    pub fn new_pending(draft: SpeakerRequestDraft) -> Self {
        Self {
            id: draft.id,
            speaker_id: draft.speaker_id,
            event_id: draft.event_id,
            organizer_id: draft.organizer_id,
            message: draft.message,
            match_score: draft.match_score,
            rank: None,
            status: RequestStatus::Pending,
            responded_at: None,
            rejection_reason: None,
            created_at: draft.created_at,
            updated_at: draft.created_at,
        }
    }

    /// Rehydrate a request from storage, validating the invariants.
    pub fn restore(record: SpeakerRequestRecord) -> Result<Self, SpeakerRequestRestoreError> {
        let status = record.status;
        if status.is_terminal() != record.responded_at.is_some() {
            return Err(SpeakerRequestRestoreError::RespondedAtMismatch { status });
        }
        if (status == RequestStatus::Rejected) != record.rejection_reason.is_some() {
            return Err(SpeakerRequestRestoreError::RejectionReasonMismatch { status });
        }
        Ok(Self {
            id: record.id,
            speaker_id: record.speaker_id,
            event_id: record.event_id,
            organizer_id: record.organizer_id,
            message: record.message,
            match_score: record.match_score,
            rank: record.rank,
            status,
            responded_at: record.responded_at,
            rejection_reason: record.rejection_reason,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    /// Request identifier.
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Proposed speaker.
    pub const fn speaker_id(&self) -> SpeakerId {
        self.speaker_id
    }

    /// Target event.
    pub const fn event_id(&self) -> EventId {
        self.event_id
    }

    /// Initiating organizer.
    pub const fn organizer_id(&self) -> OrganizerId {
        self.organizer_id
    }

    /// Organizer note, if any.
    pub fn message(&self) -> Option<&RequestMessage> {
        self.message.as_ref()
    }

    /// Score fixed at creation.
    pub const fn match_score(&self) -> MatchScore {
        self.match_score
    }

    /// Position among the event's pending requests.
    ///
    /// Only meaningful while the request is pending; terminal requests keep
    /// whatever rank they last held.
    pub const fn rank(&self) -> Option<u32> {
        self.rank
    }

    /// Lifecycle state.
    pub const fn status(&self) -> RequestStatus {
        self.status
    }

    /// When the request was accepted or rejected.
    pub const fn responded_at(&self) -> Option<DateTime<Utc>> {
        self.responded_at
    }

    /// Reason recorded on rejection.
    pub fn rejection_reason(&self) -> Option<&RejectionReason> {
        self.rejection_reason.as_ref()
    }

    /// Creation timestamp.
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last modification timestamp.
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Whether the request is still awaiting a decision.
    pub const fn is_pending(&self) -> bool {
        matches!(self.status, RequestStatus::Pending)
    }

    fn ensure_pending(&self) -> Result<(), TransitionError> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(TransitionError::NotPending {
                status: self.status,
            })
        }
    }

    /// Apply a terminal transition.
    ///
    /// Re-applying the state a request already holds is an error, like any
    /// other mutation of a terminal request.
    pub fn apply(
        &mut self,
        transition: &Transition,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.ensure_pending()?;
        match transition {
            Transition::Accept => {
                self.status = RequestStatus::Accepted;
            }
            Transition::Reject(reason) => {
                self.status = RequestStatus::Rejected;
                self.rejection_reason = Some(reason.clone());
            }
        }
        self.responded_at = Some(at);
        self.updated_at = at;
        Ok(())
    }

    /// Replace the organizer note while the request is pending.
    pub fn edit_message(
        &mut self,
        message: Option<RequestMessage>,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.ensure_pending()?;
        self.message = message;
        self.updated_at = at;
        Ok(())
    }

    /// Ranking key for this request.
    pub const fn rank_candidate(&self) -> RankCandidate {
        RankCandidate {
            id: self.id,
            match_score: self.match_score,
            created_at: self.created_at,
        }
    }

    pub(crate) fn assign_rank(&mut self, rank: u32, at: DateTime<Utc>) {
        if self.rank != Some(rank) {
            self.rank = Some(rank);
            self.updated_at = at;
        }
    }
}
