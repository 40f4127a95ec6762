//! Internal Diesel row structs for the `speaker_requests` table.
//!
//! Rows never leave the persistence layer; conversions go through the
//! validating domain constructors.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::SpeakerRequest;

use super::schema::speaker_requests;

/// Row read from `speaker_requests`.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = speaker_requests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct SpeakerRequestRow {
    pub id: Uuid,
    pub speaker_id: Uuid,
    pub event_id: Uuid,
    pub organizer_id: Uuid,
    pub message: Option<String>,
    pub match_score: f64,
    pub rank: Option<i32>,
    pub status: String,
    pub responded_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insertable form of a freshly created pending request.
///
/// Rank is left `NULL`; the re-rank inside the same transaction fills it.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = speaker_requests)]
pub(crate) struct NewSpeakerRequestRow<'a> {
    pub id: Uuid,
    pub speaker_id: Uuid,
    pub event_id: Uuid,
    pub organizer_id: Uuid,
    pub message: Option<&'a str>,
    pub match_score: f64,
    pub status: &'a str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'a> From<&'a SpeakerRequest> for NewSpeakerRequestRow<'a> {
    fn from(request: &'a SpeakerRequest) -> Self {
        Self {
            id: *request.id().as_uuid(),
            speaker_id: *request.speaker_id().as_uuid(),
            event_id: *request.event_id().as_uuid(),
            organizer_id: *request.organizer_id().as_uuid(),
            message: request.message().map(|message| message.as_str()),
            match_score: request.match_score().value(),
            status: request.status().as_str(),
            created_at: request.created_at(),
            updated_at: request.updated_at(),
        }
    }
}

/// Terminal state written by a transition.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = speaker_requests)]
pub(crate) struct TransitionUpdate<'a> {
    pub status: &'a str,
    pub responded_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<&'a str>,
    pub updated_at: DateTime<Utc>,
}

impl<'a> From<&'a SpeakerRequest> for TransitionUpdate<'a> {
    fn from(request: &'a SpeakerRequest) -> Self {
        Self {
            status: request.status().as_str(),
            responded_at: request.responded_at(),
            rejection_reason: request.rejection_reason().map(|reason| reason.as_str()),
            updated_at: request.updated_at(),
        }
    }
}

/// Message edit; `treat_none_as_null` so clearing the note writes `NULL`.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = speaker_requests)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct MessageUpdate<'a> {
    pub message: Option<&'a str>,
    pub updated_at: DateTime<Utc>,
}
