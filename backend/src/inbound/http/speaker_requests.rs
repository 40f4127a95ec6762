//! Speaker request HTTP handlers.
//!
//! ```text
//! POST  /api/v1/speaker-requests
//! GET   /api/v1/speaker-requests/{id}
//! PATCH /api/v1/speaker-requests/{id}/message
//! POST  /api/v1/speaker-requests/{id}/accept
//! POST  /api/v1/speaker-requests/{id}/reject
//! GET   /api/v1/events/{eventId}/speaker-requests/pending
//! ```
//!
//! Responses use the camelCase data model field names. Authentication is
//! handled upstream; the organizer id travels in the create body.

use actix_web::http::header;
use actix_web::{HttpResponse, get, patch, post, web};
use serde::{Deserialize, Serialize};

use crate::domain::ports::{
    AcceptSpeakerRequest, CreateSpeakerRequest, EditSpeakerRequestMessage, RejectSpeakerRequest,
    SpeakerRequestPayload,
};
use crate::domain::{Error, EventId, RequestId, ScoringSignals};
use crate::inbound::http::ApiResult;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldName, missing_field_error, parse_id, require_id};

const ID: FieldName = FieldName::new("id");
const EVENT_ID: FieldName = FieldName::new("eventId");

/// Body of `POST /speaker-requests`.
///
/// Fields are optional at the serde layer so a missing field produces a
/// field-specific validation error rather than a generic JSON failure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSpeakerRequestBody {
    pub speaker_id: Option<String>,
    pub event_id: Option<String>,
    pub organizer_id: Option<String>,
    pub message: Option<String>,
    pub scoring_signals: Option<ScoringSignals>,
}

/// Body of `POST /speaker-requests/{id}/reject`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectSpeakerRequestBody {
    pub reason: Option<String>,
}

/// Body of `PATCH /speaker-requests/{id}/message`. A null or blank message
/// clears the note.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditSpeakerRequestMessageBody {
    pub message: Option<String>,
}

fn parse_create_body(body: CreateSpeakerRequestBody) -> Result<CreateSpeakerRequest, Error> {
    Ok(CreateSpeakerRequest {
        speaker_id: require_id(body.speaker_id, FieldName::new("speakerId"))?,
        event_id: require_id(body.event_id, EVENT_ID)?,
        organizer_id: require_id(body.organizer_id, FieldName::new("organizerId"))?,
        message: body.message,
        scoring_signals: body
            .scoring_signals
            .ok_or_else(|| missing_field_error(FieldName::new("scoringSignals")))?,
    })
}

fn request_id(path: web::Path<String>) -> Result<RequestId, Error> {
    parse_id(&path.into_inner(), ID)
}

/// Create a pending request, score it, and return it with its rank.
#[post("/speaker-requests")]
pub async fn create_speaker_request(
    state: web::Data<HttpState>,
    payload: web::Json<CreateSpeakerRequestBody>,
) -> ApiResult<HttpResponse> {
    let request = parse_create_body(payload.into_inner())?;
    let created = state.speaker_requests.create(request).await?;
    Ok(HttpResponse::Created()
        .insert_header((
            header::LOCATION,
            format!("/api/v1/speaker-requests/{}", created.id),
        ))
        .json(created))
}

/// Fetch one request.
#[get("/speaker-requests/{id}")]
pub async fn get_speaker_request(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<web::Json<SpeakerRequestPayload>> {
    let id = request_id(path)?;
    let request = state.speaker_requests_query.get(id).await?;
    Ok(web::Json(request))
}

/// Replace the organizer note of a pending request.
#[patch("/speaker-requests/{id}/message")]
pub async fn edit_speaker_request_message(
    state: web::Data<HttpState>,
    path: web::Path<String>,
    payload: web::Json<EditSpeakerRequestMessageBody>,
) -> ApiResult<web::Json<SpeakerRequestPayload>> {
    let request_id = request_id(path)?;
    let updated = state
        .speaker_requests
        .edit_message(EditSpeakerRequestMessage {
            request_id,
            message: payload.into_inner().message,
        })
        .await?;
    Ok(web::Json(updated))
}

/// Accept a pending request.
#[post("/speaker-requests/{id}/accept")]
pub async fn accept_speaker_request(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<web::Json<SpeakerRequestPayload>> {
    let request_id = request_id(path)?;
    let accepted = state
        .speaker_requests
        .accept(AcceptSpeakerRequest { request_id })
        .await?;
    Ok(web::Json(accepted))
}

/// Reject a pending request with a reason.
#[post("/speaker-requests/{id}/reject")]
pub async fn reject_speaker_request(
    state: web::Data<HttpState>,
    path: web::Path<String>,
    payload: web::Json<RejectSpeakerRequestBody>,
) -> ApiResult<web::Json<SpeakerRequestPayload>> {
    let request_id = request_id(path)?;
    let reason = payload
        .into_inner()
        .reason
        .ok_or_else(|| missing_field_error(FieldName::new("reason")))?;
    let rejected = state
        .speaker_requests
        .reject(RejectSpeakerRequest { request_id, reason })
        .await?;
    Ok(web::Json(rejected))
}

/// Pending requests of an event, rank ascending.
#[get("/events/{event_id}/speaker-requests/pending")]
pub async fn list_pending_speaker_requests(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<web::Json<Vec<SpeakerRequestPayload>>> {
    let event_id: EventId = parse_id(&path.into_inner(), EVENT_ID)?;
    let pending = state
        .speaker_requests_query
        .list_ranked_pending(event_id)
        .await?;
    Ok(web::Json(pending))
}

/// Register every speaker request route on an `/api/v1` scope.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(create_speaker_request)
        .service(get_speaker_request)
        .service(edit_speaker_request_message)
        .service(accept_speaker_request)
        .service(reject_speaker_request)
        .service(list_pending_speaker_requests);
}

#[cfg(test)]
#[path = "speaker_requests_tests.rs"]
mod tests;
