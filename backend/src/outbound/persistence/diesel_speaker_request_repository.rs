//! PostgreSQL-backed `SpeakerRequestRepository` implementation using Diesel.
//!
//! Every mutation runs in a single transaction. Mutations that change an
//! event's pending set first take a transaction-scoped advisory lock keyed
//! by the event id, so writers to one event serialise while other events
//! proceed in parallel. The `(speaker_id, event_id)` unique constraint stays
//! the final arbiter for duplicates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel::sql_types::Text;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, AsyncPgConnection, RunQueryDsl};
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{
    SpeakerRequestRepository, SpeakerRequestRepositoryError, TransitionOutcome,
};
use crate::domain::{
    EventId, MatchScore, OrganizerId, RankCandidate, RejectionReason, RequestId, RequestMessage,
    RequestStatus, SiblingEffect, SpeakerId, SpeakerRequest, SpeakerRequestRecord,
    TransitionError, TransitionPlan, rank_pending,
};

use super::error_mapping::{map_diesel_error, map_pool_error};
use super::models::{MessageUpdate, NewSpeakerRequestRow, SpeakerRequestRow, TransitionUpdate};
use super::pool::DbPool;
use super::schema::speaker_requests;

/// Diesel-backed implementation of the speaker request repository port.
#[derive(Clone)]
pub struct DieselSpeakerRequestRepository {
    pool: DbPool,
}

impl DieselSpeakerRequestRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Failure inside a transaction body; any variant rolls the transaction back.
#[derive(Debug)]
enum TxError {
    Diesel(DieselError),
    Repository(SpeakerRequestRepositoryError),
}

impl From<DieselError> for TxError {
    fn from(error: DieselError) -> Self {
        Self::Diesel(error)
    }
}

impl From<SpeakerRequestRepositoryError> for TxError {
    fn from(error: SpeakerRequestRepositoryError) -> Self {
        Self::Repository(error)
    }
}

impl TxError {
    fn into_repository(self) -> SpeakerRequestRepositoryError {
        match self {
            Self::Diesel(error) => map_diesel_error(error),
            Self::Repository(error) => error,
        }
    }
}

const PENDING: &str = RequestStatus::Pending.as_str();

fn corrupt_row(
    request_id: Uuid,
    field: &str,
    detail: impl std::fmt::Display,
) -> SpeakerRequestRepositoryError {
    SpeakerRequestRepositoryError::query(format!(
        "stored {field} for speaker request {request_id} is invalid: {detail}"
    ))
}

/// Convert a database row into a validated domain request.
fn row_to_request(
    row: SpeakerRequestRow,
) -> Result<SpeakerRequest, SpeakerRequestRepositoryError> {
    let SpeakerRequestRow {
        id,
        speaker_id,
        event_id,
        organizer_id,
        message,
        match_score,
        rank,
        status,
        responded_at,
        rejection_reason,
        created_at,
        updated_at,
    } = row;

    let status: RequestStatus = status
        .parse()
        .map_err(|err| corrupt_row(id, "status", err))?;
    let message = message
        .map(RequestMessage::new)
        .transpose()
        .map_err(|err| corrupt_row(id, "message", err))?;
    let match_score =
        MatchScore::new(match_score).map_err(|err| corrupt_row(id, "match score", err))?;
    let rank = rank
        .map(u32::try_from)
        .transpose()
        .map_err(|err| corrupt_row(id, "rank", err))?;
    let rejection_reason = rejection_reason
        .map(RejectionReason::new)
        .transpose()
        .map_err(|err| corrupt_row(id, "rejection reason", err))?;

    SpeakerRequest::restore(SpeakerRequestRecord {
        id: RequestId::from_uuid(id),
        speaker_id: SpeakerId::from_uuid(speaker_id),
        event_id: EventId::from_uuid(event_id),
        organizer_id: OrganizerId::from_uuid(organizer_id),
        message,
        match_score,
        rank,
        status,
        responded_at,
        rejection_reason,
        created_at,
        updated_at,
    })
    .map_err(|err| corrupt_row(id, "lifecycle state", err))
}

/// Serialise writers to one event until the surrounding transaction ends.
async fn lock_event(conn: &mut AsyncPgConnection, event_id: Uuid) -> Result<(), DieselError> {
    diesel::sql_query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind::<Text, _>(event_id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

async fn load_row(
    conn: &mut AsyncPgConnection,
    id: Uuid,
) -> Result<Option<SpeakerRequestRow>, DieselError> {
    speaker_requests::table
        .find(id)
        .select(SpeakerRequestRow::as_select())
        .first(conn)
        .await
        .optional()
}

async fn lock_row(
    conn: &mut AsyncPgConnection,
    id: Uuid,
) -> Result<Option<SpeakerRequestRow>, DieselError> {
    speaker_requests::table
        .find(id)
        .select(SpeakerRequestRow::as_select())
        .for_update()
        .first(conn)
        .await
        .optional()
}

/// Recompute the ranks of an event's pending set and write the changed ones.
///
/// Returns how many rows were rewritten.
async fn rerank_event(
    conn: &mut AsyncPgConnection,
    event_id: Uuid,
    at: DateTime<Utc>,
) -> Result<usize, TxError> {
    let rows: Vec<(Uuid, f64, DateTime<Utc>, Option<i32>)> = speaker_requests::table
        .filter(speaker_requests::event_id.eq(event_id))
        .filter(speaker_requests::status.eq(PENDING))
        .select((
            speaker_requests::id,
            speaker_requests::match_score,
            speaker_requests::created_at,
            speaker_requests::rank,
        ))
        .load(conn)
        .await?;

    let candidates = rows
        .into_iter()
        .map(|(id, score, created_at, rank)| {
            let match_score =
                MatchScore::new(score).map_err(|err| corrupt_row(id, "match score", err))?;
            let candidate = RankCandidate {
                id: RequestId::from_uuid(id),
                match_score,
                created_at,
            };
            Ok((candidate, rank.and_then(|value| u32::try_from(value).ok())))
        })
        .collect::<Result<Vec<_>, SpeakerRequestRepositoryError>>()?;

    let mut rewritten = 0;
    for assignment in rank_pending(candidates).into_iter().filter(|a| a.changed) {
        let rank = i32::try_from(assignment.rank).map_err(|_| {
            SpeakerRequestRepositoryError::query(format!(
                "rank {} exceeds storage range",
                assignment.rank
            ))
        })?;
        diesel::update(speaker_requests::table.find(*assignment.id.as_uuid()))
            .set((
                speaker_requests::rank.eq(Some(rank)),
                speaker_requests::updated_at.eq(at),
            ))
            .execute(conn)
            .await?;
        rewritten += 1;
    }
    Ok(rewritten)
}

#[async_trait]
impl SpeakerRequestRepository for DieselSpeakerRequestRepository {
    async fn find_by_id(
        &self,
        id: &RequestId,
    ) -> Result<Option<SpeakerRequest>, SpeakerRequestRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        load_row(&mut conn, *id.as_uuid())
            .await
            .map_err(map_diesel_error)?
            .map(row_to_request)
            .transpose()
    }

    async fn find_by_pair(
        &self,
        speaker_id: &SpeakerId,
        event_id: &EventId,
    ) -> Result<Option<SpeakerRequest>, SpeakerRequestRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        speaker_requests::table
            .filter(speaker_requests::speaker_id.eq(speaker_id.as_uuid()))
            .filter(speaker_requests::event_id.eq(event_id.as_uuid()))
            .select(SpeakerRequestRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?
            .map(row_to_request)
            .transpose()
    }

    async fn list_pending_for_event(
        &self,
        event_id: &EventId,
    ) -> Result<Vec<SpeakerRequest>, SpeakerRequestRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<SpeakerRequestRow> = speaker_requests::table
            .filter(speaker_requests::event_id.eq(event_id.as_uuid()))
            .filter(speaker_requests::status.eq(PENDING))
            .order((
                speaker_requests::rank.asc(),
                speaker_requests::created_at.asc(),
                speaker_requests::id.asc(),
            ))
            .select(SpeakerRequestRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        rows.into_iter().map(row_to_request).collect()
    }

    async fn insert_pending(
        &self,
        request: SpeakerRequest,
    ) -> Result<SpeakerRequest, SpeakerRequestRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let request_id = *request.id().as_uuid();
        let event_id = *request.event_id().as_uuid();
        let at = request.created_at();

        let row = conn
            .transaction::<_, TxError, _>(|conn| {
                async move {
                    lock_event(conn, event_id).await?;
                    let inserted = diesel::insert_into(speaker_requests::table)
                        .values(NewSpeakerRequestRow::from(&request))
                        .on_conflict((speaker_requests::speaker_id, speaker_requests::event_id))
                        .do_nothing()
                        .execute(conn)
                        .await?;
                    if inserted == 0 {
                        return Err(SpeakerRequestRepositoryError::duplicate_pair(
                            request.speaker_id(),
                            request.event_id(),
                        )
                        .into());
                    }
                    let rewritten = rerank_event(conn, event_id, at).await?;
                    debug!(%event_id, rewritten, "re-ranked after insert");
                    load_row(conn, request_id).await?.ok_or_else(|| {
                        TxError::from(SpeakerRequestRepositoryError::query(
                            "inserted speaker request not visible",
                        ))
                    })
                }
                .scope_boxed()
            })
            .await
            .map_err(TxError::into_repository)?;

        row_to_request(row)
    }

    async fn apply_transition(
        &self,
        id: &RequestId,
        plan: &TransitionPlan,
        responded_at: DateTime<Utc>,
    ) -> Result<TransitionOutcome, SpeakerRequestRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let request_id = *id;
        let uuid = *id.as_uuid();
        let plan = plan.clone();

        conn.transaction::<_, TxError, _>(|conn| {
            async move {
                let not_found =
                    || TxError::from(SpeakerRequestRepositoryError::not_found(request_id));
                let event_id = load_row(conn, uuid)
                    .await?
                    .ok_or_else(not_found)?
                    .event_id;
                lock_event(conn, event_id).await?;

                let row = lock_row(conn, uuid).await?.ok_or_else(not_found)?;
                let mut request = row_to_request(row)?;
                request
                    .apply(&plan.transition, responded_at)
                    .map_err(|TransitionError::NotPending { status }| {
                        SpeakerRequestRepositoryError::not_pending(request_id, status)
                    })?;

                let updated = diesel::update(
                    speaker_requests::table
                        .find(uuid)
                        .filter(speaker_requests::status.eq(PENDING)),
                )
                .set(TransitionUpdate::from(&request))
                .execute(conn)
                .await?;
                if updated == 0 {
                    return Err(SpeakerRequestRepositoryError::query(
                        "speaker request left pending during transition",
                    )
                    .into());
                }

                let mut rejected_siblings: Vec<RequestId> = match &plan.siblings {
                    SiblingEffect::Keep => Vec::new(),
                    SiblingEffect::RejectPending(reason) => diesel::update(
                        speaker_requests::table
                            .filter(speaker_requests::event_id.eq(event_id))
                            .filter(speaker_requests::status.eq(PENDING))
                            .filter(speaker_requests::id.ne(uuid)),
                    )
                    .set(TransitionUpdate {
                        status: RequestStatus::Rejected.as_str(),
                        responded_at: Some(responded_at),
                        rejection_reason: Some(reason.as_str()),
                        updated_at: responded_at,
                    })
                    .returning(speaker_requests::id)
                    .get_results::<Uuid>(conn)
                    .await?
                    .into_iter()
                    .map(RequestId::from_uuid)
                    .collect(),
                };
                rejected_siblings.sort();

                let rewritten = rerank_event(conn, event_id, responded_at).await?;
                debug!(
                    %event_id,
                    rewritten,
                    siblings = rejected_siblings.len(),
                    "re-ranked after transition"
                );

                Ok(TransitionOutcome {
                    request,
                    rejected_siblings,
                })
            }
            .scope_boxed()
        })
        .await
        .map_err(TxError::into_repository)
    }

    async fn update_message(
        &self,
        id: &RequestId,
        message: Option<RequestMessage>,
        updated_at: DateTime<Utc>,
    ) -> Result<SpeakerRequest, SpeakerRequestRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let request_id = *id;
        let uuid = *id.as_uuid();

        conn.transaction::<_, TxError, _>(|conn| {
            async move {
                let row = lock_row(conn, uuid).await?.ok_or_else(|| {
                    TxError::from(SpeakerRequestRepositoryError::not_found(request_id))
                })?;
                let mut request = row_to_request(row)?;
                request
                    .edit_message(message, updated_at)
                    .map_err(|TransitionError::NotPending { status }| {
                        SpeakerRequestRepositoryError::not_pending(request_id, status)
                    })?;

                diesel::update(speaker_requests::table.find(uuid))
                    .set(MessageUpdate {
                        message: request.message().map(RequestMessage::as_str),
                        updated_at: request.updated_at(),
                    })
                    .execute(conn)
                    .await?;
                Ok(request)
            }
            .scope_boxed()
        })
        .await
        .map_err(TxError::into_repository)
    }
}

#[cfg(test)]
mod tests {
    //! Row conversion coverage; database behaviour lives in
    //! `tests/diesel_speaker_request_repository.rs`.

    use chrono::TimeZone;
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn row() -> SpeakerRequestRow {
        let created_at = Utc
            .with_ymd_and_hms(2026, 4, 2, 10, 0, 0)
            .single()
            .expect("valid timestamp");
        SpeakerRequestRow {
            id: Uuid::new_v4(),
            speaker_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            organizer_id: Uuid::new_v4(),
            message: Some("closing keynote".to_owned()),
            match_score: 87.5,
            rank: Some(2),
            status: "pending".to_owned(),
            responded_at: None,
            rejection_reason: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[rstest]
    fn pending_row_restores(row: SpeakerRequestRow) {
        let id = row.id;
        let request = row_to_request(row).expect("valid row");
        assert_eq!(request.id(), RequestId::from_uuid(id));
        assert_eq!(request.rank(), Some(2));
        assert_eq!(request.status(), RequestStatus::Pending);
        assert_eq!(
            request.message().map(RequestMessage::as_str),
            Some("closing keynote")
        );
    }

    #[rstest]
    fn rejected_row_carries_reason(mut row: SpeakerRequestRow) {
        row.status = "rejected".to_owned();
        row.responded_at = Some(row.created_at);
        row.rejection_reason = Some("schedule full".to_owned());

        let request = row_to_request(row).expect("valid row");
        assert_eq!(
            request.rejection_reason().map(RejectionReason::as_str),
            Some("schedule full")
        );
    }

    #[rstest]
    #[case::unknown_status(|r: &mut SpeakerRequestRow| r.status = "withdrawn".to_owned(), "status")]
    #[case::negative_rank(|r: &mut SpeakerRequestRow| r.rank = Some(-1), "rank")]
    #[case::nan_score(|r: &mut SpeakerRequestRow| r.match_score = f64::NAN, "match score")]
    #[case::blank_message(|r: &mut SpeakerRequestRow| r.message = Some("  ".to_owned()), "message")]
    #[case::accepted_without_timestamp(
        |r: &mut SpeakerRequestRow| r.status = "accepted".to_owned(),
        "lifecycle state"
    )]
    fn corrupt_rows_surface_as_query_errors(
        mut row: SpeakerRequestRow,
        #[case] corrupt: fn(&mut SpeakerRequestRow),
        #[case] field: &str,
    ) {
        corrupt(&mut row);
        let err = row_to_request(row).expect_err("corrupt row");
        let SpeakerRequestRepositoryError::Query { message } = err else {
            panic!("expected query error, got {err:?}");
        };
        assert!(message.contains(field), "{message}");
    }

    #[rstest]
    fn tx_errors_unwrap_to_repository_errors() {
        let id = RequestId::random();
        let err = TxError::from(SpeakerRequestRepositoryError::not_found(id)).into_repository();
        assert_eq!(err, SpeakerRequestRepositoryError::not_found(id));

        let err = TxError::from(DieselError::BrokenTransactionManager).into_repository();
        assert!(matches!(err, SpeakerRequestRepositoryError::Connection { .. }));
    }
}
