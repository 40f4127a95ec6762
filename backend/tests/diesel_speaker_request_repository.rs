//! Integration tests for `DieselSpeakerRequestRepository`.
//!
//! Runs against a template-cloned database on the shared embedded
//! PostgreSQL cluster and checks ranking, uniqueness, and transition
//! atomicity as stored in SQL.

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use pg_embedded_setup_unpriv::TemporaryDatabase;
use rstest::{fixture, rstest};
use speaker_requests::domain::ports::{SpeakerRequestRepository, SpeakerRequestRepositoryError};
use speaker_requests::domain::{
    EventId, MatchScore, OrganizerId, RejectionReason, RequestId, RequestMessage, RequestStatus,
    SiblingEffect, SpeakerId, SpeakerRequest, SpeakerRequestDraft, Transition, TransitionPlan,
    storage_timestamp,
};
use speaker_requests::outbound::persistence::{DbPool, DieselSpeakerRequestRepository, PoolConfig};
use tokio::runtime::Runtime;

mod support;

use support::atexit_cleanup::shared_cluster_handle;
use support::embedded_postgres::{drop_speaker_requests_table, query_i64};
use support::{handle_cluster_setup_failure, provision_template_database};

struct TestContext {
    runtime: Runtime,
    repository: DieselSpeakerRequestRepository,
    database_url: String,
    start: DateTime<Utc>,
    _database: TemporaryDatabase,
}

impl TestContext {
    fn at(&self, seconds: i64) -> DateTime<Utc> {
        self.start + Duration::seconds(seconds)
    }

    fn insert(&self, request: SpeakerRequest) -> SpeakerRequest {
        self.runtime
            .block_on(self.repository.insert_pending(request))
            .expect("insert pending request")
    }

    fn pending(&self, event_id: EventId) -> Vec<(RequestId, u32)> {
        self.runtime
            .block_on(self.repository.list_pending_for_event(&event_id))
            .expect("list pending requests")
            .into_iter()
            .map(|request| (request.id(), request.rank().expect("pending rows are ranked")))
            .collect()
    }

    fn find(&self, id: RequestId) -> SpeakerRequest {
        self.runtime
            .block_on(self.repository.find_by_id(&id))
            .expect("find request")
            .expect("request exists")
    }
}

fn pending_request(event_id: EventId, score: f64, created_at: DateTime<Utc>) -> SpeakerRequest {
    SpeakerRequest::new_pending(SpeakerRequestDraft {
        id: RequestId::random(),
        speaker_id: SpeakerId::random(),
        event_id,
        organizer_id: OrganizerId::random(),
        message: None,
        match_score: MatchScore::new(score).expect("finite score"),
        created_at,
    })
}

fn reason(text: &str) -> RejectionReason {
    RejectionReason::new(text).expect("valid reason")
}

const CONTENDERS: usize = 12;

fn setup_context(max_size: u32) -> Result<TestContext, String> {
    let runtime = Runtime::new().map_err(|err| err.to_string())?;
    let cluster = shared_cluster_handle().map_err(|err| err.to_string())?;
    let temp_db = provision_template_database(cluster)?;
    let database_url = temp_db.url().to_string();

    let config = PoolConfig::new(database_url.as_str())
        .with_max_size(max_size)
        .with_min_idle(Some(1));
    let pool = runtime
        .block_on(async { DbPool::new(config).await })
        .map_err(|err| err.to_string())?;

    Ok(TestContext {
        runtime,
        repository: DieselSpeakerRequestRepository::new(pool),
        database_url,
        start: storage_timestamp(Utc::now()),
        _database: temp_db,
    })
}

#[fixture]
fn repo_context() -> Option<TestContext> {
    match setup_context(2) {
        Ok(ctx) => Some(ctx),
        Err(reason) => handle_cluster_setup_failure(reason),
    }
}

/// Enough connections that concurrent writers really overlap.
#[fixture]
fn contended_context() -> Option<TestContext> {
    match setup_context(6) {
        Ok(ctx) => Some(ctx),
        Err(reason) => handle_cluster_setup_failure(reason),
    }
}

#[rstest]
fn inserts_are_ranked_by_score_then_submission_time(repo_context: Option<TestContext>) {
    let Some(context) = repo_context else {
        eprintln!("SKIP-TEST-CLUSTER: inserts_are_ranked_by_score_then_submission_time skipped");
        return;
    };
    let event_id = EventId::random();

    let early = context.insert(pending_request(event_id, 80.0, context.at(0)));
    assert_eq!(early.rank(), Some(1));
    let best = context.insert(pending_request(event_id, 95.0, context.at(1)));
    assert_eq!(best.rank(), Some(1));
    let late = context.insert(pending_request(event_id, 80.0, context.at(2)));
    assert_eq!(late.rank(), Some(3));

    assert_eq!(
        context.pending(event_id),
        vec![(best.id(), 1), (early.id(), 2), (late.id(), 3)]
    );
    assert_eq!(context.find(early.id()).rank(), Some(2));
}

#[rstest]
fn duplicate_pair_writes_nothing(repo_context: Option<TestContext>) {
    let Some(context) = repo_context else {
        eprintln!("SKIP-TEST-CLUSTER: duplicate_pair_writes_nothing skipped");
        return;
    };
    let event_id = EventId::random();
    let original = context.insert(pending_request(event_id, 60.0, context.at(0)));

    let duplicate = SpeakerRequest::new_pending(SpeakerRequestDraft {
        id: RequestId::random(),
        speaker_id: original.speaker_id(),
        event_id,
        organizer_id: OrganizerId::random(),
        message: Some(RequestMessage::new("second attempt").expect("valid message")),
        match_score: MatchScore::new(99.0).expect("finite score"),
        created_at: context.at(1),
    });
    let err = context
        .runtime
        .block_on(context.repository.insert_pending(duplicate))
        .expect_err("pair is taken");

    assert_eq!(
        err,
        SpeakerRequestRepositoryError::duplicate_pair(original.speaker_id(), event_id)
    );
    let stored = query_i64(
        &context.database_url,
        "SELECT COUNT(*) FROM speaker_requests",
    )
    .expect("count rows");
    assert_eq!(stored, 1);
    assert_eq!(context.pending(event_id), vec![(original.id(), 1)]);

    let found = context
        .runtime
        .block_on(
            context
                .repository
                .find_by_pair(&original.speaker_id(), &event_id),
        )
        .expect("lookup by pair")
        .expect("pair exists");
    assert_eq!(found.id(), original.id());
}

#[rstest]
fn accept_reranks_siblings_and_leaves_other_events_alone(repo_context: Option<TestContext>) {
    let Some(context) = repo_context else {
        eprintln!("SKIP-TEST-CLUSTER: accept_reranks_siblings_and_leaves_other_events_alone skipped");
        return;
    };
    let event_id = EventId::random();
    let other_event = EventId::random();
    let top = context.insert(pending_request(event_id, 90.0, context.at(0)));
    let mid = context.insert(pending_request(event_id, 70.0, context.at(1)));
    let low = context.insert(pending_request(event_id, 50.0, context.at(2)));
    let elsewhere = context.insert(pending_request(other_event, 10.0, context.at(3)));

    let responded_at = context.at(10);
    let outcome = context
        .runtime
        .block_on(context.repository.apply_transition(
            &top.id(),
            &TransitionPlan::isolated(Transition::Accept),
            responded_at,
        ))
        .expect("accept pending request");

    assert_eq!(outcome.request.status(), RequestStatus::Accepted);
    assert!(outcome.rejected_siblings.is_empty());
    assert_eq!(context.pending(event_id), vec![(mid.id(), 1), (low.id(), 2)]);
    assert_eq!(context.pending(other_event), vec![(elsewhere.id(), 1)]);

    let stored = context.find(top.id());
    assert_eq!(stored.status(), RequestStatus::Accepted);
    assert_eq!(stored.responded_at(), Some(responded_at));
    assert!(stored.rejection_reason().is_none());
    assert_eq!(context.find(elsewhere.id()).updated_at(), elsewhere.updated_at());
}

#[rstest]
fn exclusive_accept_rejects_every_pending_sibling(repo_context: Option<TestContext>) {
    let Some(context) = repo_context else {
        eprintln!("SKIP-TEST-CLUSTER: exclusive_accept_rejects_every_pending_sibling skipped");
        return;
    };
    let event_id = EventId::random();
    let chosen = context.insert(pending_request(event_id, 40.0, context.at(0)));
    let first = context.insert(pending_request(event_id, 85.0, context.at(1)));
    let second = context.insert(pending_request(event_id, 65.0, context.at(2)));

    let plan = TransitionPlan {
        transition: Transition::Accept,
        siblings: SiblingEffect::RejectPending(reason("slot filled")),
    };
    let outcome = context
        .runtime
        .block_on(
            context
                .repository
                .apply_transition(&chosen.id(), &plan, context.at(5)),
        )
        .expect("exclusive accept");

    let mut expected = vec![first.id(), second.id()];
    expected.sort();
    assert_eq!(outcome.rejected_siblings, expected);
    assert!(context.pending(event_id).is_empty());
    for sibling in [first.id(), second.id()] {
        let stored = context.find(sibling);
        assert_eq!(stored.status(), RequestStatus::Rejected);
        assert_eq!(
            stored.rejection_reason().map(RejectionReason::as_str),
            Some("slot filled")
        );
        assert_eq!(stored.responded_at(), Some(context.at(5)));
    }
}

#[rstest]
fn terminal_requests_refuse_further_changes(repo_context: Option<TestContext>) {
    let Some(context) = repo_context else {
        eprintln!("SKIP-TEST-CLUSTER: terminal_requests_refuse_further_changes skipped");
        return;
    };
    let event_id = EventId::random();
    let request = context.insert(pending_request(event_id, 75.0, context.at(0)));
    context
        .runtime
        .block_on(context.repository.apply_transition(
            &request.id(),
            &TransitionPlan::isolated(Transition::Reject(reason("schedule clash"))),
            context.at(1),
        ))
        .expect("reject pending request");

    let accept_again = context
        .runtime
        .block_on(context.repository.apply_transition(
            &request.id(),
            &TransitionPlan::isolated(Transition::Accept),
            context.at(2),
        ))
        .expect_err("rejected requests stay rejected");
    assert_eq!(
        accept_again,
        SpeakerRequestRepositoryError::not_pending(request.id(), RequestStatus::Rejected)
    );

    let edit = context
        .runtime
        .block_on(
            context
                .repository
                .update_message(&request.id(), None, context.at(3)),
        )
        .expect_err("terminal messages are frozen");
    assert!(matches!(
        edit,
        SpeakerRequestRepositoryError::NotPending { .. }
    ));

    let stored = context.find(request.id());
    assert_eq!(stored.responded_at(), Some(context.at(1)));
    assert_eq!(
        stored.rejection_reason().map(RejectionReason::as_str),
        Some("schedule clash")
    );
}

#[rstest]
fn unknown_ids_are_reported_as_not_found(repo_context: Option<TestContext>) {
    let Some(context) = repo_context else {
        eprintln!("SKIP-TEST-CLUSTER: unknown_ids_are_reported_as_not_found skipped");
        return;
    };
    let missing = RequestId::random();

    let found = context
        .runtime
        .block_on(context.repository.find_by_id(&missing))
        .expect("lookup succeeds");
    assert!(found.is_none());

    let err = context
        .runtime
        .block_on(context.repository.apply_transition(
            &missing,
            &TransitionPlan::isolated(Transition::Accept),
            context.at(0),
        ))
        .expect_err("nothing to transition");
    assert_eq!(err, SpeakerRequestRepositoryError::not_found(missing));
}

#[rstest]
fn message_edits_replace_and_clear_the_note(repo_context: Option<TestContext>) {
    let Some(context) = repo_context else {
        eprintln!("SKIP-TEST-CLUSTER: message_edits_replace_and_clear_the_note skipped");
        return;
    };
    let request = context.insert(pending_request(EventId::random(), 55.0, context.at(0)));

    let edited = context
        .runtime
        .block_on(context.repository.update_message(
            &request.id(),
            Some(RequestMessage::new("Would love a keynote").expect("valid message")),
            context.at(4),
        ))
        .expect("edit message");
    assert_eq!(
        edited.message().map(RequestMessage::as_str),
        Some("Would love a keynote")
    );
    assert_eq!(context.find(request.id()).updated_at(), context.at(4));

    context
        .runtime
        .block_on(
            context
                .repository
                .update_message(&request.id(), None, context.at(5)),
        )
        .expect("clear message");
    let stored = context.find(request.id());
    assert!(stored.message().is_none());
    assert_eq!(stored.rank(), Some(1));
    assert_eq!(stored.match_score(), request.match_score());
}

#[rstest]
fn missing_schema_surfaces_query_errors(repo_context: Option<TestContext>) {
    let Some(context) = repo_context else {
        eprintln!("SKIP-TEST-CLUSTER: missing_schema_surfaces_query_errors skipped");
        return;
    };
    drop_speaker_requests_table(&context.database_url).expect("drop table");

    let err = context
        .runtime
        .block_on(context.repository.list_pending_for_event(&EventId::random()))
        .expect_err("table is gone");
    assert!(
        matches!(err, SpeakerRequestRepositoryError::Query { .. }),
        "expected query error, got {err:?}"
    );
}

#[rstest]
fn racing_inserts_for_one_pair_store_one_row(contended_context: Option<TestContext>) {
    let Some(context) = contended_context else {
        eprintln!("SKIP-TEST-CLUSTER: racing_inserts_for_one_pair_store_one_row skipped");
        return;
    };
    let speaker_id = SpeakerId::random();
    let event_id = EventId::random();

    let attempts = (0..CONTENDERS).map(|i| {
        let repository = context.repository.clone();
        let request = SpeakerRequest::new_pending(SpeakerRequestDraft {
            id: RequestId::random(),
            speaker_id,
            event_id,
            organizer_id: OrganizerId::random(),
            message: None,
            match_score: MatchScore::new(i as f64).expect("finite score"),
            created_at: context.at(0),
        });
        context
            .runtime
            .spawn(async move { repository.insert_pending(request).await })
    });
    let results: Vec<_> = context
        .runtime
        .block_on(join_all(attempts))
        .into_iter()
        .map(|joined| joined.expect("insert task completes"))
        .collect();

    let stored: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(stored.len(), 1, "exactly one insert may win the pair");
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(
            *err,
            SpeakerRequestRepositoryError::duplicate_pair(speaker_id, event_id)
        );
    }
    let rows = query_i64(
        &context.database_url,
        "SELECT COUNT(*) FROM speaker_requests",
    )
    .expect("count rows");
    assert_eq!(rows, 1);
    assert_eq!(context.pending(event_id), vec![(stored[0].id(), 1)]);
}

#[rstest]
fn concurrent_inserts_and_transitions_keep_ranks_dense(contended_context: Option<TestContext>) {
    let Some(context) = contended_context else {
        eprintln!("SKIP-TEST-CLUSTER: concurrent_inserts_and_transitions_keep_ranks_dense skipped");
        return;
    };
    let event_id = EventId::random();
    let seeded: Vec<SpeakerRequest> = (0..CONTENDERS)
        .map(|i| {
            let score = (i % 4) as f64 * 10.0;
            context.insert(pending_request(event_id, score, context.at(i as i64)))
        })
        .collect();

    let transitions = seeded.iter().enumerate().filter(|(i, _)| i % 3 != 2).map(|(i, request)| {
        let repository = context.repository.clone();
        let id = request.id();
        let plan = if i % 3 == 0 {
            TransitionPlan::isolated(Transition::Accept)
        } else {
            TransitionPlan::isolated(Transition::Reject(reason("programme is full")))
        };
        let responded_at = context.at(100 + i as i64);
        context.runtime.spawn(async move {
            repository
                .apply_transition(&id, &plan, responded_at)
                .await
                .map(|_| ())
        })
    });
    let inserts = (0..CONTENDERS).map(|i| {
        let repository = context.repository.clone();
        let request = pending_request(event_id, (i % 5) as f64 * 7.5, context.at(200 + i as i64));
        context
            .runtime
            .spawn(async move { repository.insert_pending(request).await.map(|_| ()) })
    });

    let tasks: Vec<_> = transitions.chain(inserts).collect();
    for outcome in context.runtime.block_on(join_all(tasks)) {
        outcome
            .expect("task completes")
            .expect("every write targets a distinct pending request or pair");
    }

    let pending = context.pending(event_id);
    let untouched = (0..CONTENDERS).filter(|i| i % 3 == 2).count();
    assert_eq!(pending.len(), untouched + CONTENDERS);
    let ranks: Vec<u32> = pending.iter().map(|(_, rank)| *rank).collect();
    let expected: Vec<u32> = (1..).take(pending.len()).collect();
    assert_eq!(ranks, expected, "pending ranks must read 1..N");

    let distinct = query_i64(
        &context.database_url,
        &format!(
            "SELECT COUNT(DISTINCT rank) FROM speaker_requests \
             WHERE status = 'pending' AND event_id = '{event_id}'"
        ),
    )
    .expect("count distinct ranks");
    assert_eq!(distinct, pending.len() as i64);
}
