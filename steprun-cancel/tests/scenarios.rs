//! End-to-end cancellation scenarios against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use steprun_cancel::prelude::*;
use steprun_cancel::events::{CollectingEventSink, CANCELLATION_REJECTED};
use steprun_cancel::testing::{InMemoryRunStore, RecordingCommandChannel};
use tokio::time::Instant;

struct Harness {
    started: Instant,
    events: Arc<CollectingEventSink>,
    store: Arc<InMemoryRunStore>,
    channel: Arc<RecordingCommandChannel>,
    coordinator: CancellationCoordinator,
}

impl Harness {
    fn with_worker() -> Self {
        Self::build(|store| RecordingCommandChannel::new().with_worker(store))
    }

    fn silent() -> Self {
        Self::build(|_| RecordingCommandChannel::new())
    }

    fn build<F>(channel: F) -> Self
    where
        F: FnOnce(Arc<InMemoryRunStore>) -> RecordingCommandChannel,
    {
        let started = Instant::now();
        let store = Arc::new(InMemoryRunStore::new());
        let channel = Arc::new(channel(store.clone()));
        let events = Arc::new(CollectingEventSink::new());
        let coordinator = CancellationCoordinator::new(
            CancellationPorts::from_store(store.clone(), channel.clone()),
            CancellationConfig::default(),
        )
        .with_event_sink(events.clone());

        Self {
            started,
            events,
            store,
            channel,
            coordinator,
        }
    }

    fn seed(&self, status: RunStatus) -> StepRun {
        let run = StepRun::new(RunId::new(), TenantId::new(), status);
        self.store.insert_claimed(run.clone(), "worker-1");
        run
    }
}

#[tokio::test(start_paused = true)]
async fn running_run_converges_on_second_poll() {
    let h = Harness::silent();
    let r1 = h.seed(RunStatus::Running);
    h.store
        .transition_at(r1.id, Duration::from_millis(200), RunStatus::Cancelled);

    let outcome = h
        .coordinator
        .request_cancellation(r1.tenant_id, &r1, "user request")
        .await
        .unwrap();

    let commands = h.channel.commands_for(r1.id);
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].run_id(), r1.id);
    assert_eq!(commands[0].reason(), CANCELLED_BY_USER);
    assert_eq!(commands[0].detail(), Some("user request"));

    assert_eq!(outcome.status(), RunStatus::Cancelled);
    assert!(outcome.is_confirmed());
    assert_eq!(outcome.convergence.attempts, 2);
    assert_eq!(h.store.status_reads(r1.id), 2);
    let waited = h.started.elapsed();
    assert!(waited >= Duration::from_millis(200) && waited < Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn succeeded_run_is_not_cancellable() {
    let h = Harness::silent();
    let r2 = h.seed(RunStatus::Succeeded);

    let err = h
        .coordinator
        .request_cancellation(r2.tenant_id, &r2, "user request")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CancellationError::NotCancellable { status: RunStatus::Succeeded, .. }
    ));
    assert!(h.channel.is_empty());
    assert_eq!(h.store.engine_reads(r2.id), 0);
    assert_eq!(h.store.status_reads(r2.id), 0);
}

#[tokio::test(start_paused = true)]
async fn pending_run_without_worker_reports_baseline_after_five_polls() {
    let h = Harness::silent();
    let r3 = h.seed(RunStatus::Pending);

    let outcome = h
        .coordinator
        .request_cancellation(r3.tenant_id, &r3, "user request")
        .await
        .unwrap();

    assert_eq!(h.channel.len(), 1);
    assert_eq!(outcome.status(), RunStatus::Pending);
    assert!(!outcome.converged());
    assert_eq!(outcome.run(), &r3);
    assert_eq!(outcome.convergence.attempts, 5);
    assert_eq!(h.store.status_reads(r3.id), 5);
    let waited = h.started.elapsed();
    assert!(waited >= Duration::from_millis(500) && waited < Duration::from_millis(600));
}

#[tokio::test(start_paused = true)]
async fn every_terminal_status_is_rejected() {
    let h = Harness::silent();
    for status in [RunStatus::Succeeded, RunStatus::Failed, RunStatus::Cancelled] {
        let run = h.seed(status);
        let err = h
            .coordinator
            .request_cancellation(run.tenant_id, &run, "")
            .await
            .unwrap_err();
        assert!(err.is_user_facing());
    }
    assert!(h.channel.is_empty());
}

#[tokio::test(start_paused = true)]
async fn every_cancellable_status_publishes_exactly_one_command() {
    for status in [RunStatus::Pending, RunStatus::Running] {
        let h = Harness::silent();
        let run = h.seed(status);

        h.coordinator
            .request_cancellation(run.tenant_id, &run, "")
            .await
            .unwrap();

        let published = h.channel.published();
        assert_eq!(published.len(), 1, "{status}");
        assert_eq!(published[0].queue, "job_processing_queue");
        assert_eq!(published[0].payload["reason"], "CANCELLED_BY_USER");
        assert_eq!(published[0].payload["propagate_to_children"], true);
    }
}

#[tokio::test(start_paused = true)]
async fn duplicate_requests_publish_twice_and_cancel_once() {
    let h = Harness::with_worker();
    let run = h.seed(RunStatus::Running);

    let (first, second) = futures::join!(
        h.coordinator.request_cancellation(run.tenant_id, &run, "first"),
        h.coordinator.request_cancellation(run.tenant_id, &run, "second"),
    );

    assert_eq!(first.unwrap().status(), RunStatus::Cancelled);
    assert_eq!(second.unwrap().status(), RunStatus::Cancelled);
    assert_eq!(h.channel.commands_for(run.id).len(), 2);
    assert_eq!(h.store.transition_count(run.id), 1);
    assert_eq!(h.store.get(run.id).unwrap().status, RunStatus::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn natural_completion_race_is_reported_as_is() {
    let h = Harness::silent();
    let run = h.seed(RunStatus::Running);
    h.store
        .transition_after_reads(run.id, 1, RunStatus::Succeeded);

    let outcome = h
        .coordinator
        .request_cancellation(run.tenant_id, &run, "")
        .await
        .unwrap();

    assert!(outcome.converged());
    assert!(!outcome.is_confirmed());
    assert_eq!(outcome.status(), RunStatus::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn engine_lookup_failure_issues_no_command() {
    let h = Harness::silent();
    let run = h.seed(RunStatus::Running);
    h.store
        .fail_engine_lookups(run.id, StoreError::Unavailable("replica lag".to_string()));

    let err = h
        .coordinator
        .request_cancellation(run.tenant_id, &run, "")
        .await
        .unwrap_err();

    assert!(matches!(err, CancellationError::LookupFailed { .. }));
    assert!(h.channel.is_empty());
}

#[tokio::test(start_paused = true)]
async fn publish_failure_means_nothing_was_requested() {
    let h = Harness::silent();
    let run = h.seed(RunStatus::Running);
    h.channel
        .fail_with(PublishError::Rejected("queue full".to_string()));

    let err = h
        .coordinator
        .request_cancellation(run.tenant_id, &run, "")
        .await
        .unwrap_err();

    assert!(matches!(err, CancellationError::DispatchFailed { .. }));
    assert_eq!(h.store.status_reads(run.id), 0);
    assert_eq!(CancelResponse::from(Err(err)).status_code(), 500);
}

#[tokio::test(start_paused = true)]
async fn poll_failure_aborts_the_wait() {
    let h = Harness::silent();
    let run = h.seed(RunStatus::Running);
    h.store
        .fail_status_reads(run.id, StoreError::Query("statement timeout".to_string()));

    let err = h
        .coordinator
        .request_cancellation(run.tenant_id, &run, "")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CancellationError::LookupFailed { operation: "get_run_status", .. }
    ));
    assert_eq!(h.channel.len(), 1);
    assert_eq!(h.store.status_reads(run.id), 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_by_id_is_tenant_scoped() {
    let h = Harness::silent();
    let run = h.seed(RunStatus::Running);

    let err = h
        .coordinator
        .cancel_by_id(TenantId::new(), run.id, "")
        .await
        .unwrap_err();
    assert!(matches!(err, CancellationError::RunNotFound { .. }));
    assert!(h.channel.is_empty());
    assert_eq!(h.events.events_of_type(CANCELLATION_REJECTED).len(), 1);

    let outcome = h
        .coordinator
        .cancel_by_id(run.tenant_id, run.id, "")
        .await
        .unwrap();
    assert_eq!(outcome.command.tenant_id(), run.tenant_id);
}

#[tokio::test(start_paused = true)]
async fn boundary_rejects_finished_run() {
    let h = Harness::silent();
    let run = h.seed(RunStatus::Failed);

    let response = CancelResponse::from(h.coordinator.cancel_by_id(run.tenant_id, run.id, "").await);

    assert_eq!(response.status_code(), 400);
    assert_eq!(
        response.body().unwrap()["errors"][0]["description"],
        "step run is not in a running or pending state"
    );
}

#[tokio::test]
async fn wall_clock_watch_is_bounded() {
    let store = Arc::new(InMemoryRunStore::new());
    let channel = Arc::new(RecordingCommandChannel::new());
    let coordinator = CancellationCoordinator::new(
        CancellationPorts::from_store(store.clone(), channel.clone()),
        CancellationConfig::default()
            .with_poll_interval_ms(2)
            .with_max_attempts(3),
    );
    let run = StepRun::new(RunId::new(), TenantId::new(), RunStatus::Running);
    store.insert(run.clone());

    let outcome = coordinator
        .request_cancellation(run.tenant_id, &run, "")
        .await
        .unwrap();

    assert_eq!(outcome.convergence.attempts, 3);
    assert!(outcome.convergence.elapsed >= Duration::from_millis(6));
    assert_eq!(channel.published()[0].routing_key, format!("run:{}", run.id));
}
