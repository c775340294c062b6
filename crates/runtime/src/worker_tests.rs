// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::registry::HandlerRegistry;
use cf_broker::DurableBroker;
use cf_bus::TopicPattern;
use cf_core::{FakeClock, JobConfig, JobId, JobStatus, ResourceTier};
use cf_pipeline::StageHandler;
use cf_store::{ContentStore, CoreSchema, VectorStore};
use std::path::PathBuf;
use std::time::Duration;

struct EchoHandler;

#[async_trait::async_trait]
impl StageHandler for EchoHandler {
    fn stage(&self) -> &'static str {
        "echo"
    }
    async fn handle(
        &self,
        payload: &serde_json::Value,
        _ctx: &StageContext,
        _cancel: &CancellationToken,
    ) -> Result<serde_json::Value, StageError> {
        Ok(serde_json::json!({"echo": payload}))
    }
}

struct FailingHandler(ErrorClass);

#[async_trait::async_trait]
impl StageHandler for FailingHandler {
    fn stage(&self) -> &'static str {
        "echo"
    }
    async fn handle(
        &self,
        _payload: &serde_json::Value,
        _ctx: &StageContext,
        _cancel: &CancellationToken,
    ) -> Result<serde_json::Value, StageError> {
        match self.0 {
            ErrorClass::Payload => Err(StageError::FileNotFound("gone.pdf".into())),
            ErrorClass::Stage => Err(StageError::Failed("no engine output".into())),
            _ => Err(StageError::Transient("flaky backend".into())),
        }
    }
}

/// Sleeps forever but honors cancellation.
struct CooperativeSlowHandler;

#[async_trait::async_trait]
impl StageHandler for CooperativeSlowHandler {
    fn stage(&self) -> &'static str {
        "echo"
    }
    async fn handle(
        &self,
        _payload: &serde_json::Value,
        _ctx: &StageContext,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, StageError> {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(3600)) => {
                Ok(serde_json::json!({}))
            }
            _ = cancel.cancelled() => Err(StageError::Cancelled),
        }
    }
}

/// Ignores cancellation entirely.
struct StuckHandler;

#[async_trait::async_trait]
impl StageHandler for StuckHandler {
    fn stage(&self) -> &'static str {
        "echo"
    }
    async fn handle(
        &self,
        _payload: &serde_json::Value,
        _ctx: &StageContext,
        _cancel: &CancellationToken,
    ) -> Result<serde_json::Value, StageError> {
        tokio::time::sleep(Duration::from_secs(86_400)).await;
        Ok(serde_json::json!({}))
    }
}

struct Harness {
    broker: Arc<dyn Broker>,
    ledger: Arc<JobLedger>,
    registry: Arc<HandlerRegistry>,
    directory: Arc<WorkerDirectory>,
    bus: EventBus,
    ctx: StageContext,
    clock: FakeClock,
    log_dir: PathBuf,
    _dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let broker: Arc<dyn Broker> = Arc::new(
        DurableBroker::open_with_clock(&dir.path().join("broker.jsonl"), clock.clone()).unwrap(),
    );
    let ledger = Arc::new(JobLedger::open(&dir.path().join("ledger.jsonl")).unwrap());
    let store = ContentStore::open(&dir.path().join("store")).unwrap();
    let bus = EventBus::new();
    let ctx = StageContext {
        core: CoreSchema::open(store.schema("core").unwrap()).unwrap(),
        vectors: VectorStore::open(store.schema("vectors").unwrap()).unwrap(),
        bus: bus.clone(),
        data_root: dir.path().to_path_buf(),
    };
    Harness {
        broker,
        ledger,
        registry: Arc::new(HandlerRegistry::new()),
        directory: Arc::new(WorkerDirectory::new()),
        bus,
        ctx,
        clock,
        log_dir: dir.path().join("logs"),
        _dir: dir,
    }
}

fn params(h: &Harness, timeout: Duration) -> WorkerParams<FakeClock> {
    WorkerParams {
        id: WorkerId::new("w1"),
        pool: PoolDef::new("p", ResourceTier::CpuLight).job_timeout(timeout),
        host: "localhost".into(),
        broker: Arc::clone(&h.broker),
        ledger: Arc::clone(&h.ledger),
        registry: Arc::clone(&h.registry),
        directory: Arc::clone(&h.directory),
        bus: h.bus.clone(),
        ctx: h.ctx.clone(),
        clock: h.clock.clone(),
        heartbeat_interval: Duration::from_secs(5),
        logger: Arc::new(ActivityLogger::new(h.log_dir.clone())),
    }
}

async fn wait_for_status(h: &Harness, job_id: &JobId, status: JobStatus) {
    for _ in 0..2_000 {
        if let Some(job) = h.broker.job(job_id).await.unwrap() {
            if job.status == status {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {job_id} never reached {status}");
}

#[tokio::test(start_paused = true)]
async fn completes_job_and_emits_stage_event(){
    let h = harness();
    h.registry.register("p", Arc::new(EchoHandler));
    let events = h
        .bus
        .subscribe(TopicPattern::parse("stage.echo.completed").unwrap());

    let job = h
        .broker
        .enqueue(
            JobConfig::new(JobId::new("j1"), "p", serde_json::json!({"n": 1}))
                .correlation_id("doc-1"),
        )
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(Worker::new(params(&h, Duration::from_secs(30))).run(cancel.clone()));

    wait_for_status(&h, &job.id, JobStatus::Completed).await;
    cancel.cancel();
    assert_eq!(handle.await.unwrap(), WorkerExit::Cancelled);

    let done = h.broker.job(&job.id).await.unwrap().unwrap();
    assert_eq!(done.attempts, 1);
    assert_eq!(done.result.as_ref().unwrap()["echo"]["n"], 1);

    let event = events.recv().await.unwrap();
    assert_eq!(event.correlation_id.as_ref().unwrap().as_str(), "doc-1");
    assert_eq!(event.payload["job_id"], "j1");

    // Ledger carries the canonical record
    assert_eq!(h.ledger.get(&job.id).unwrap().status, JobStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_requeue_then_dead_letter() {
    let h = harness();
    h.registry
        .register("p", Arc::new(FailingHandler(ErrorClass::Transient)));

    let job = h
        .broker
        .enqueue(
            JobConfig::new(JobId::new("j1"), "p", serde_json::json!({})).max_worker_requeues(2),
        )
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(Worker::new(params(&h, Duration::from_secs(30))).run(cancel.clone()));

    wait_for_status(&h, &job.id, JobStatus::Dead).await;
    cancel.cancel();
    let _ = handle.await;

    let dead = h.broker.job(&job.id).await.unwrap().unwrap();
    assert_eq!(dead.worker_requeue_count, 2);
    assert_eq!(dead.attempts, 3); // initial run + two requeues
}

#[tokio::test(start_paused = true)]
async fn payload_failure_dead_letters_immediately() {
    let h = harness();
    h.registry
        .register("p", Arc::new(FailingHandler(ErrorClass::Payload)));
    let failed_events = h
        .bus
        .subscribe(TopicPattern::parse("stage.echo.failed").unwrap());

    let job = h
        .broker
        .enqueue(JobConfig::new(JobId::new("j1"), "p", serde_json::json!({})))
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(Worker::new(params(&h, Duration::from_secs(30))).run(cancel.clone()));

    wait_for_status(&h, &job.id, JobStatus::Dead).await;
    cancel.cancel();
    let _ = handle.await;

    let dead = h.broker.job(&job.id).await.unwrap().unwrap();
    assert_eq!(dead.attempts, 1);
    assert_eq!(dead.error_class, Some(ErrorClass::Payload));

    let event = failed_events.recv().await.unwrap();
    assert_eq!(event.payload["dead"], true);
}

#[tokio::test(start_paused = true)]
async fn stage_failure_marks_job_failed() {
    let h = harness();
    h.registry
        .register("p", Arc::new(FailingHandler(ErrorClass::Stage)));

    let job = h
        .broker
        .enqueue(JobConfig::new(JobId::new("j1"), "p", serde_json::json!({})))
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(Worker::new(params(&h, Duration::from_secs(30))).run(cancel.clone()));

    wait_for_status(&h, &job.id, JobStatus::Failed).await;
    cancel.cancel();
    let _ = handle.await;
}

#[tokio::test(start_paused = true)]
async fn timeout_cancels_cooperative_handler_and_requeues() {
    let h = harness();
    h.registry.register("p", Arc::new(CooperativeSlowHandler));

    let job = h
        .broker
        .enqueue(
            JobConfig::new(JobId::new("j1"), "p", serde_json::json!({})).max_worker_requeues(5),
        )
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let handle =
        tokio::spawn(Worker::new(params(&h, Duration::from_millis(100))).run(cancel.clone()));

    // The job cycles: claim, time out, requeue. Wait for one budget unit.
    for _ in 0..2_000 {
        if let Some(j) = h.broker.job(&job.id).await.unwrap() {
            if j.worker_requeue_count >= 1 {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cancel.cancel();
    let _ = handle.await;

    let requeued = h.broker.job(&job.id).await.unwrap().unwrap();
    assert!(requeued.worker_requeue_count >= 1);
    assert_eq!(requeued.error.as_deref(), Some("timeout"));
}

#[tokio::test(start_paused = true)]
async fn stuck_handler_costs_the_worker() {
    let h = harness();
    h.registry.register("p", Arc::new(StuckHandler));

    let job = h
        .broker
        .enqueue(
            JobConfig::new(JobId::new("j1"), "p", serde_json::json!({})).max_worker_requeues(5),
        )
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let exit = Worker::new(params(&h, Duration::from_millis(100)))
        .run(cancel.clone())
        .await;
    assert_eq!(exit, WorkerExit::SelfTerminated);

    // The job went back to pending for the next worker
    let requeued = h.broker.job(&job.id).await.unwrap().unwrap();
    assert_eq!(requeued.status, JobStatus::Pending);
    // And the dead worker is gone from the directory
    assert!(h.directory.worker(&WorkerId::new("w1")).is_none());
}
