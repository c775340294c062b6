// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker runtime: claim, execute, heartbeat, finalize.
//!
//! A worker registers `(id, pool)` with TTL heartbeats, drains its pool's
//! queue, and runs the pool's stage handler under the pool timeout with a
//! cooperative cancellation token. Transient failures requeue up to the
//! job's cap; payload failures dead-letter immediately. A handler that
//! ignores cancellation past the grace window costs the worker, which
//! self-terminates and re-registers while the supervisor recovers its job.

use crate::activity::{ActivityLogger, WorkerLog};
use crate::directory::WorkerDirectory;
use crate::registry::HandlerRegistry;
use cf_broker::{Backoff, Broker, BrokerError, JobLedger, NackOutcome};
use cf_bus::EventBus;
use cf_core::{
    topics, BusEvent, Clock, CorrelationId, ErrorClass, Job, PoolDef, WorkerId, WorkerRecord,
};
use cf_pipeline::{StageContext, StageError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Grace window for handlers to honor cancellation before the worker
/// gives up on them.
const CANCEL_GRACE: Duration = Duration::from_secs(5);

/// Why the worker loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Shutdown requested
    Cancelled,
    /// A handler ignored cancellation past the grace window; the caller
    /// should re-register a fresh worker
    SelfTerminated,
}

pub struct WorkerParams<C: Clock> {
    pub id: WorkerId,
    pub pool: PoolDef,
    pub host: String,
    pub broker: Arc<dyn Broker>,
    pub ledger: Arc<JobLedger>,
    pub registry: Arc<HandlerRegistry>,
    pub directory: Arc<WorkerDirectory>,
    pub bus: EventBus,
    pub ctx: StageContext,
    pub clock: C,
    pub heartbeat_interval: Duration,
    pub logger: Arc<ActivityLogger<WorkerLog>>,
}

pub struct Worker<C: Clock> {
    params: WorkerParams<C>,
}

impl<C: Clock + 'static> Worker<C> {
    pub fn new(params: WorkerParams<C>) -> Self {
        Self { params }
    }

    /// Run until cancelled, re-registering after self-termination.
    pub async fn run_supervised(params: WorkerParams<C>, cancel: CancellationToken) {
        let mut generation = 0u32;
        loop {
            let id = if generation == 0 {
                params.id.clone()
            } else {
                WorkerId::new(format!("{}-r{generation}", params.id))
            };
            let worker = Worker::new(WorkerParams {
                id,
                pool: params.pool.clone(),
                host: params.host.clone(),
                broker: Arc::clone(&params.broker),
                ledger: Arc::clone(&params.ledger),
                registry: Arc::clone(&params.registry),
                directory: Arc::clone(&params.directory),
                bus: params.bus.clone(),
                ctx: params.ctx.clone(),
                clock: params.clock.clone(),
                heartbeat_interval: params.heartbeat_interval,
                logger: Arc::clone(&params.logger),
            });
            match worker.run(cancel.clone()).await {
                WorkerExit::Cancelled => return,
                WorkerExit::SelfTerminated => {
                    generation += 1;
                    warn!(pool = %params.pool.name, generation, "worker re-registering");
                }
            }
        }
    }

    pub async fn run(self, cancel: CancellationToken) -> WorkerExit {
        let p = &self.params;
        let record = WorkerRecord::new(
            p.id.clone(),
            p.pool.name.clone(),
            p.host.clone(),
            p.clock.epoch_ms(),
        );
        p.directory.register_worker(record);
        p.logger
            .append(p.id.as_str(), &format!("registered pool={}", p.pool.name));
        info!(worker = %p.id, pool = %p.pool.name, "worker registered");

        // Heartbeat task renews the TTL until the worker exits
        let heartbeat_cancel = cancel.child_token();
        let heartbeat = {
            let directory = Arc::clone(&p.directory);
            let id = p.id.clone();
            let clock = p.clock.clone();
            let interval = p.heartbeat_interval;
            let token = heartbeat_cancel.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(interval) => {
                            directory.heartbeat(&id, clock.epoch_ms());
                        }
                        _ = token.cancelled() => return,
                    }
                }
            })
        };

        let exit = self.claim_loop(&cancel).await;

        heartbeat_cancel.cancel();
        let _ = heartbeat.await;
        let p = &self.params;
        p.directory.deregister_worker(&p.id);
        p.logger.append(p.id.as_str(), "deregistered");
        exit
    }

    async fn claim_loop(&self, cancel: &CancellationToken) -> WorkerExit {
        let p = &self.params;
        let idle_backoff = Backoff::idle();
        let broker_backoff = Backoff::broker();
        let mut idle_rounds = 0u32;
        let mut broker_failures = 0u32;

        loop {
            if cancel.is_cancelled() {
                return WorkerExit::Cancelled;
            }

            match p.broker.claim(&p.pool.name, &p.id).await {
                Ok(Some(job)) => {
                    idle_rounds = 0;
                    broker_failures = 0;
                    match self.process_job(job, cancel).await {
                        Ok(()) => {}
                        Err(WorkerExit::Cancelled) => return WorkerExit::Cancelled,
                        Err(WorkerExit::SelfTerminated) => return WorkerExit::SelfTerminated,
                    }
                }
                Ok(None) => {
                    let delay = idle_backoff.delay(idle_rounds);
                    idle_rounds = idle_rounds.saturating_add(1);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return WorkerExit::Cancelled,
                    }
                }
                Err(e) => {
                    // Fail fast, retry with full-jitter backoff
                    let delay = broker_backoff.delay(broker_failures);
                    broker_failures = broker_failures.saturating_add(1);
                    warn!(worker = %p.id, error = %e, delay_ms = delay.as_millis() as u64, "claim failed");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return WorkerExit::Cancelled,
                    }
                }
            }
        }
    }

    /// Execute one claimed job to a terminal broker transition.
    async fn process_job(&self, job: Job, cancel: &CancellationToken) -> Result<(), WorkerExit> {
        let p = &self.params;
        let job_id = job.id.clone();
        p.directory.set_current_job(&p.id, Some(job_id.clone()));
        p.logger
            .append(p.id.as_str(), &format!("claimed job {job_id}"));

        if let Err(e) = p.broker.start(&job_id).await {
            warn!(job = %job_id, error = %e, "could not start job");
            p.directory.set_current_job(&p.id, None);
            return Ok(());
        }
        self.record_job(&job_id).await;

        let Some(handler) = p.registry.get(&p.pool.name) else {
            let _ = p
                .broker
                .nack(
                    &job_id,
                    &format!("no handler registered for pool {}", p.pool.name),
                    ErrorClass::Resource,
                    false,
                )
                .await;
            self.finish_job(&job_id).await;
            return Ok(());
        };

        // Run the handler on its own task so a stuck one can be abandoned
        let job_cancel = cancel.child_token();
        let mut handle = {
            let handler = Arc::clone(&handler);
            let payload = job.payload.clone();
            let ctx = p.ctx.clone();
            let token = job_cancel.clone();
            tokio::spawn(async move { handler.handle(&payload, &ctx, &token).await })
        };

        let outcome = match timeout(p.pool.job_timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(StageError::Failed(format!(
                "handler panicked: {join_error}"
            ))),
            Err(_) => {
                // Timeout: request cooperative cancellation, then wait out
                // the grace window
                job_cancel.cancel();
                match timeout(CANCEL_GRACE, &mut handle).await {
                    Ok(_) => Err(StageError::Transient("timeout".into())),
                    Err(_) => {
                        handle.abort();
                        warn!(
                            worker = %p.id,
                            job = %job_id,
                            "handler ignored cancellation; worker self-terminating"
                        );
                        let _ = p
                            .broker
                            .nack(&job_id, "timeout", ErrorClass::Transient, true)
                            .await;
                        self.finish_job(&job_id).await;
                        return Err(WorkerExit::SelfTerminated);
                    }
                }
            }
        };

        match outcome {
            Ok(result) => {
                match p.broker.ack(&job_id, result.clone()).await {
                    Ok(acked) => {
                        self.emit_stage_event(&acked, "completed", serde_json::json!({
                            "job_id": job_id,
                            "pool": p.pool.name,
                            "result": result,
                        }));
                        p.logger
                            .append(p.id.as_str(), &format!("completed job {job_id}"));
                    }
                    Err(e) => warn!(job = %job_id, error = %e, "ack failed"),
                }
            }
            Err(stage_error) => {
                self.handle_failure(&job, &stage_error).await;
            }
        }

        self.finish_job(&job_id).await;
        if cancel.is_cancelled() {
            return Err(WorkerExit::Cancelled);
        }
        Ok(())
    }

    async fn handle_failure(&self, job: &Job, error: &StageError) {
        let p = &self.params;
        let class = error.class();
        let requeue = class.retryable();
        let message = error.to_string();

        let outcome = match p.broker.nack(&job.id, &message, class, requeue).await {
            Ok(outcome) => outcome,
            Err(BrokerError::JobNotFound(_)) => return,
            Err(e) => {
                warn!(job = %job.id, error = %e, "nack failed");
                return;
            }
        };

        debug!(job = %job.id, class = %class, ?outcome, "job failed");
        p.logger.append(
            p.id.as_str(),
            &format!("job {} failed ({class}): {message}", job.id),
        );

        match outcome {
            NackOutcome::Requeued => {}
            NackOutcome::Failed | NackOutcome::DeadLettered => {
                if let Ok(Some(current)) = p.broker.job(&job.id).await {
                    self.emit_stage_event(&current, "failed", serde_json::json!({
                        "job_id": job.id,
                        "pool": p.pool.name,
                        "error": message,
                        "class": class,
                        "dead": outcome == NackOutcome::DeadLettered,
                    }));
                    if outcome == NackOutcome::DeadLettered {
                        p.bus.publish(
                            BusEvent::new(
                                topics::JOB_DEAD,
                                format!("worker.{}", p.id),
                                serde_json::json!({"job_id": job.id, "pool": p.pool.name}),
                            ),
                        );
                    }
                }
            }
        }
    }

    fn emit_stage_event(&self, job: &Job, kind: &str, payload: serde_json::Value) {
        let p = &self.params;
        let stage = p
            .registry
            .get(&p.pool.name)
            .map(|h| h.stage().to_string())
            .unwrap_or_else(|| p.pool.name.clone());
        let topic = format!("stage.{stage}.{kind}");
        let mut event = BusEvent::new(topic, format!("worker.{}", p.id), payload);
        if let Some(correlation) = &job.correlation_id {
            event = event.correlated(CorrelationId::new(correlation.clone()));
        }
        p.bus.publish(event);
    }

    async fn record_job(&self, job_id: &cf_core::JobId) {
        let p = &self.params;
        if let Ok(Some(job)) = p.broker.job(job_id).await {
            if let Err(e) = p.ledger.record(&job) {
                warn!(job = %job_id, error = %e, "ledger record failed");
            }
        }
    }

    async fn finish_job(&self, job_id: &cf_core::JobId) {
        let p = &self.params;
        self.record_job(job_id).await;
        p.directory.set_current_job(&p.id, None);
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
