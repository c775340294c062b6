// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat supervisor.
//!
//! Scans in-flight jobs for owners whose heartbeat has expired and
//! requeues them, incrementing `worker_requeue_count`. Past the cap the
//! job is dead-lettered instead, so a poison job stops crashing workers.

use crate::directory::WorkerDirectory;
use cf_broker::{Broker, JobLedger, RequeueOutcome};
use cf_bus::EventBus;
use cf_core::{topics, BusEvent, Clock, CorrelationId};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Heartbeats older than `expiry_factor * heartbeat_interval` mark a
/// worker dead.
const EXPIRY_FACTOR: u32 = 3;

pub struct SupervisorParams<C: Clock> {
    pub broker: Arc<dyn Broker>,
    pub ledger: Arc<JobLedger>,
    pub directory: Arc<WorkerDirectory>,
    pub bus: EventBus,
    pub clock: C,
    pub heartbeat_interval: Duration,
}

pub struct Supervisor<C: Clock> {
    params: SupervisorParams<C>,
}

impl<C: Clock> Supervisor<C> {
    pub fn new(params: SupervisorParams<C>) -> Self {
        Self { params }
    }

    fn ttl_ms(&self) -> u64 {
        self.params.heartbeat_interval.as_millis() as u64 * EXPIRY_FACTOR as u64
    }

    /// Periodic scan loop; runs until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        let interval = self.params.heartbeat_interval;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = self.scan_once().await {
                        warn!(error = %e, "supervisor scan failed");
                    }
                }
                _ = cancel.cancelled() => return,
            }
        }
    }

    /// One recovery pass. Returns how many jobs were recovered.
    pub async fn scan_once(&self) -> Result<usize, crate::RuntimeError> {
        let p = &self.params;
        let now_ms = p.clock.epoch_ms();
        let ttl_ms = self.ttl_ms();

        let mut recovered = 0usize;
        for job in p.broker.in_flight().await? {
            let Some(owner) = &job.claimed_by else {
                continue;
            };
            if p.directory.is_live(owner, now_ms, ttl_ms) {
                continue;
            }

            // Owner gone: recover the job under the requeue cap
            let outcome = p
                .broker
                .requeue_lost(&job.id, &format!("worker {owner} heartbeat expired"))
                .await?;
            recovered += 1;

            match outcome {
                RequeueOutcome::Requeued => {
                    info!(job = %job.id, worker = %owner, "requeued job from dead worker");
                }
                RequeueOutcome::DeadLettered => {
                    warn!(
                        job = %job.id,
                        requeues = job.worker_requeue_count,
                        "requeue cap reached, job dead-lettered"
                    );
                    let mut event = BusEvent::new(
                        topics::JOB_DEAD,
                        "supervisor",
                        serde_json::json!({
                            "job_id": job.id,
                            "pool": job.pool,
                            "error": "worker requeue cap exceeded",
                        }),
                    );
                    if let Some(correlation) = &job.correlation_id {
                        event = event.correlated(CorrelationId::new(correlation.clone()));
                    }
                    p.bus.publish(event);

                    let mut failed = BusEvent::new(
                        topics::DOCUMENT_FAILED,
                        "supervisor",
                        serde_json::json!({
                            "document_id": job.correlation_id,
                            "job_id": job.id,
                            "reason": "poison job dead-lettered",
                        }),
                    );
                    if let Some(correlation) = &job.correlation_id {
                        failed = failed.correlated(CorrelationId::new(correlation.clone()));
                    }
                    p.bus.publish(failed);
                }
            }

            if let Ok(Some(updated)) = p.broker.job(&job.id).await {
                let _ = p.ledger.record(&updated);
            }
        }

        // Drop expired workers from the directory
        for worker in p.directory.prune_expired(now_ms, ttl_ms) {
            info!(worker = %worker.id, pool = %worker.pool, "pruned expired worker");
        }

        // Enforce the ledger retention window
        p.ledger.purge_expired(now_ms)?;

        Ok(recovered)
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
