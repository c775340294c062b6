// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The queue broker: durable priority queues plus the job-state map.
//!
//! All mutations go through one lock so pending→claimed is atomic: two
//! concurrent claims on the same job produce exactly one winner. Every
//! mutation is journaled before the call returns.

use crate::journal::{Journal, JournalError};
use crate::queue::PoolQueue;
use async_trait::async_trait;
use cf_core::{Clock, ErrorClass, Job, JobConfig, JobId, JobStatus, SystemClock, WorkerId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Journal entries between compactions before the broker rewrites its log.
const CHECKPOINT_THRESHOLD: u64 = 4096;

/// Errors surfaced by broker operations.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker backend cannot be reached. Retryable; callers apply
    /// exponential backoff.
    #[error("broker unavailable: {0}")]
    Unavailable(String),
    #[error("job not found: {0}")]
    JobNotFound(String),
    #[error("invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },
    #[error("journal error: {0}")]
    Journal(#[from] JournalError),
}

impl BrokerError {
    pub fn class(&self) -> ErrorClass {
        match self {
            BrokerError::Unavailable(_) | BrokerError::Journal(_) => ErrorClass::Transient,
            BrokerError::JobNotFound(_) | BrokerError::InvalidTransition { .. } => {
                ErrorClass::Payload
            }
        }
    }
}

/// Outcome of a nack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NackOutcome {
    /// Returned to pending; requeue budget consumed
    Requeued,
    /// Terminal failure recorded on the job
    Failed,
    /// Dead-lettered (budget exhausted or non-retryable payload)
    DeadLettered,
}

/// Outcome of a supervisor recovery requeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequeueOutcome {
    Requeued,
    DeadLettered,
}

/// Journaled broker operations. Replayed in order at open to rebuild state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BrokerOp {
    Enqueued {
        job: Job,
    },
    Claimed {
        job_id: JobId,
        worker_id: WorkerId,
        at_ms: u64,
    },
    Started {
        job_id: JobId,
    },
    Acked {
        job_id: JobId,
        result: serde_json::Value,
        at_ms: u64,
    },
    Nacked {
        job_id: JobId,
        error: String,
        class: ErrorClass,
        outcome: NackOutcome,
        at_ms: u64,
    },
    Deadlettered {
        job_id: JobId,
        error: String,
        at_ms: u64,
    },
    Reset {
        job_id: JobId,
    },
    /// Full job state written at compaction time
    Restored {
        job: Job,
    },
}

#[derive(Default)]
struct BrokerInner {
    queues: HashMap<String, PoolQueue>,
    jobs: HashMap<String, Job>,
    enqueue_seq: u64,
}

impl BrokerInner {
    fn push_pending(&mut self, job: &Job, seq: u64) {
        self.queues.entry(job.pool.clone()).or_default().push(
            job.priority,
            job.created_at_ms,
            seq,
            &job.id,
        );
    }

    /// Apply a journaled operation. Used identically for live mutation and
    /// replay, so the two paths cannot diverge.
    fn apply(&mut self, op: &BrokerOp) {
        match op {
            BrokerOp::Enqueued { job } | BrokerOp::Restored { job } => {
                self.enqueue_seq += 1;
                let seq = self.enqueue_seq;
                if job.status == JobStatus::Pending {
                    self.push_pending(job, seq);
                }
                self.jobs.insert(job.id.to_string(), job.clone());
            }
            BrokerOp::Claimed {
                job_id,
                worker_id,
                at_ms,
            } => {
                if let Some(q) = self.jobs.get(job_id.as_str()).map(|j| j.pool.clone()) {
                    if let Some(queue) = self.queues.get_mut(&q) {
                        queue.remove(job_id);
                    }
                }
                if let Some(job) = self.jobs.get_mut(job_id.as_str()) {
                    job.mark_claimed(worker_id.clone(), *at_ms);
                }
            }
            BrokerOp::Started { job_id } => {
                if let Some(job) = self.jobs.get_mut(job_id.as_str()) {
                    job.mark_running();
                }
            }
            BrokerOp::Acked {
                job_id,
                result,
                at_ms,
            } => {
                if let Some(job) = self.jobs.get_mut(job_id.as_str()) {
                    job.mark_completed(result.clone(), *at_ms);
                }
            }
            BrokerOp::Nacked {
                job_id,
                error,
                class,
                outcome,
                at_ms,
            } => {
                self.enqueue_seq += 1;
                let seq = self.enqueue_seq;
                if let Some(job) = self.jobs.get_mut(job_id.as_str()) {
                    match outcome {
                        NackOutcome::Requeued => {
                            job.mark_requeued(error.clone());
                            let job = job.clone();
                            self.push_pending(&job, seq);
                        }
                        NackOutcome::Failed => job.mark_failed(error.clone(), *class, *at_ms),
                        NackOutcome::DeadLettered => job.mark_dead(error.clone(), *class, *at_ms),
                    }
                }
            }
            BrokerOp::Deadlettered {
                job_id,
                error,
                at_ms,
            } => {
                if let Some(pool) = self.jobs.get(job_id.as_str()).map(|j| j.pool.clone()) {
                    if let Some(queue) = self.queues.get_mut(&pool) {
                        queue.remove(job_id);
                    }
                }
                if let Some(job) = self.jobs.get_mut(job_id.as_str()) {
                    job.mark_dead(error.clone(), ErrorClass::Poison, *at_ms);
                }
            }
            BrokerOp::Reset { job_id } => {
                self.enqueue_seq += 1;
                let seq = self.enqueue_seq;
                if let Some(job) = self.jobs.get_mut(job_id.as_str()) {
                    job.reset_for_requeue();
                    let job = job.clone();
                    self.push_pending(&job, seq);
                }
            }
        }
    }
}

/// Broker contract shared by the in-process implementation and any remote
/// backend. Operations are atomic at job-id granularity.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn enqueue(&self, config: JobConfig) -> Result<Job, BrokerError>;

    /// Claim the highest-priority pending job, ties by oldest creation.
    /// Exactly one concurrent caller wins any given job.
    async fn claim(&self, pool: &str, worker: &WorkerId) -> Result<Option<Job>, BrokerError>;

    /// Transition a claimed job to running (increments `attempts`).
    async fn start(&self, job_id: &JobId) -> Result<(), BrokerError>;

    async fn ack(&self, job_id: &JobId, result: serde_json::Value) -> Result<Job, BrokerError>;

    /// Record a failure. With `requeue` the job returns to pending while
    /// budget remains, then dead-letters; without it the failure is
    /// terminal (dead for payload errors, failed otherwise).
    async fn nack(
        &self,
        job_id: &JobId,
        error: &str,
        class: ErrorClass,
        requeue: bool,
    ) -> Result<NackOutcome, BrokerError>;

    async fn deadletter(&self, job_id: &JobId, error: &str) -> Result<(), BrokerError>;

    /// Supervisor path: recover a job whose worker disappeared. Honors the
    /// requeue cap and dead-letters past it.
    async fn requeue_lost(&self, job_id: &JobId, error: &str)
        -> Result<RequeueOutcome, BrokerError>;

    /// Operator path: reset counters and re-pend a job. Distinct from
    /// automatic retry.
    async fn reset(&self, job_id: &JobId) -> Result<Job, BrokerError>;

    async fn job(&self, job_id: &JobId) -> Result<Option<Job>, BrokerError>;

    /// Jobs currently claimed or running (supervisor scan surface).
    async fn in_flight(&self) -> Result<Vec<Job>, BrokerError>;

    /// Pending job ids for a pool in claim order.
    async fn peek(&self, pool: &str) -> Result<Vec<JobId>, BrokerError>;

    async fn pool_depth(&self, pool: &str) -> Result<usize, BrokerError>;
}

/// In-process broker with a journal-backed job-state map.
pub struct DurableBroker<C: Clock = SystemClock> {
    inner: Mutex<BrokerInner>,
    journal: Mutex<Journal<BrokerOp>>,
    clock: C,
}

impl DurableBroker<SystemClock> {
    pub fn open(path: &Path) -> Result<Self, BrokerError> {
        Self::open_with_clock(path, SystemClock)
    }
}

impl<C: Clock> DurableBroker<C> {
    pub fn open_with_clock(path: &Path, clock: C) -> Result<Self, BrokerError> {
        let (journal, entries) = Journal::open(path)?;
        let mut inner = BrokerInner::default();
        for entry in &entries {
            inner.apply(&entry.record);
        }
        info!(
            path = %path.display(),
            jobs = inner.jobs.len(),
            "broker journal replayed"
        );
        Ok(Self {
            inner: Mutex::new(inner),
            journal: Mutex::new(journal),
            clock,
        })
    }

    /// Apply an op to state and journal it, compacting when the journal
    /// has grown past the checkpoint threshold.
    fn commit(&self, op: BrokerOp) -> Result<(), BrokerError> {
        let mut inner = self.inner.lock();
        inner.apply(&op);

        let mut journal = self.journal.lock();
        journal.append(&op)?;
        if journal.needs_flush() {
            journal.flush()?;
        }

        if journal.appended_since_rewrite() >= CHECKPOINT_THRESHOLD {
            // Terminal jobs live on in the ledger; compaction keeps only
            // jobs that still need the broker.
            let live: Vec<BrokerOp> = inner
                .jobs
                .values()
                .filter(|j| !j.is_terminal())
                .map(|j| BrokerOp::Restored { job: j.clone() })
                .collect();
            inner.jobs.retain(|_, j| !j.is_terminal());
            journal.rewrite(&live)?;
            debug!(live = live.len(), "broker journal compacted");
        }

        Ok(())
    }

    /// Force any buffered journal entries to disk.
    pub fn flush(&self) -> Result<(), BrokerError> {
        self.journal.lock().flush()?;
        Ok(())
    }

    fn get(&self, job_id: &JobId) -> Result<Job, BrokerError> {
        self.inner
            .lock()
            .jobs
            .get(job_id.as_str())
            .cloned()
            .ok_or_else(|| BrokerError::JobNotFound(job_id.to_string()))
    }

    fn check_transition(job: &Job, to: JobStatus) -> Result<(), BrokerError> {
        if job.status.can_transition(to) {
            Ok(())
        } else {
            Err(BrokerError::InvalidTransition {
                job_id: job.id.to_string(),
                from: job.status,
                to,
            })
        }
    }
}

#[async_trait]
impl<C: Clock> Broker for DurableBroker<C> {
    async fn enqueue(&self, config: JobConfig) -> Result<Job, BrokerError> {
        let job = Job::new(config, self.clock.epoch_ms());
        debug!(job_id = %job.id, pool = %job.pool, priority = job.priority, "enqueue");
        self.commit(BrokerOp::Enqueued { job: job.clone() })?;
        Ok(job)
    }

    async fn claim(&self, pool: &str, worker: &WorkerId) -> Result<Option<Job>, BrokerError> {
        let at_ms = self.clock.epoch_ms();
        // Winner selection and the claim op are decided under one lock
        let claimed = {
            let mut inner = self.inner.lock();
            let mut found = None;
            while let Some(job_id) = inner
                .queues
                .get_mut(pool)
                .and_then(|q| q.pop())
            {
                match inner.jobs.get(job_id.as_str()) {
                    Some(job) if job.status == JobStatus::Pending => {
                        found = Some(job_id);
                        break;
                    }
                    // Stale queue entry (job already moved on); keep popping
                    _ => continue,
                }
            }
            if let Some(ref job_id) = found {
                if let Some(job) = inner.jobs.get_mut(job_id.as_str()) {
                    job.mark_claimed(worker.clone(), at_ms);
                }
            }
            found
        };

        let Some(job_id) = claimed else {
            return Ok(None);
        };

        // State is already mutated; journal the fact
        let op = BrokerOp::Claimed {
            job_id: job_id.clone(),
            worker_id: worker.clone(),
            at_ms,
        };
        {
            let mut journal = self.journal.lock();
            journal.append(&op)?;
            if journal.needs_flush() {
                journal.flush()?;
            }
        }

        let job = self.get(&job_id)?;
        debug!(job_id = %job_id, pool, worker = %worker, "claimed");
        Ok(Some(job))
    }

    async fn start(&self, job_id: &JobId) -> Result<(), BrokerError> {
        let job = self.get(job_id)?;
        Self::check_transition(&job, JobStatus::Running)?;
        self.commit(BrokerOp::Started {
            job_id: job_id.clone(),
        })
    }

    async fn ack(&self, job_id: &JobId, result: serde_json::Value) -> Result<Job, BrokerError> {
        let job = self.get(job_id)?;
        Self::check_transition(&job, JobStatus::Completed)?;
        self.commit(BrokerOp::Acked {
            job_id: job_id.clone(),
            result,
            at_ms: self.clock.epoch_ms(),
        })?;
        self.get(job_id)
    }

    async fn nack(
        &self,
        job_id: &JobId,
        error: &str,
        class: ErrorClass,
        requeue: bool,
    ) -> Result<NackOutcome, BrokerError> {
        let job = self.get(job_id)?;
        if job.is_terminal() {
            return Err(BrokerError::InvalidTransition {
                job_id: job_id.to_string(),
                from: job.status,
                to: JobStatus::Failed,
            });
        }

        let outcome = if requeue {
            if job.can_requeue() {
                NackOutcome::Requeued
            } else {
                NackOutcome::DeadLettered
            }
        } else if class == ErrorClass::Payload {
            NackOutcome::DeadLettered
        } else {
            NackOutcome::Failed
        };

        self.commit(BrokerOp::Nacked {
            job_id: job_id.clone(),
            error: error.to_string(),
            class,
            outcome,
            at_ms: self.clock.epoch_ms(),
        })?;
        Ok(outcome)
    }

    async fn deadletter(&self, job_id: &JobId, error: &str) -> Result<(), BrokerError> {
        let job = self.get(job_id)?;
        if job.is_terminal() {
            return Ok(());
        }
        self.commit(BrokerOp::Deadlettered {
            job_id: job_id.clone(),
            error: error.to_string(),
            at_ms: self.clock.epoch_ms(),
        })
    }

    async fn requeue_lost(
        &self,
        job_id: &JobId,
        error: &str,
    ) -> Result<RequeueOutcome, BrokerError> {
        match self.nack(job_id, error, ErrorClass::Transient, true).await? {
            NackOutcome::Requeued => Ok(RequeueOutcome::Requeued),
            _ => Ok(RequeueOutcome::DeadLettered),
        }
    }

    async fn reset(&self, job_id: &JobId) -> Result<Job, BrokerError> {
        let _ = self.get(job_id)?;
        self.commit(BrokerOp::Reset {
            job_id: job_id.clone(),
        })?;
        self.get(job_id)
    }

    async fn job(&self, job_id: &JobId) -> Result<Option<Job>, BrokerError> {
        Ok(self.inner.lock().jobs.get(job_id.as_str()).cloned())
    }

    async fn in_flight(&self) -> Result<Vec<Job>, BrokerError> {
        Ok(self
            .inner
            .lock()
            .jobs
            .values()
            .filter(|j| matches!(j.status, JobStatus::Claimed | JobStatus::Running))
            .cloned()
            .collect())
    }

    async fn peek(&self, pool: &str) -> Result<Vec<JobId>, BrokerError> {
        Ok(self
            .inner
            .lock()
            .queues
            .get(pool)
            .map(|q| q.peek(usize::MAX))
            .unwrap_or_default())
    }

    async fn pool_depth(&self, pool: &str) -> Result<usize, BrokerError> {
        Ok(self.inner.lock().queues.get(pool).map_or(0, |q| q.len()))
    }
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;
