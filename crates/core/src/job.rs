// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job record and state machine.

use crate::error::ErrorClass;
use crate::worker::WorkerId;
use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Unique identifier for a job.
    ///
    /// Assigned at enqueue time and used to track the job through the
    /// broker, the record ledger, and the external API.
    #[derive(Default)]
    pub struct JobId, prefix "job";
}

/// Default cap on automatic worker-failure requeues before dead-lettering.
pub const DEFAULT_MAX_WORKER_REQUEUES: u32 = 3;

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Enqueued, waiting for a worker
    Pending,
    /// Atomically taken by exactly one worker, not yet executing
    Claimed,
    /// Handler executing on the claiming worker
    Running,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
    /// Dead-lettered: exhausted its requeue budget or carried a bad payload
    Dead,
}

impl JobStatus {
    /// Completed, failed, and dead jobs never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Dead)
    }

    /// Legal transitions of the job state machine.
    pub fn can_transition(&self, to: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, to),
            (Pending, Claimed)
                | (Claimed, Running)
                | (Claimed, Pending)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Pending)
                | (Running, Dead)
                | (Pending, Dead)
                | (Failed, Pending)
                | (Dead, Pending)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Claimed => write!(f, "claimed"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Dead => write!(f, "dead"),
        }
    }
}

/// Configuration for creating a new job
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub id: JobId,
    pub pool: String,
    pub payload: serde_json::Value,
    pub priority: i32,
    pub max_worker_requeues: u32,
    pub correlation_id: Option<String>,
}

impl JobConfig {
    pub fn new(id: impl Into<JobId>, pool: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            pool: pool.into(),
            payload,
            priority: 0,
            max_worker_requeues: DEFAULT_MAX_WORKER_REQUEUES,
            correlation_id: None,
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn max_worker_requeues(mut self, cap: u32) -> Self {
        self.max_worker_requeues = cap;
        self
    }

    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }
}

/// A unit of work addressed to a pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub pool: String,
    pub payload: serde_json::Value,
    pub priority: i32,
    pub status: JobStatus,
    /// Times a worker has begun executing this job
    pub attempts: u32,
    /// Times the supervisor or a nack has returned this job to pending
    pub worker_requeue_count: u32,
    pub max_worker_requeues: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_class: Option<ErrorClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<WorkerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalized_at_ms: Option<u64>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(config: JobConfig, created_at_ms: u64) -> Self {
        Self {
            id: config.id,
            pool: config.pool,
            payload: config.payload,
            priority: config.priority,
            status: JobStatus::Pending,
            attempts: 0,
            worker_requeue_count: 0,
            max_worker_requeues: config.max_worker_requeues,
            result: None,
            error: None,
            error_class: None,
            claimed_by: None,
            correlation_id: config.correlation_id,
            created_at_ms,
            claimed_at_ms: None,
            finalized_at_ms: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the requeue budget still permits an automatic return to pending.
    pub fn can_requeue(&self) -> bool {
        self.worker_requeue_count < self.max_worker_requeues
    }

    /// Record the winning claim. Guarded by the caller's atomic section.
    pub fn mark_claimed(&mut self, worker: WorkerId, at_ms: u64) {
        self.status = JobStatus::Claimed;
        self.claimed_by = Some(worker);
        self.claimed_at_ms = Some(at_ms);
    }

    pub fn mark_running(&mut self) {
        self.status = JobStatus::Running;
        self.attempts += 1;
    }

    pub fn mark_completed(&mut self, result: serde_json::Value, at_ms: u64) {
        self.status = JobStatus::Completed;
        self.result = Some(result);
        self.claimed_by = None;
        self.finalized_at_ms = Some(at_ms);
    }

    pub fn mark_failed(&mut self, error: impl Into<String>, class: ErrorClass, at_ms: u64) {
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.error_class = Some(class);
        self.claimed_by = None;
        self.finalized_at_ms = Some(at_ms);
    }

    pub fn mark_dead(&mut self, error: impl Into<String>, class: ErrorClass, at_ms: u64) {
        self.status = JobStatus::Dead;
        self.error = Some(error.into());
        self.error_class = Some(class);
        self.claimed_by = None;
        self.finalized_at_ms = Some(at_ms);
    }

    /// Return the job to pending after a worker failure, consuming one unit
    /// of the requeue budget. Callers must check [`Job::can_requeue`] first.
    pub fn mark_requeued(&mut self, error: impl Into<String>) {
        self.worker_requeue_count += 1;
        self.status = JobStatus::Pending;
        self.error = Some(error.into());
        self.claimed_by = None;
        self.claimed_at_ms = None;
    }

    /// Operator-initiated reset: zero the requeue budget and re-pend the job.
    /// Distinct from automatic retry.
    pub fn reset_for_requeue(&mut self) {
        self.worker_requeue_count = 0;
        self.attempts = 0;
        self.status = JobStatus::Pending;
        self.error = None;
        self.error_class = None;
        self.result = None;
        self.claimed_by = None;
        self.claimed_at_ms = None;
        self.finalized_at_ms = None;
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
