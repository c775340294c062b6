// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker registration records.

use crate::job::JobId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a worker instance.
    pub struct WorkerId, prefix "worker";
}

/// A registered executor draining one pool's queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub id: WorkerId,
    pub pool: String,
    pub host: String,
    pub registered_at_ms: u64,
    pub last_heartbeat_ms: u64,
    /// Non-null iff a job's `claimed_by` equals this worker id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_job_id: Option<JobId>,
}

impl WorkerRecord {
    pub fn new(id: WorkerId, pool: impl Into<String>, host: impl Into<String>, now_ms: u64) -> Self {
        Self {
            id,
            pool: pool.into(),
            host: host.into(),
            registered_at_ms: now_ms,
            last_heartbeat_ms: now_ms,
            current_job_id: None,
        }
    }

    /// A worker is expired once its heartbeat is older than the TTL.
    pub fn is_expired(&self, now_ms: u64, ttl_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_heartbeat_ms) > ttl_ms
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
