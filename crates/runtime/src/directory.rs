// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker directory: pool declarations and live worker registrations.
//!
//! The single shared view of who is draining which pool. Workers renew
//! TTL heartbeats here; the supervisor and dispatcher read liveness.

use cf_core::{JobId, PoolDef, WorkerId, WorkerRecord};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
struct DirectoryInner {
    pools: HashMap<String, PoolDef>,
    workers: HashMap<String, WorkerRecord>,
    /// Last registration or heartbeat seen per pool, for staleness checks
    pool_liveness: HashMap<String, u64>,
}

#[derive(Default)]
pub struct WorkerDirectory {
    inner: Mutex<DirectoryInner>,
}

impl WorkerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_pool(&self, pool: PoolDef) {
        self.inner.lock().pools.insert(pool.name.clone(), pool);
    }

    pub fn pool(&self, name: &str) -> Option<PoolDef> {
        self.inner.lock().pools.get(name).cloned()
    }

    pub fn pools(&self) -> Vec<PoolDef> {
        self.inner.lock().pools.values().cloned().collect()
    }

    pub fn register_worker(&self, record: WorkerRecord) {
        let mut inner = self.inner.lock();
        inner
            .pool_liveness
            .insert(record.pool.clone(), record.registered_at_ms);
        inner.workers.insert(record.id.to_string(), record);
    }

    pub fn deregister_worker(&self, id: &WorkerId) {
        self.inner.lock().workers.remove(id.as_str());
    }

    pub fn heartbeat(&self, id: &WorkerId, now_ms: u64) {
        let mut inner = self.inner.lock();
        if let Some(worker) = inner.workers.get_mut(id.as_str()) {
            worker.last_heartbeat_ms = now_ms;
            let pool = worker.pool.clone();
            inner.pool_liveness.insert(pool, now_ms);
        }
    }

    pub fn set_current_job(&self, id: &WorkerId, job: Option<JobId>) {
        if let Some(worker) = self.inner.lock().workers.get_mut(id.as_str()) {
            worker.current_job_id = job;
        }
    }

    pub fn worker(&self, id: &WorkerId) -> Option<WorkerRecord> {
        self.inner.lock().workers.get(id.as_str()).cloned()
    }

    pub fn workers(&self) -> Vec<WorkerRecord> {
        self.inner.lock().workers.values().cloned().collect()
    }

    /// Whether this worker exists and has heartbeat within the TTL.
    pub fn is_live(&self, id: &WorkerId, now_ms: u64, ttl_ms: u64) -> bool {
        self.inner
            .lock()
            .workers
            .get(id.as_str())
            .is_some_and(|w| !w.is_expired(now_ms, ttl_ms))
    }

    /// Live worker count for a pool.
    pub fn live_workers(&self, pool: &str, now_ms: u64, ttl_ms: u64) -> usize {
        self.inner
            .lock()
            .workers
            .values()
            .filter(|w| w.pool == pool && !w.is_expired(now_ms, ttl_ms))
            .count()
    }

    /// Most recent registration or heartbeat for a pool, if any ever.
    pub fn last_liveness(&self, pool: &str) -> Option<u64> {
        self.inner.lock().pool_liveness.get(pool).copied()
    }

    /// Drop workers whose heartbeat has expired; returns the pruned set.
    pub fn prune_expired(&self, now_ms: u64, ttl_ms: u64) -> Vec<WorkerRecord> {
        let mut inner = self.inner.lock();
        let expired: Vec<String> = inner
            .workers
            .values()
            .filter(|w| w.is_expired(now_ms, ttl_ms))
            .map(|w| w.id.to_string())
            .collect();
        expired
            .iter()
            .filter_map(|id| inner.workers.remove(id))
            .collect()
    }
}

#[cfg(test)]
#[path = "directory_tests.rs"]
mod tests;
