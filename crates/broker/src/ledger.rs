// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical job record store.
//!
//! Separate from the queue so records survive broker compaction. Every
//! job ever created has a record here until the retention window (default
//! 7 days past terminal state) expires.

use crate::journal::{Journal, JournalError};
use cf_core::{Job, JobId, JobStatus};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Default retention past terminal state: 7 days.
pub const DEFAULT_RETENTION_MS: u64 = 7 * 24 * 3600 * 1000;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("journal error: {0}")]
    Journal(#[from] JournalError),
}

struct LedgerInner {
    records: HashMap<String, Job>,
}

/// Journal-backed job record store. Appends are full-record upserts;
/// replay is last-write-wins.
pub struct JobLedger {
    inner: Mutex<LedgerInner>,
    journal: Mutex<Journal<Job>>,
    retention_ms: u64,
}

impl JobLedger {
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        Self::open_with_retention(path, DEFAULT_RETENTION_MS)
    }

    pub fn open_with_retention(path: &Path, retention_ms: u64) -> Result<Self, LedgerError> {
        let (journal, entries) = Journal::<Job>::open(path)?;
        let mut records = HashMap::new();
        for entry in entries {
            records.insert(entry.record.id.to_string(), entry.record);
        }
        Ok(Self {
            inner: Mutex::new(LedgerInner { records }),
            journal: Mutex::new(journal),
            retention_ms,
        })
    }

    /// Upsert the current state of a job.
    pub fn record(&self, job: &Job) -> Result<(), LedgerError> {
        self.inner
            .lock()
            .records
            .insert(job.id.to_string(), job.clone());
        let mut journal = self.journal.lock();
        journal.append(job)?;
        if journal.needs_flush() {
            journal.flush()?;
        }
        Ok(())
    }

    /// Force any buffered journal entries to disk.
    pub fn flush(&self) -> Result<(), LedgerError> {
        self.journal.lock().flush()?;
        Ok(())
    }

    pub fn get(&self, job_id: &JobId) -> Option<Job> {
        self.inner.lock().records.get(job_id.as_str()).cloned()
    }

    /// List records, newest first, optionally filtered by pool and status.
    pub fn list(
        &self,
        pool: Option<&str>,
        status: Option<JobStatus>,
        limit: usize,
        offset: usize,
    ) -> Vec<Job> {
        let inner = self.inner.lock();
        let mut records: Vec<&Job> = inner
            .records
            .values()
            .filter(|j| pool.is_none_or(|p| j.pool == p))
            .filter(|j| status.is_none_or(|s| j.status == s))
            .collect();
        records.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        records
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Drop records whose terminal state is older than the retention
    /// window, compacting the journal. Returns the number purged.
    pub fn purge_expired(&self, now_ms: u64) -> Result<usize, LedgerError> {
        let mut inner = self.inner.lock();
        let before = inner.records.len();
        inner.records.retain(|_, job| {
            match (job.is_terminal(), job.finalized_at_ms) {
                (true, Some(finalized)) => now_ms.saturating_sub(finalized) <= self.retention_ms,
                _ => true,
            }
        });
        let purged = before - inner.records.len();
        if purged > 0 {
            let live: Vec<Job> = inner.records.values().cloned().collect();
            self.journal.lock().rewrite(&live)?;
            debug!(purged, "ledger purged expired records");
        }
        Ok(purged)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().records.is_empty()
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
