// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unified append-only logger for per-entity activity logs.
//!
//! Human-readable trails per worker and per document, next to (not
//! replacing) structured tracing output.

use cf_core::{format_utc_ms, Clock, SystemClock};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::path::PathBuf;

/// Marker trait for activity log kinds.
pub trait LogKind {
    /// Subdirectory within the logs dir (e.g. "worker", "document").
    const SUBDIR: &'static str;
}

pub struct WorkerLog;
impl LogKind for WorkerLog {
    const SUBDIR: &'static str = "worker";
}

pub struct DocumentLog;
impl LogKind for DocumentLog {
    const SUBDIR: &'static str = "document";
}

/// Writes timestamped lines to `<log_dir>/<subdir>/<entity_id>.log`.
///
/// Each `append()` opens, writes, and closes the file; fine for the low
/// write frequency of activity events.
pub struct ActivityLogger<K: LogKind> {
    log_dir: PathBuf,
    _kind: PhantomData<K>,
}

impl<K: LogKind> ActivityLogger<K> {
    pub fn new(log_dir: PathBuf) -> Self {
        Self {
            log_dir,
            _kind: PhantomData,
        }
    }

    pub fn append(&self, entity_id: &str, message: &str) {
        let path = self
            .log_dir
            .join(K::SUBDIR)
            .join(format!("{entity_id}.log"));
        let result = (|| -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            let ts = format_utc_ms(SystemClock.epoch_ms());
            writeln!(file, "{ts} {message}")?;
            Ok(())
        })();
        if let Err(e) = result {
            tracing::warn!(entity = entity_id, error = %e, "activity log write failed");
        }
    }
}

#[cfg(test)]
#[path = "activity_tests.rs"]
mod tests;
