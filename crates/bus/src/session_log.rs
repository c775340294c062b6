// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session-scoped event log.
//!
//! A JSONL trail of everything published on the bus, truncated on core
//! startup. It is a debugging and coordination artifact, not a
//! system-of-record; durable state lives in the content store.

use cf_core::BusEvent;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionLogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct SessionLog {
    file: File,
    path: PathBuf,
}

impl SessionLog {
    /// Open the log, truncating any previous session's contents.
    pub fn open(path: &Path) -> Result<Self, SessionLogError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self {
            file,
            path: path.to_owned(),
        })
    }

    pub fn append(&mut self, event: &BusEvent) -> Result<(), SessionLogError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the most recent `limit` events (the whole session for
    /// `usize::MAX`). Unparseable lines are skipped.
    pub fn tail(&self, limit: usize) -> Result<Vec<BusEvent>, SessionLogError> {
        let file = OpenOptions::new().read(true).open(&self.path)?;
        let reader = BufReader::new(file);
        let mut events: Vec<BusEvent> = reader
            .lines()
            .map_while(Result::ok)
            .filter_map(|line| serde_json::from_str(&line).ok())
            .collect();
        if events.len() > limit {
            events.drain(..events.len() - limit);
        }
        Ok(events)
    }
}

#[cfg(test)]
#[path = "session_log_tests.rs"]
mod tests;
