// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment configuration for the daemon.

use cf_core::DEFAULT_MAX_WORKER_REQUEUES;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("unsupported {var} scheme in '{value}' (only file: is supported)")]
    UnsupportedScheme { var: &'static str, value: String },
    #[error("invalid {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Resolved environment for one daemon process.
#[derive(Debug, Clone)]
pub struct DaemonEnv {
    /// Root for payload file resolution and all persistent state
    pub data_root: PathBuf,
    /// Broker journal location
    pub broker_path: PathBuf,
    /// Content store root
    pub store_path: PathBuf,
    pub log_level: String,
    pub max_worker_requeues: u32,
    pub socket_path: PathBuf,
}

impl DaemonEnv {
    /// Read `DATA_ROOT`, `BROKER_URL`, `STORE_URL`, `LOG_LEVEL`, and
    /// `MAX_WORKER_REQUEUES`. The single-broker build accepts only
    /// `file:` URLs (or bare paths) for broker and store.
    pub fn from_env() -> Result<Self, EnvError> {
        let data_root = PathBuf::from(std::env::var("DATA_ROOT").unwrap_or_else(|_| ".".into()));

        let broker_path = match std::env::var("BROKER_URL") {
            Ok(url) => parse_file_url("BROKER_URL", &url)?,
            Err(_) => data_root.join("broker/journal.jsonl"),
        };
        let store_path = match std::env::var("STORE_URL") {
            Ok(url) => parse_file_url("STORE_URL", &url)?,
            Err(_) => data_root.join("store"),
        };

        let max_worker_requeues = match std::env::var("MAX_WORKER_REQUEUES") {
            Ok(value) => value.parse().map_err(|_| EnvError::Invalid {
                var: "MAX_WORKER_REQUEUES",
                value,
            })?,
            Err(_) => DEFAULT_MAX_WORKER_REQUEUES,
        };

        Ok(Self {
            socket_path: data_root.join("casefiled.sock"),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            max_worker_requeues,
            data_root,
            broker_path,
            store_path,
        })
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_root.join("logs")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_root.join("broker/ledger.jsonl")
    }

    pub fn session_log_path(&self) -> PathBuf {
        self.data_root.join("events/session.jsonl")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_root.join("casefiled.lock")
    }
}

fn parse_file_url(var: &'static str, value: &str) -> Result<PathBuf, EnvError> {
    if let Some(path) = value.strip_prefix("file://") {
        return Ok(PathBuf::from(path));
    }
    if let Some(path) = value.strip_prefix("file:") {
        return Ok(PathBuf::from(path));
    }
    if value.contains("://") {
        return Err(EnvError::UnsupportedScheme {
            var,
            value: value.to_string(),
        });
    }
    Ok(PathBuf::from(value))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
