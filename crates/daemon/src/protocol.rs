// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol for CLI ↔ daemon communication.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload.

use cf_core::{BusEvent, ErrorClass, Job};
use cf_host::Method;
use serde::{Deserialize, Serialize};

/// Request from CLI to daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Submit a job to a pool
    Enqueue {
        pool: String,
        payload: serde_json::Value,
        #[serde(default)]
        priority: i32,
    },

    /// Fetch a job record
    JobStatus { id: String },

    /// Registered pools and worker counts
    Pools,

    /// Ingest a file into the document pipeline
    Ingest { path: String },

    /// Operator re-attempt: reset a job's requeue budget and re-pend it
    Requeue { id: String },

    /// Tail of the session event log
    Events {
        #[serde(default = "default_event_limit")]
        limit: usize,
    },

    /// Start an in-process worker for a pool
    WorkerStart { pool: String },

    /// Route an API request (core or extension surface)
    Api {
        method: Method,
        path: String,
        #[serde(default)]
        body: serde_json::Value,
    },

    /// Request daemon shutdown
    Shutdown,
}

fn default_event_limit() -> usize {
    100
}

/// One pool's status for `Pools`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoolStatus {
    pub name: String,
    pub resource_tier: String,
    pub max_concurrency: u32,
    pub live_workers: usize,
    pub pending: usize,
}

/// Response from daemon to CLI
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    Pong { version: String },
    Job { job: Box<Job> },
    JobNotFound { id: String },
    Pools { pools: Vec<PoolStatus> },
    Ingested {
        document_id: String,
        /// Extract job id for new documents; None on duplicate ingest
        #[serde(default, skip_serializing_if = "Option::is_none")]
        job_id: Option<String>,
        existing: bool,
    },
    Events { events: Vec<BusEvent> },
    Api {
        status: u16,
        body: serde_json::Value,
    },
    WorkerStarted { worker_id: String, pool: String },
    ShuttingDown,
    Error {
        class: ErrorClass,
        message: String,
    },
}

impl Response {
    pub fn error(class: ErrorClass, message: impl Into<String>) -> Self {
        Response::Error {
            class,
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
