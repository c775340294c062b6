// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error taxonomy.

use cf_core::ErrorClass;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine endpoint unreachable or timed out. Retryable.
    #[error("engine unavailable: {0}")]
    Unavailable(String),
    /// Engine failed to initialize (missing weights, bad config).
    /// Reported on the first job that needed the engine.
    #[error("engine initialization failed: {0}")]
    InitFailed(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// Engine responded but the payload made no sense
    #[error("malformed engine response: {0}")]
    Malformed(String),
}

impl EngineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::Unavailable(_) | EngineError::Http(_) => ErrorClass::Transient,
            EngineError::InitFailed(_) => ErrorClass::Resource,
            EngineError::Malformed(_) => ErrorClass::Stage,
        }
    }
}
