// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage handler contract.

use cf_bus::EventBus;
use cf_core::{ErrorClass, PayloadError};
use cf_store::{CoreSchema, StoreError, VectorStore};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors a stage handler can produce. The class drives retry policy.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Payload(#[from] PayloadError),
    /// Missing input file. Terminal, never retried.
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("transient: {0}")]
    Transient(String),
    /// Required capability absent (engine not registered, pool empty)
    #[error("resource unavailable: {0}")]
    Resource(String),
    /// Stage-level final failure (e.g. every OCR engine exhausted)
    #[error("stage failed: {0}")]
    Failed(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("cancelled")]
    Cancelled,
}

impl StageError {
    pub fn class(&self) -> ErrorClass {
        match self {
            StageError::Payload(_) | StageError::FileNotFound(_) => ErrorClass::Payload,
            StageError::Transient(_) | StageError::Cancelled => ErrorClass::Transient,
            StageError::Resource(_) => ErrorClass::Resource,
            StageError::Failed(_) => ErrorClass::Stage,
            StageError::Store(StoreError::ChunkIndexGap { .. }) => ErrorClass::Payload,
            StageError::Store(_) => ErrorClass::Transient,
        }
    }
}

/// Shared services handed to every stage handler.
#[derive(Clone)]
pub struct StageContext {
    pub core: CoreSchema,
    pub vectors: VectorStore,
    pub bus: EventBus,
    pub data_root: PathBuf,
}

/// A named pipeline step, implemented by a pool's handler.
///
/// Handlers are `(payload) -> result` with no direct calls between
/// stages. All suspension points must honor `cancel`; a handler that
/// ignores it past the grace window costs its worker.
#[async_trait::async_trait]
pub trait StageHandler: Send + Sync {
    fn stage(&self) -> &'static str;

    async fn handle(
        &self,
        payload: &serde_json::Value,
        ctx: &StageContext,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, StageError>;
}

/// Resolve a payload path against the data root; absolute paths pass
/// through. Missing files are a terminal error.
pub fn resolve_path(data_root: &Path, path: &str) -> Result<PathBuf, StageError> {
    let candidate = if Path::new(path).is_absolute() {
        PathBuf::from(path)
    } else {
        data_root.join(path)
    };
    if !candidate.exists() {
        return Err(StageError::FileNotFound(path.to_string()));
    }
    Ok(candidate)
}

#[cfg(test)]
#[path = "stage_tests.rs"]
mod tests;
