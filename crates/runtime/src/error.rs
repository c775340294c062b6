// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the runtime.

use cf_broker::{BrokerError, LedgerError};
use cf_pipeline::StageError;
use cf_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("stage error: {0}")]
    Stage(#[from] StageError),
    #[error("no handler registered for pool: {0}")]
    HandlerNotFound(String),
    #[error("dispatch refused: {0}")]
    Dispatch(String),
    #[error("job not found: {0}")]
    JobNotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
