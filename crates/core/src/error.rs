// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failure classification shared across the runtime.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a job or stage failure.
///
/// The class determines retry policy: `Transient` failures are retried with
/// backoff, `Payload` failures dead-letter immediately, `Resource` failures
/// surface at enqueue time for the caller to degrade, `Stage` outcomes are
/// handled by the stage's own fallback path, and `Poison` marks a job that
/// has exhausted its worker-requeue budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    Transient,
    Payload,
    Resource,
    Stage,
    Poison,
}

impl ErrorClass {
    /// Whether the worker runtime may automatically requeue this failure.
    pub fn retryable(&self) -> bool {
        matches!(self, ErrorClass::Transient)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Transient => write!(f, "transient"),
            ErrorClass::Payload => write!(f, "payload"),
            ErrorClass::Resource => write!(f, "resource"),
            ErrorClass::Stage => write!(f, "stage"),
            ErrorClass::Poison => write!(f, "poison"),
        }
    }
}
