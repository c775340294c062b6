// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! NER models.
//!
//! Models return raw mentions with their native tag scheme; the NER stage
//! standardizes labels and derives confidence when the model gives none.

mod heuristic;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use heuristic::HeuristicNer;

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeNer;

use crate::error::EngineError;
use async_trait::async_trait;

/// A model extraction before label standardization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMention {
    pub text: String,
    /// Model-native tag (e.g. `PERSON`, `GPE`)
    pub label: String,
    pub start_char: usize,
    pub end_char: usize,
    /// None when the model exposes no score
    pub confidence: Option<f32>,
}

#[async_trait]
pub trait NerModel: Send + Sync {
    fn name(&self) -> &str;

    async fn extract(&self, text: &str) -> Result<Vec<RawMention>, EngineError>;
}
