// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Embedding encoders.
//!
//! Encoders register at startup behind this trait; the embed stage infers
//! collection dimensions from `dimensions()` and keys vectors by model id.

mod hash;
mod http;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use hash::HashEncoder;
pub use http::HttpEmbeddingEncoder;

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeEncoder;

use crate::error::EngineError;
use async_trait::async_trait;

#[async_trait]
pub trait EmbeddingEncoder: Send + Sync {
    /// Stable model identifier recorded on vectors and results.
    fn model_id(&self) -> &str;

    fn dimensions(&self) -> usize;

    /// Encode a batch of texts into dense vectors, one per input, in
    /// input order. Must be deterministic for identical inputs.
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError>;
}
