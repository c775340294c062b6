// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted encoder for tests.

use super::EmbeddingEncoder;
use crate::error::EngineError;
use async_trait::async_trait;
use parking_lot::Mutex;

/// Deterministic tiny encoder; can be told to fail.
pub struct FakeEncoder {
    model_id: String,
    dimensions: usize,
    fail_with: Mutex<Option<String>>,
}

impl FakeEncoder {
    pub fn new(model_id: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model_id: model_id.into(),
            dimensions,
            fail_with: Mutex::new(None),
        }
    }

    pub fn fail_with(&self, message: &str) {
        *self.fail_with.lock() = Some(message.to_string());
    }
}

#[async_trait]
impl EmbeddingEncoder for FakeEncoder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
        if let Some(message) = self.fail_with.lock().clone() {
            return Err(EngineError::Unavailable(message));
        }
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0f32; self.dimensions];
                for (i, b) in t.bytes().enumerate() {
                    v[i % self.dimensions] += b as f32;
                }
                v
            })
            .collect())
    }
}
