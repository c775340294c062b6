// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic feature-hash encoder.
//!
//! Not a learned model: tokens are hashed into buckets and the result
//! L2-normalized. Identical text always produces bitwise-identical
//! vectors, which makes it the reference encoder for tests and for
//! keyword-degraded deployments without GPU workers.

use super::EmbeddingEncoder;
use crate::error::EngineError;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

pub struct HashEncoder {
    dimensions: usize,
}

impl HashEncoder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(8),
        }
    }

    fn encode_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let bucket = u64::from_le_bytes(
                digest[..8].try_into().unwrap_or_default(),
            ) as usize
                % self.dimensions;
            // Second hash byte picks the sign so buckets cancel rather
            // than saturate
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl Default for HashEncoder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl EmbeddingEncoder for HashEncoder {
    fn model_id(&self) -> &str {
        "feature-hash-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
        Ok(texts.iter().map(|t| self.encode_one(t)).collect())
    }
}

#[cfg(test)]
#[path = "hash_tests.rs"]
mod tests;
