// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP-backed embedding encoder for out-of-process models.

use super::EmbeddingEncoder;
use crate::error::EngineError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Deserialize)]
struct EncodeResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Client for an embedding service exposing `/encode`: accepts
/// `{"texts": [...]}` and returns `{"embeddings": [[...]]}`.
pub struct HttpEmbeddingEncoder {
    model_id: String,
    dimensions: usize,
    endpoint: String,
    client: reqwest::Client,
}

impl HttpEmbeddingEncoder {
    pub fn new(
        model_id: impl Into<String>,
        dimensions: usize,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::InitFailed(e.to_string()))?;
        Ok(Self {
            model_id: model_id.into(),
            dimensions,
            endpoint: endpoint.into(),
            client,
        })
    }
}

#[async_trait]
impl EmbeddingEncoder for HttpEmbeddingEncoder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
        let url = format!("{}/encode", self.endpoint.trim_end_matches('/'));
        debug!(model = %self.model_id, batch = texts.len(), "encode request");

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "texts": texts }))
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    EngineError::Unavailable(e.to_string())
                } else {
                    EngineError::Http(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(EngineError::Unavailable(format!(
                "encoder {} returned {}",
                self.model_id,
                response.status()
            )));
        }

        let body: EncodeResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Malformed(e.to_string()))?;

        if body.embeddings.len() != texts.len() {
            return Err(EngineError::Malformed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                body.embeddings.len()
            )));
        }
        Ok(body.embeddings)
    }
}
