// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP-backed OCR engine for out-of-process recognizers.

use super::{OcrEngine, OcrOutput, OcrRequest};
use crate::error::EngineError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Client for an OCR service exposing a single `/ocr` endpoint that
/// accepts the request JSON and returns [`OcrOutput`].
pub struct HttpOcrEngine {
    name: String,
    endpoint: String,
    client: reqwest::Client,
}

impl HttpOcrEngine {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::InitFailed(e.to_string()))?;
        Ok(Self {
            name: name.into(),
            endpoint: endpoint.into(),
            client,
        })
    }
}

#[async_trait]
impl OcrEngine for HttpOcrEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn recognize(&self, request: &OcrRequest) -> Result<OcrOutput, EngineError> {
        let url = format!("{}/ocr", self.endpoint.trim_end_matches('/'));
        debug!(engine = %self.name, url = %url, "ocr request");

        let response = self
            .client
            .post(&url)
            .json(request)
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
                "engine {} returned {}",
                self.name,
                response.status()
            )));
        }

        let output: OcrOutput = response
            .json()
            .await
            .map_err(|e| EngineError::Malformed(e.to_string()))?;
        Ok(output)
    }
}
