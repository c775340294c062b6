// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OCR engines: a fast bounding-box engine and a heavy vision-LM engine
//! share this interface; the fallback policy lives in the OCR stage.

mod http;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use http::HttpOcrEngine;

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeOcrEngine;

use crate::error::EngineError;
use async_trait::async_trait;
use cf_core::OcrLine;
use serde::{Deserialize, Serialize};

/// A page to recognize: a path or inline base64 image data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    pub lang: String,
    pub use_angle_cls: bool,
}

/// Raw engine output, before the stage applies its fallback policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrOutput {
    pub text: String,
    #[serde(default)]
    pub lines: Vec<OcrLine>,
    /// Aggregate confidence over all detected lines; 0 for empty input
    pub confidence: f32,
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Recognize one page. An empty image yields an empty-text output,
    /// not an error.
    async fn recognize(&self, request: &OcrRequest) -> Result<OcrOutput, EngineError>;
}
