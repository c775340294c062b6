// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed job payloads and stage results.
//!
//! Jobs carry opaque JSON on the wire; stage handlers decode into these
//! shapes. A decode failure is a terminal payload error, never retried.

use crate::document::DocumentMeta;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Payload decode failure. Terminal: dead-letter, no retry.
#[derive(Debug, Error)]
#[error("malformed payload: {0}")]
pub struct PayloadError(#[from] serde_json::Error);

/// Decode a job payload into its typed shape.
pub fn decode<T: DeserializeOwned>(value: &serde_json::Value) -> Result<T, PayloadError> {
    Ok(serde_json::from_value(value.clone())?)
}

/// Encode a stage result back into the job's opaque result slot.
pub fn encode<T: Serialize>(value: &T) -> Result<serde_json::Value, PayloadError> {
    Ok(serde_json::to_value(value)?)
}

// -- extract --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractPayload {
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractResult {
    pub text: String,
    pub pages: u32,
    pub metadata: DocumentMeta,
    /// True when no embedded text was found and OCR was requested instead
    #[serde(default)]
    pub ocr_required: bool,
}

// -- ocr --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default = "default_true")]
    pub use_angle_cls: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
}

fn default_lang() -> String {
    "en".into()
}

fn default_true() -> bool {
    true
}

/// One detected text line with its bounding box and confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrLine {
    /// Four `[x, y]` corners, clockwise from top-left
    #[serde(rename = "box")]
    pub bbox: Vec<[f32; 2]>,
    pub text: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResult {
    pub text: String,
    #[serde(default)]
    pub lines: Vec<OcrLine>,
    /// Aggregate confidence over all lines
    pub confidence: f32,
    /// True when the heavy engine produced this result
    #[serde(default)]
    pub escalated: bool,
}

// -- ner --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NerPayload {
    pub text: String,
    pub doc_id: String,
    pub chunk_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NerEntity {
    pub text: String,
    pub label: String,
    pub start: usize,
    pub end: usize,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NerResult {
    pub entities: Vec<NerEntity>,
}

// -- embed --

/// Single or batch embedding request.
///
/// Batch requests set `"batch": true` and carry parallel `texts` /
/// `chunk_ids` arrays.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbedPayload {
    Batch {
        texts: Vec<String>,
        batch: bool,
        chunk_ids: Vec<String>,
        doc_id: String,
    },
    Single {
        text: String,
        doc_id: String,
        chunk_id: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbedResult {
    Batch {
        embeddings: Vec<Vec<f32>>,
        count: usize,
        vector_ids: Vec<String>,
        model: String,
    },
    Single {
        embedding: Vec<f32>,
        dimensions: usize,
        model: String,
        vector_id: String,
    },
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
