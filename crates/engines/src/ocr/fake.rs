// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted OCR engine for tests.

use super::{OcrEngine, OcrOutput, OcrRequest};
use crate::error::EngineError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Returns scripted outputs in order, repeating the last one. Tracks how
/// many times it was called so tests can assert fallback behavior.
pub struct FakeOcrEngine {
    name: String,
    outputs: Mutex<Vec<Result<OcrOutput, String>>>,
    calls: Arc<AtomicUsize>,
}

impl FakeOcrEngine {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outputs: Mutex::new(Vec::new()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Engine that always recognizes `text` with the given confidence.
    pub fn with_text(name: impl Into<String>, text: &str, confidence: f32) -> Self {
        let engine = Self::new(name);
        engine.push_output(OcrOutput {
            text: text.to_string(),
            lines: Vec::new(),
            confidence,
        });
        engine
    }

    /// Engine that always fails.
    pub fn failing(name: impl Into<String>, error: &str) -> Self {
        let engine = Self::new(name);
        engine.outputs.lock().push(Err(error.to_string()));
        engine
    }

    pub fn push_output(&self, output: OcrOutput) {
        self.outputs.lock().push(Ok(output));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrEngine for FakeOcrEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn recognize(&self, _request: &OcrRequest) -> Result<OcrOutput, EngineError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let outputs = self.outputs.lock();
        if outputs.is_empty() {
            return Ok(OcrOutput::default());
        }
        let index = call.min(outputs.len() - 1);
        match &outputs[index] {
            Ok(output) => Ok(output.clone()),
            Err(message) => Err(EngineError::Unavailable(message.clone())),
        }
    }
}
