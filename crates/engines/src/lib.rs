// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cf-engines: OCR, embedding, and NER engines behind uniform traits.
//!
//! Model weights are black boxes: stages talk to these traits, engines
//! register at startup, and workers wrap expensive ones in [`LazyEngine`]
//! so initialization happens on the first job, not at registration.

mod error;
mod lazy;

pub mod embed;
pub mod ner;
pub mod ocr;

pub use embed::{EmbeddingEncoder, HashEncoder, HttpEmbeddingEncoder};
pub use error::EngineError;
pub use lazy::LazyEngine;
pub use ner::{HeuristicNer, NerModel, RawMention};
pub use ocr::{HttpOcrEngine, OcrEngine, OcrOutput, OcrRequest};

#[cfg(any(test, feature = "test-support"))]
pub use embed::FakeEncoder;
#[cfg(any(test, feature = "test-support"))]
pub use ner::FakeNer;
#[cfg(any(test, feature = "test-support"))]
pub use ocr::FakeOcrEngine;
