// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cf-pipeline: the document processing stages.
//!
//! Each stage is a pure handler behind [`StageHandler`]; stages never call
//! each other directly. Completion events couple them through the
//! dispatcher, which makes the DAG extension-configurable.

mod chunker;
mod embed;
mod extract;
mod ner;
mod normalize;
mod ocr;
mod pdf;
mod plan;
mod stage;

pub use chunker::{chunk_text, ChunkConfig, ChunkMethod, ChunkPayload, ChunkSpan, ChunkStage, ChunkStageResult};
pub use embed::{vector_id, EmbedStage};
pub use extract::ExtractStage;
pub use ner::{derive_confidence, NerStage};
pub use normalize::{normalize_text, NormalizePayload, NormalizeResult, NormalizeStage};
pub use ocr::{OcrConfig, OcrStage};
pub use pdf::PdfScan;
pub use plan::{PipelinePlan, StageBinding};
pub use stage::{resolve_path, StageContext, StageError, StageHandler};
