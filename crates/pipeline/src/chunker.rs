// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chunk stage: split normalized text into ordered chunks with dense
//! indices.

use crate::stage::{StageContext, StageError, StageHandler};
use cf_core::{payload, Chunk, ChunkId, DocumentId};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkMethod {
    /// Fixed-size windows with overlap
    #[default]
    Fixed,
    /// Break at sentence boundaries (`.` `!` `?`)
    Sentence,
    /// Paragraph signal, falling back to sentence
    Semantic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    #[serde(default)]
    pub method: ChunkMethod,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_overlap() -> usize {
    100
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            method: ChunkMethod::Fixed,
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

/// One produced chunk before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkSpan {
    pub text: String,
    /// Char offset into the source text
    pub start: usize,
    pub page_number: u32,
}

/// Split `text` according to `config`.
///
/// When `overlap >= chunk_size` the window step is clamped to 1: a known
/// degenerate mode that must terminate (one chunk per char position)
/// rather than hang.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<ChunkSpan> {
    if text.is_empty() {
        return Vec::new();
    }
    match config.method {
        ChunkMethod::Fixed => fixed_chunks(text, config.chunk_size.max(1), config.overlap),
        ChunkMethod::Sentence => group_units(text, sentence_units(text), config.chunk_size),
        ChunkMethod::Semantic => {
            let paragraphs = paragraph_units(text);
            if paragraphs.len() > 1 {
                group_units(text, paragraphs, config.chunk_size)
            } else {
                group_units(text, sentence_units(text), config.chunk_size)
            }
        }
    }
}

fn page_at(chars: &[char], offset: usize) -> u32 {
    chars[..offset].iter().filter(|c| **c == '\u{c}').count() as u32 + 1
}

fn fixed_chunks(text: &str, chunk_size: usize, overlap: usize) -> Vec<ChunkSpan> {
    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(ChunkSpan {
            text: chars[start..end].iter().collect(),
            start,
            page_number: page_at(&chars, start),
        });
        start += step;
    }
    chunks
}

/// `(start_char, text)` spans for sentences, breaking at `.!?`.
fn sentence_units(text: &str) -> Vec<(usize, String)> {
    let chars: Vec<char> = text.chars().collect();
    let mut units = Vec::new();
    let mut start = 0;
    for (i, c) in chars.iter().enumerate() {
        if matches!(c, '.' | '!' | '?') {
            let unit: String = chars[start..=i].iter().collect();
            if !unit.trim().is_empty() {
                units.push((start, unit));
            }
            start = i + 1;
        }
    }
    if start < chars.len() {
        let unit: String = chars[start..].iter().collect();
        if !unit.trim().is_empty() {
            units.push((start, unit));
        }
    }
    units
}

fn paragraph_units(text: &str) -> Vec<(usize, String)> {
    let chars: Vec<char> = text.chars().collect();
    let mut units = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\n' && chars.get(i + 1) == Some(&'\n') {
            let unit: String = chars[start..i].iter().collect();
            if !unit.trim().is_empty() {
                units.push((start, unit));
            }
            while chars.get(i) == Some(&'\n') {
                i += 1;
            }
            start = i;
        } else {
            i += 1;
        }
    }
    if start < chars.len() {
        let unit: String = chars[start..].iter().collect();
        if !unit.trim().is_empty() {
            units.push((start, unit));
        }
    }
    units
}

/// Pack consecutive units into chunks of at most `chunk_size` chars
/// (units longer than the budget become their own chunk).
fn group_units(text: &str, units: Vec<(usize, String)>, chunk_size: usize) -> Vec<ChunkSpan> {
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut current: Option<(usize, String)> = None;

    for (start, unit) in units {
        match current.take() {
            None => current = Some((start, unit)),
            Some((cur_start, mut cur_text)) => {
                if cur_text.chars().count() + unit.chars().count() <= chunk_size {
                    cur_text.push_str(&unit);
                    current = Some((cur_start, cur_text));
                } else {
                    chunks.push(ChunkSpan {
                        text: cur_text.trim().to_string(),
                        start: cur_start,
                        page_number: page_at(&chars, cur_start),
                    });
                    current = Some((start, unit));
                }
            }
        }
    }
    if let Some((start, text_piece)) = current {
        if !text_piece.trim().is_empty() {
            chunks.push(ChunkSpan {
                text: text_piece.trim().to_string(),
                start,
                page_number: page_at(&chars, start),
            });
        }
    }
    chunks
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub doc_id: String,
    pub text: String,
    #[serde(flatten)]
    pub config: ChunkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkStageResult {
    pub count: usize,
    pub chunk_ids: Vec<String>,
}

pub struct ChunkStage;

#[async_trait::async_trait]
impl StageHandler for ChunkStage {
    fn stage(&self) -> &'static str {
        "chunk"
    }

    async fn handle(
        &self,
        raw: &serde_json::Value,
        ctx: &StageContext,
        _cancel: &CancellationToken,
    ) -> Result<serde_json::Value, StageError> {
        let request: ChunkPayload = payload::decode(raw)?;
        let doc_id = DocumentId::new(request.doc_id.clone());

        let spans = chunk_text(&request.text, &request.config);
        let chunks: Vec<Chunk> = spans
            .into_iter()
            .enumerate()
            .map(|(index, span)| Chunk {
                id: ChunkId::new(format!("{}:{}", request.doc_id, index)),
                document_id: doc_id.clone(),
                text: span.text,
                chunk_index: index as u32,
                page_number: span.page_number,
                vector_id: None,
            })
            .collect();

        let chunk_ids = chunks.iter().map(|c| c.id.to_string()).collect();
        let count = chunks.len();
        ctx.core.replace_chunks(&doc_id, chunks)?;

        Ok(payload::encode(&ChunkStageResult { count, chunk_ids })?)
    }
}

#[cfg(test)]
#[path = "chunker_tests.rs"]
mod tests;
