// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! NER stage: extract mentions, standardize labels, persist canonicals.
//!
//! Accepts either the per-chunk wire payload (`{text, doc_id, chunk_id}`)
//! or a whole-document request (`{doc_id}`) that walks the stored chunks.

use crate::stage::{StageContext, StageError, StageHandler};
use cf_core::payload::{NerEntity, NerResult};
use cf_core::{payload, ChunkId, DocumentId, EntityLabel, EntityMention};
use cf_engines::{NerModel, RawMention};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NerStagePayload {
    PerChunk {
        text: String,
        doc_id: String,
        chunk_id: String,
    },
    Document {
        doc_id: String,
    },
}

/// Ranking-signal confidence for models that expose no score.
///
/// Derived from capitalization and multi-word shape; treat as a ranking
/// signal, not a calibrated probability.
pub fn derive_confidence(text: &str) -> f32 {
    let words = text.split_whitespace().count();
    let mut confidence: f32 = 0.55;
    if words > 1 {
        confidence += 0.2;
    }
    if text
        .split_whitespace()
        .all(|w| w.chars().next().is_some_and(|c| c.is_uppercase()))
    {
        confidence += 0.1;
    }
    confidence.min(0.95)
}

pub struct NerStage {
    model: Arc<dyn NerModel>,
}

impl NerStage {
    pub fn new(model: Arc<dyn NerModel>) -> Self {
        Self { model }
    }

    fn to_mention(doc_id: &DocumentId, chunk_id: &ChunkId, raw: RawMention) -> EntityMention {
        let confidence = raw.confidence.unwrap_or_else(|| derive_confidence(&raw.text));
        EntityMention {
            document_id: doc_id.clone(),
            chunk_id: chunk_id.clone(),
            label: EntityLabel::standardize(&raw.label),
            text: raw.text,
            start_char: raw.start_char,
            end_char: raw.end_char,
            confidence,
        }
    }

    async fn extract_chunk(
        &self,
        text: &str,
        doc_id: &DocumentId,
        chunk_id: &ChunkId,
        cancel: &CancellationToken,
    ) -> Result<Vec<EntityMention>, StageError> {
        let raw = tokio::select! {
            result = self.model.extract(text) => {
                result.map_err(|e| StageError::Transient(e.to_string()))?
            }
            _ = cancel.cancelled() => return Err(StageError::Cancelled),
        };
        Ok(raw
            .into_iter()
            .map(|m| Self::to_mention(doc_id, chunk_id, m))
            .collect())
    }
}

#[async_trait::async_trait]
impl StageHandler for NerStage {
    fn stage(&self) -> &'static str {
        "ner"
    }

    async fn handle(
        &self,
        raw: &serde_json::Value,
        ctx: &StageContext,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, StageError> {
        let request: NerStagePayload = payload::decode(raw)?;

        let mentions = match &request {
            NerStagePayload::PerChunk {
                text,
                doc_id,
                chunk_id,
            } => {
                let doc_id = DocumentId::new(doc_id.clone());
                let chunk_id = ChunkId::new(chunk_id.clone());
                let mentions = self.extract_chunk(text, &doc_id, &chunk_id, cancel).await?;
                ctx.core.add_mentions(&doc_id, mentions.clone())?;
                mentions
            }
            NerStagePayload::Document { doc_id } => {
                let doc_id = DocumentId::new(doc_id.clone());
                let mut all = Vec::new();
                for chunk in ctx.core.chunks(&doc_id) {
                    let mentions = self
                        .extract_chunk(&chunk.text, &doc_id, &chunk.id, cancel)
                        .await?;
                    all.extend(mentions);
                }
                ctx.core.add_mentions(&doc_id, all.clone())?;
                all
            }
        };

        let entities = mentions
            .into_iter()
            .map(|m| NerEntity {
                text: m.text,
                label: m.label.to_string(),
                start: m.start_char,
                end: m.end_char,
                confidence: m.confidence,
            })
            .collect();

        Ok(payload::encode(&NerResult { entities })?)
    }
}

#[cfg(test)]
#[path = "ner_tests.rs"]
mod tests;
