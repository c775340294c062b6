// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Embed stage: dense vectors for chunk texts.
//!
//! Vector ids are deterministic (`sha256(doc ∥ chunk ∥ model)`), the
//! collection is auto-created from the encoder's dimensions, and chunk
//! rows are updated with their vector id.

use crate::stage::{StageContext, StageError, StageHandler};
use cf_core::{payload, ChunkId, DocumentId, EmbedPayload, EmbedResult};
use cf_engines::{EmbeddingEncoder, LazyEngine};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

/// Deterministic vector id: identical (doc, chunk, model) always maps to
/// the same point, so re-embedding is an upsert, not a duplicate.
pub fn vector_id(doc_id: &str, chunk_id: &str, model: &str) -> String {
    let digest = Sha256::digest(format!("{doc_id}\u{1f}{chunk_id}\u{1f}{model}").as_bytes());
    format!("vec-{digest:x}")[..24].to_string()
}

pub struct EmbedStage {
    encoder: LazyEngine<dyn EmbeddingEncoder>,
    collection: String,
}

impl EmbedStage {
    pub fn new(encoder: LazyEngine<dyn EmbeddingEncoder>, collection: impl Into<String>) -> Self {
        Self {
            encoder,
            collection: collection.into(),
        }
    }
}

#[async_trait::async_trait]
impl StageHandler for EmbedStage {
    fn stage(&self) -> &'static str {
        "embed"
    }

    async fn handle(
        &self,
        raw: &serde_json::Value,
        ctx: &StageContext,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, StageError> {
        let request: EmbedPayload = payload::decode(raw)?;

        let (texts, chunk_ids, doc_id, batch) = match request {
            EmbedPayload::Single {
                text,
                doc_id,
                chunk_id,
            } => (vec![text], vec![chunk_id], doc_id, false),
            EmbedPayload::Batch {
                texts,
                chunk_ids,
                doc_id,
                ..
            } => {
                if texts.len() != chunk_ids.len() {
                    return Err(StageError::Failed(format!(
                        "batch embed carries {} texts but {} chunk_ids",
                        texts.len(),
                        chunk_ids.len()
                    )));
                }
                (texts, chunk_ids, doc_id, true)
            }
        };

        // First job pays for initialization; registration stayed cheap
        let encoder = self
            .encoder
            .get()
            .map_err(|e| StageError::Resource(e.to_string()))?;

        let embeddings = tokio::select! {
            result = encoder.encode(&texts) => {
                result.map_err(|e| StageError::Transient(e.to_string()))?
            }
            _ = cancel.cancelled() => return Err(StageError::Cancelled),
        };

        let model = encoder.model_id().to_string();
        let document_id = DocumentId::new(doc_id.clone());
        let mut vector_ids = Vec::with_capacity(chunk_ids.len());

        for (chunk_id, vector) in chunk_ids.iter().zip(&embeddings) {
            let vid = vector_id(&doc_id, chunk_id, &model);
            ctx.vectors.upsert(
                &self.collection,
                &vid,
                vector.clone(),
                serde_json::json!({
                    "document_id": doc_id,
                    "chunk_id": chunk_id,
                    "model": model,
                }),
            )?;
            ctx.core
                .set_chunk_vector(&document_id, &ChunkId::new(chunk_id.clone()), &vid)?;
            vector_ids.push(vid);
        }

        let result = if batch {
            EmbedResult::Batch {
                count: embeddings.len(),
                embeddings,
                vector_ids,
                model,
            }
        } else {
            let embedding = embeddings.into_iter().next().unwrap_or_default();
            let vid = vector_ids.into_iter().next().unwrap_or_default();
            EmbedResult::Single {
                dimensions: embedding.len(),
                embedding,
                model,
                vector_id: vid,
            }
        };
        Ok(payload::encode(&result)?)
    }
}

#[cfg(test)]
#[path = "embed_tests.rs"]
mod tests;
