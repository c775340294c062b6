// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core schema: documents, chunks, and entities.
//!
//! Documents are content-addressed by SHA-256 file hash; derived artifacts
//! are produced exactly once by their owning stage and cascade-delete with
//! the document.

use crate::schema::{SchemaHandle, StoreError};
use cf_core::{
    CanonicalEntity, Chunk, ChunkId, Document, DocumentId, DocumentStatus, EntityMention,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

/// Result of a content-addressed insert.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Created(Document),
    /// An identical file was already ingested; no stage re-runs
    Existing(DocumentId),
}

impl InsertOutcome {
    pub fn document_id(&self) -> &DocumentId {
        match self {
            InsertOutcome::Created(doc) => &doc.id,
            InsertOutcome::Existing(id) => id,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Tables {
    documents: HashMap<String, Document>,
    chunks: HashMap<String, Vec<Chunk>>,
    mentions: HashMap<String, Vec<EntityMention>>,
    canonical_entities: HashMap<String, CanonicalEntity>,
}

struct Inner {
    tables: Tables,
    /// file_hash → document id, derived from the documents table
    hash_index: HashMap<String, String>,
    schema: SchemaHandle,
}

impl Inner {
    fn persist(&self) -> Result<(), StoreError> {
        self.schema.save_table("documents", &self.tables.documents)?;
        self.schema.save_table("chunks", &self.tables.chunks)?;
        self.schema.save_table("mentions", &self.tables.mentions)?;
        self.schema
            .save_table("canonical_entities", &self.tables.canonical_entities)?;
        Ok(())
    }
}

/// Typed access to the core schema. Cheap to clone.
#[derive(Clone)]
pub struct CoreSchema {
    inner: Arc<Mutex<Inner>>,
}

impl CoreSchema {
    pub fn open(schema: SchemaHandle) -> Result<Self, StoreError> {
        let tables = Tables {
            documents: schema.load_table("documents")?,
            chunks: schema.load_table("chunks")?,
            mentions: schema.load_table("mentions")?,
            canonical_entities: schema.load_table("canonical_entities")?,
        };
        let hash_index = tables
            .documents
            .values()
            .map(|d| (d.file_hash.clone(), d.id.to_string()))
            .collect();
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                tables,
                hash_index,
                schema,
            })),
        })
    }

    /// Insert a document, deduplicating on file hash. The check and insert
    /// happen under one lock, so concurrent submissions of the same file
    /// resolve to a single document.
    pub fn insert_document(&self, document: Document) -> Result<InsertOutcome, StoreError> {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.hash_index.get(&document.file_hash) {
            return Ok(InsertOutcome::Existing(DocumentId::new(existing.clone())));
        }
        inner
            .hash_index
            .insert(document.file_hash.clone(), document.id.to_string());
        inner
            .tables
            .documents
            .insert(document.id.to_string(), document.clone());
        inner.persist()?;
        Ok(InsertOutcome::Created(document))
    }

    pub fn document(&self, id: &DocumentId) -> Option<Document> {
        self.inner.lock().tables.documents.get(id.as_str()).cloned()
    }

    pub fn document_by_hash(&self, file_hash: &str) -> Option<Document> {
        let inner = self.inner.lock();
        let id = inner.hash_index.get(file_hash)?;
        inner.tables.documents.get(id).cloned()
    }

    pub fn documents(&self) -> Vec<Document> {
        self.inner.lock().tables.documents.values().cloned().collect()
    }

    pub fn set_status(
        &self,
        id: &DocumentId,
        status: DocumentStatus,
        error: Option<String>,
        now_ms: u64,
    ) -> Result<Document, StoreError> {
        self.update_document(id, |doc| {
            doc.status = status;
            doc.error = error.clone();
            doc.updated_at_ms = now_ms;
        })
    }

    pub fn update_document(
        &self,
        id: &DocumentId,
        f: impl FnOnce(&mut Document),
    ) -> Result<Document, StoreError> {
        let mut inner = self.inner.lock();
        let doc = inner
            .tables
            .documents
            .get_mut(id.as_str())
            .ok_or_else(|| StoreError::DocumentNotFound(id.to_string()))?;
        f(doc);
        let doc = doc.clone();
        inner.persist()?;
        Ok(doc)
    }

    /// Replace a document's chunks. Indices must form `[0, N)`.
    pub fn replace_chunks(
        &self,
        id: &DocumentId,
        chunks: Vec<Chunk>,
    ) -> Result<(), StoreError> {
        for (i, chunk) in chunks.iter().enumerate() {
            if chunk.chunk_index as usize != i {
                return Err(StoreError::ChunkIndexGap {
                    document_id: id.to_string(),
                });
            }
        }
        let mut inner = self.inner.lock();
        if !inner.tables.documents.contains_key(id.as_str()) {
            return Err(StoreError::DocumentNotFound(id.to_string()));
        }
        inner.tables.chunks.insert(id.to_string(), chunks);
        inner.persist()
    }

    pub fn chunks(&self, id: &DocumentId) -> Vec<Chunk> {
        self.inner
            .lock()
            .tables
            .chunks
            .get(id.as_str())
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_chunk_vector(
        &self,
        id: &DocumentId,
        chunk_id: &ChunkId,
        vector_id: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if let Some(chunks) = inner.tables.chunks.get_mut(id.as_str()) {
            if let Some(chunk) = chunks.iter_mut().find(|c| c.id == *chunk_id) {
                chunk.vector_id = Some(vector_id.to_string());
            }
        }
        inner.persist()
    }

    /// Record mentions for a document and fold them into the canonical
    /// entity table.
    pub fn add_mentions(
        &self,
        id: &DocumentId,
        mentions: Vec<EntityMention>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.tables.documents.contains_key(id.as_str()) {
            return Err(StoreError::DocumentNotFound(id.to_string()));
        }
        for mention in &mentions {
            let key = CanonicalEntity::key(&mention.text, mention.label);
            let entry = inner
                .tables
                .canonical_entities
                .entry(key.clone())
                .or_insert_with(|| CanonicalEntity {
                    id: canonical_id(&key),
                    text: mention.text.trim().to_string(),
                    label: mention.label,
                    mention_count: 0,
                });
            entry.mention_count += 1;
        }
        inner
            .tables
            .mentions
            .entry(id.to_string())
            .or_default()
            .extend(mentions);
        inner.persist()
    }

    pub fn mentions(&self, id: &DocumentId) -> Vec<EntityMention> {
        self.inner
            .lock()
            .tables
            .mentions
            .get(id.as_str())
            .cloned()
            .unwrap_or_default()
    }

    pub fn canonical_entities(&self) -> Vec<CanonicalEntity> {
        self.inner
            .lock()
            .tables
            .canonical_entities
            .values()
            .cloned()
            .collect()
    }

    pub fn get_entity(&self, entity_id: &str) -> Option<CanonicalEntity> {
        self.inner
            .lock()
            .tables
            .canonical_entities
            .values()
            .find(|e| e.id == entity_id)
            .cloned()
    }

    /// Delete a document and cascade its chunks and mentions.
    pub fn delete_document(&self, id: &DocumentId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if let Some(doc) = inner.tables.documents.remove(id.as_str()) {
            inner.hash_index.remove(&doc.file_hash);
        }
        inner.tables.chunks.remove(id.as_str());
        inner.tables.mentions.remove(id.as_str());
        inner.persist()
    }
}

fn canonical_id(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("ent-{:x}", digest)[..20].to_string()
}

#[cfg(test)]
#[path = "core_schema_tests.rs"]
mod tests;
