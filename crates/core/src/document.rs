// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Document artifact owned by the ingestion coordinator.

use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Unique identifier for an ingested document.
    ///
    /// Generated ids carry the content-hash prefix form `doc-<hash16>`
    /// so a document id is stable across re-ingest.
    pub struct DocumentId, prefix "doc";
}

/// Lifecycle status of a document through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Complete,
    /// Keyword-searchable but degraded (e.g. embeddings skipped because no
    /// GPU workers were registered)
    Partial,
    Failed,
}

impl DocumentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DocumentStatus::Complete | DocumentStatus::Partial | DocumentStatus::Failed
        )
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentStatus::Pending => write!(f, "pending"),
            DocumentStatus::Processing => write!(f, "processing"),
            DocumentStatus::Complete => write!(f, "complete"),
            DocumentStatus::Partial => write!(f, "partial"),
            DocumentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Forensic metadata captured at extraction time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub size_bytes: u64,
}

/// Core document artifact.
///
/// Content-addressed by `file_hash`; re-ingesting an identical file
/// short-circuits to the existing document id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    /// SHA-256 of the source file; globally unique
    pub file_hash: String,
    /// Original path as submitted by the operator
    pub source_path: String,
    pub status: DocumentStatus,
    #[serde(default)]
    pub num_pages: u32,
    #[serde(default)]
    pub metadata: DocumentMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl Document {
    pub fn new(
        id: DocumentId,
        file_hash: impl Into<String>,
        source_path: impl Into<String>,
        now_ms: u64,
    ) -> Self {
        Self {
            id,
            file_hash: file_hash.into(),
            source_path: source_path.into(),
            status: DocumentStatus::Pending,
            num_pages: 0,
            metadata: DocumentMeta::default(),
            error: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;
