// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Text chunks derived from a document.

use crate::document::DocumentId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a chunk.
    ///
    /// The chunk stage uses the deterministic `<doc-id>:<index>` form so
    /// re-chunking a document maps onto the same ids.
    pub struct ChunkId, prefix "chunk";
}

/// A contiguous slice of a document's normalized text.
///
/// `chunk_index` values for a document form the dense range `[0, N)`.
/// Chunks cascade-delete with their document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub document_id: DocumentId,
    pub text: String,
    pub chunk_index: u32,
    pub page_number: u32,
    /// Set once the embed stage has written this chunk's vector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_id: Option<String>,
}
