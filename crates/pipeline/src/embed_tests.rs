// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cf_bus::EventBus;
use cf_core::{payload, Chunk, ChunkId, Document, DocumentId, EmbedResult};
use cf_engines::{EmbeddingEncoder, HashEncoder, LazyEngine};
use cf_store::{ContentStore, CoreSchema, VectorStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn context(dir: &tempfile::TempDir) -> StageContext {
    let store = ContentStore::open(&dir.path().join("store")).unwrap();
    StageContext {
        core: CoreSchema::open(store.schema("core").unwrap()).unwrap(),
        vectors: VectorStore::open(store.schema("vectors").unwrap()).unwrap(),
        bus: EventBus::new(),
        data_root: dir.path().to_path_buf(),
    }
}

fn stage() -> EmbedStage {
    EmbedStage::new(
        LazyEngine::ready(Arc::new(HashEncoder::new(64)) as Arc<dyn EmbeddingEncoder>),
        "chunks",
    )
}

fn seed_chunks(ctx: &StageContext, doc_id: &str, texts: &[&str]) {
    ctx.core
        .insert_document(Document::new(
            DocumentId::new(doc_id),
            format!("hash-{doc_id}"),
            "a.txt",
            0,
        ))
        .unwrap();
    let chunks = texts
        .iter()
        .enumerate()
        .map(|(i, text)| Chunk {
            id: ChunkId::new(format!("{doc_id}:{i}")),
            document_id: DocumentId::new(doc_id),
            text: text.to_string(),
            chunk_index: i as u32,
            page_number: 1,
            vector_id: None,
        })
        .collect();
    ctx.core.replace_chunks(&DocumentId::new(doc_id), chunks).unwrap();
}

#[tokio::test]
async fn single_embed_writes_vector_and_links_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&dir);
    seed_chunks(&ctx, "d1", &["some chunk text"]);

    let out = stage()
        .handle(
            &serde_json::json!({"text": "some chunk text", "doc_id": "d1", "chunk_id": "d1:0"}),
            &ctx,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    let result: EmbedResult = payload::decode(&out).unwrap();

    let EmbedResult::Single {
        dimensions,
        vector_id: vid,
        model,
        ..
    } = result
    else {
        panic!("expected single result");
    };
    assert_eq!(dimensions, 64);
    assert_eq!(model, "feature-hash-v1");

    // Vector stored with its payload, chunk row updated
    let point = ctx.vectors.get("chunks", &vid).unwrap();
    assert_eq!(point.payload["chunk_id"], "d1:0");
    assert_eq!(
        ctx.core.chunks(&DocumentId::new("d1"))[0].vector_id.as_deref(),
        Some(vid.as_str())
    );
}

#[tokio::test]
async fn batch_embed_covers_every_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&dir);
    seed_chunks(&ctx, "d1", &["first", "second", "third"]);

    let out = stage()
        .handle(
            &serde_json::json!({
                "texts": ["first", "second", "third"],
                "batch": true,
                "chunk_ids": ["d1:0", "d1:1", "d1:2"],
                "doc_id": "d1",
            }),
            &ctx,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    let result: EmbedResult = payload::decode(&out).unwrap();

    let EmbedResult::Batch { count, vector_ids, .. } = result else {
        panic!("expected batch result");
    };
    assert_eq!(count, 3);
    assert_eq!(ctx.vectors.count("chunks"), 3);
    for chunk in ctx.core.chunks(&DocumentId::new("d1")) {
        assert!(chunk.vector_id.is_some());
    }
    assert_eq!(vector_ids.len(), 3);
}

#[tokio::test]
async fn vector_ids_are_deterministic() {
    assert_eq!(
        vector_id("d1", "d1:0", "model-a"),
        vector_id("d1", "d1:0", "model-a")
    );
    assert_ne!(
        vector_id("d1", "d1:0", "model-a"),
        vector_id("d1", "d1:0", "model-b")
    );
}

#[tokio::test]
async fn reembedding_is_an_upsert() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&dir);
    seed_chunks(&ctx, "d1", &["text"]);

    let payload_json =
        serde_json::json!({"text": "text", "doc_id": "d1", "chunk_id": "d1:0"});
    let s = stage();
    s.handle(&payload_json, &ctx, &CancellationToken::new()).await.unwrap();
    s.handle(&payload_json, &ctx, &CancellationToken::new()).await.unwrap();

    assert_eq!(ctx.vectors.count("chunks"), 1);
}

#[tokio::test]
async fn mismatched_batch_arrays_fail() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&dir);
    let err = stage()
        .handle(
            &serde_json::json!({
                "texts": ["a", "b"],
                "batch": true,
                "chunk_ids": ["only-one"],
                "doc_id": "d1",
            }),
            &ctx,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StageError::Failed(_)));
}
