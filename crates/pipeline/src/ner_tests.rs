// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cf_bus::EventBus;
use cf_core::payload::NerResult;
use cf_core::{payload, Chunk, ChunkId, Document, DocumentId, EntityLabel};
use cf_engines::{FakeNer, HeuristicNer, RawMention};
use cf_store::{ContentStore, CoreSchema, VectorStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use yare::parameterized;

fn context(dir: &tempfile::TempDir) -> StageContext {
    let store = ContentStore::open(&dir.path().join("store")).unwrap();
    StageContext {
        core: CoreSchema::open(store.schema("core").unwrap()).unwrap(),
        vectors: VectorStore::open(store.schema("vectors").unwrap()).unwrap(),
        bus: EventBus::new(),
        data_root: dir.path().to_path_buf(),
    }
}

#[parameterized(
    single = { "Alice", 0.65 },
    multi = { "Alice Smith", 0.85 },
    lowercase_single = { "bitcoin", 0.55 },
)]
fn confidence_heuristic(text: &str, expected: f32) {
    assert!((derive_confidence(text) - expected).abs() < 1e-6);
}

#[tokio::test]
async fn per_chunk_payload_persists_mentions() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&dir);
    ctx.core
        .insert_document(Document::new(DocumentId::new("d1"), "h", "a.txt", 0))
        .unwrap();

    let stage = NerStage::new(Arc::new(HeuristicNer::new()));
    let out = stage
        .handle(
            &serde_json::json!({
                "text": "Alice met Bob in Paris on 2024-01-15.",
                "doc_id": "d1",
                "chunk_id": "d1:0",
            }),
            &ctx,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    let result: NerResult = payload::decode(&out).unwrap();

    let labels: Vec<(&str, &str)> = result
        .entities
        .iter()
        .map(|e| (e.text.as_str(), e.label.as_str()))
        .collect();
    assert!(labels.contains(&("Alice", "person")), "{labels:?}");
    assert!(labels.contains(&("Bob", "person")), "{labels:?}");
    assert!(labels.contains(&("Paris", "location")), "{labels:?}");
    assert!(labels.contains(&("2024-01-15", "date")), "{labels:?}");

    let mentions = ctx.core.mentions(&DocumentId::new("d1"));
    assert_eq!(mentions.len(), result.entities.len());
    assert!(mentions.iter().all(|m| m.chunk_id == ChunkId::new("d1:0")));
}

#[tokio::test]
async fn document_payload_walks_stored_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&dir);
    ctx.core
        .insert_document(Document::new(DocumentId::new("d1"), "h", "a.txt", 0))
        .unwrap();
    ctx.core
        .replace_chunks(
            &DocumentId::new("d1"),
            vec![
                Chunk {
                    id: ChunkId::new("d1:0"),
                    document_id: DocumentId::new("d1"),
                    text: "Alice went home.".into(),
                    chunk_index: 0,
                    page_number: 1,
                    vector_id: None,
                },
                Chunk {
                    id: ChunkId::new("d1:1"),
                    document_id: DocumentId::new("d1"),
                    text: "Alice met Carol.".into(),
                    chunk_index: 1,
                    page_number: 1,
                    vector_id: None,
                },
            ],
        )
        .unwrap();

    let stage = NerStage::new(Arc::new(HeuristicNer::new()));
    stage
        .handle(
            &serde_json::json!({"doc_id": "d1"}),
            &ctx,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    // Alice appears in both chunks and folds into one canonical
    let canonicals = ctx.core.canonical_entities();
    let alice = canonicals
        .iter()
        .find(|e| e.text == "Alice" && e.label == EntityLabel::Person)
        .unwrap();
    assert_eq!(alice.mention_count, 2);
}

#[tokio::test]
async fn model_scores_pass_through_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&dir);
    ctx.core
        .insert_document(Document::new(DocumentId::new("d1"), "h", "a.txt", 0))
        .unwrap();

    let model = FakeNer::new(vec![RawMention {
        text: "ACME".into(),
        label: "ORG".into(),
        start_char: 0,
        end_char: 4,
        confidence: Some(0.42),
    }]);
    let stage = NerStage::new(Arc::new(model));
    let out = stage
        .handle(
            &serde_json::json!({"text": "ACME", "doc_id": "d1", "chunk_id": "d1:0"}),
            &ctx,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    let result: NerResult = payload::decode(&out).unwrap();
    assert_eq!(result.entities[0].confidence, 0.42);
    assert_eq!(result.entities[0].label, "org");
}
