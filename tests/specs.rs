// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end pipeline scenarios against in-process components.

use cf_broker::{Broker, DurableBroker, JobLedger};
use cf_bus::{EventBus, TopicPattern};
use cf_core::{
    topics, DocumentId, DocumentStatus, EntityLabel, JobConfig, JobId, JobStatus, PoolDef,
    ResourceTier, SystemClock, WorkerId,
};
use cf_engines::{
    EmbeddingEncoder, FakeOcrEngine, HashEncoder, HeuristicNer, LazyEngine, OcrEngine,
};
use cf_pipeline::{
    ChunkConfig, ChunkMethod, ChunkStage, EmbedStage, ExtractStage, NerStage, NormalizeStage,
    OcrConfig, OcrStage, PipelinePlan, StageContext,
};
use cf_runtime::{
    ActivityLogger, Coordinator, CoordinatorParams, Dispatcher, DispatcherParams, HandlerRegistry,
    IngestOutcome, Supervisor, SupervisorParams, Worker, WorkerDirectory, WorkerParams,
};
use cf_store::{ContentStore, CoreSchema, VectorStore};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const COLLECTION: &str = "chunks";

struct Pipeline {
    coordinator: Arc<Coordinator<SystemClock>>,
    ledger: Arc<JobLedger>,
    core: CoreSchema,
    vectors: VectorStore,
    bus: EventBus,
    directory: Arc<WorkerDirectory>,
    cancel: CancellationToken,
    dir: tempfile::TempDir,
}

struct PipelineOptions {
    ocr_fast: Option<FakeOcrEngine>,
    ocr_heavy: Option<FakeOcrEngine>,
    embed_workers: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            ocr_fast: None,
            ocr_heavy: None,
            embed_workers: true,
        }
    }
}

async fn start_pipeline(options: PipelineOptions) -> Pipeline {
    let dir = tempfile::tempdir().unwrap();
    let clock = SystemClock;

    let broker: Arc<dyn Broker> =
        Arc::new(DurableBroker::open(&dir.path().join("broker.jsonl")).unwrap());
    let ledger = Arc::new(JobLedger::open(&dir.path().join("ledger.jsonl")).unwrap());
    let store = ContentStore::open(&dir.path().join("store")).unwrap();
    let core = CoreSchema::open(store.schema("core").unwrap()).unwrap();
    let vectors = VectorStore::open(store.schema("vectors").unwrap()).unwrap();
    let bus = EventBus::with_session_log(&dir.path().join("events/session.jsonl")).unwrap();
    let directory = Arc::new(WorkerDirectory::new());
    let registry = Arc::new(HandlerRegistry::new());

    let pools = [
        ("extract", ResourceTier::CpuExtract),
        ("normalize", ResourceTier::CpuLight),
        ("chunk", ResourceTier::CpuLight),
        ("ner", ResourceTier::CpuNer),
        ("embed", ResourceTier::GpuEmbed),
        ("ocr", ResourceTier::GpuPaddle),
    ];
    for (name, tier) in pools {
        directory.register_pool(
            PoolDef::new(name, tier)
                .max_concurrency(2)
                .job_timeout(Duration::from_secs(30)),
        );
    }

    registry.register("extract", Arc::new(ExtractStage));
    registry.register("normalize", Arc::new(NormalizeStage));
    registry.register("chunk", Arc::new(ChunkStage));
    registry.register("ner", Arc::new(NerStage::new(Arc::new(HeuristicNer::new()))));
    registry.register(
        "embed",
        Arc::new(EmbedStage::new(
            LazyEngine::ready(Arc::new(HashEncoder::new(64)) as Arc<dyn EmbeddingEncoder>),
            COLLECTION,
        )),
    );
    registry.register(
        "ocr",
        Arc::new(OcrStage::new(
            options
                .ocr_fast
                .map(|fast| LazyEngine::ready(Arc::new(fast) as Arc<dyn OcrEngine>)),
            options
                .ocr_heavy
                .map(|heavy| LazyEngine::ready(Arc::new(heavy) as Arc<dyn OcrEngine>)),
            OcrConfig::default(),
        )),
    );

    let dispatcher = Arc::new(Dispatcher::new(DispatcherParams {
        broker: Arc::clone(&broker),
        ledger: Arc::clone(&ledger),
        directory: Arc::clone(&directory),
        plan: PipelinePlan::standard(),
        clock,
        stale_pool_threshold: Duration::from_secs(60),
        max_worker_requeues: 3,
        worker_ttl: Duration::from_secs(15),
    }));

    let ctx = StageContext {
        core: core.clone(),
        vectors: vectors.clone(),
        bus: bus.clone(),
        data_root: dir.path().to_path_buf(),
    };

    let coordinator = Arc::new(Coordinator::new(CoordinatorParams {
        core: core.clone(),
        broker: Arc::clone(&broker),
        ledger: Arc::clone(&ledger),
        dispatcher: Arc::clone(&dispatcher),
        bus: bus.clone(),
        clock,
        data_root: dir.path().to_path_buf(),
        chunking: ChunkConfig {
            method: ChunkMethod::Sentence,
            chunk_size: 200,
            overlap: 0,
        },
        logger: Arc::new(ActivityLogger::new(dir.path().join("logs"))),
    }));

    let cancel = CancellationToken::new();
    tokio::spawn(Arc::clone(&coordinator).run(cancel.clone()));
    tokio::spawn(
        Supervisor::new(SupervisorParams {
            broker: Arc::clone(&broker),
            ledger: Arc::clone(&ledger),
            directory: Arc::clone(&directory),
            bus: bus.clone(),
            clock,
            heartbeat_interval: Duration::from_millis(500),
        })
        .run(cancel.clone()),
    );

    for (name, _) in pools {
        if name == "embed" && !options.embed_workers {
            continue;
        }
        // Register eagerly so admission never races worker startup
        directory.register_worker(cf_core::WorkerRecord::new(
            WorkerId::new(format!("w-{name}")),
            name,
            "test",
            cf_core::Clock::epoch_ms(&clock),
        ));
        let params = WorkerParams {
            id: WorkerId::new(format!("w-{name}")),
            pool: directory.pool(name).unwrap(),
            host: "test".into(),
            broker: Arc::clone(&broker),
            ledger: Arc::clone(&ledger),
            registry: Arc::clone(&registry),
            directory: Arc::clone(&directory),
            bus: bus.clone(),
            ctx: ctx.clone(),
            clock,
            heartbeat_interval: Duration::from_millis(500),
            logger: Arc::new(ActivityLogger::new(dir.path().join("logs"))),
        };
        tokio::spawn(Worker::run_supervised(params, cancel.clone()));
    }

    Pipeline {
        coordinator,
        ledger,
        core,
        vectors,
        bus,
        directory,
        cancel,
        dir,
    }
}

async fn wait_for_document(pipeline: &Pipeline, id: &DocumentId) -> DocumentStatus {
    for _ in 0..600 {
        if let Some(document) = pipeline.core.document(id) {
            if document.status.is_terminal() {
                return document.status;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("document {id} never reached a terminal status");
}

/// A tiny PDF with `pages` page objects and an embedded text stream.
fn text_pdf(pages: usize, text: &str) -> Vec<u8> {
    let mut pdf = String::from("%PDF-1.4\n");
    pdf.push_str("1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    pdf.push_str("2 0 obj << /Type /Pages /Count 3 >> endobj\n");
    for i in 0..pages {
        pdf.push_str(&format!("{} 0 obj << /Type /Page >> endobj\n", i + 3));
    }
    pdf.push_str(&format!("BT /F1 12 Tf ({text}) Tj ET\n"));
    pdf.push_str("trailer << /Root 1 0 R >>\n%%EOF");
    pdf.into_bytes()
}

#[tokio::test]
async fn happy_text_pdf_reaches_complete_with_entities_and_vectors() {
    let pipeline = start_pipeline(PipelineOptions::default()).await;
    std::fs::write(
        pipeline.dir.path().join("report.pdf"),
        text_pdf(3, "Alice met Bob in Paris on 2024-01-15."),
    )
    .unwrap();

    let outcome = pipeline.coordinator.ingest("report.pdf").await.unwrap();
    let IngestOutcome::Created { document, .. } = outcome else {
        panic!("expected a new document");
    };

    let status = wait_for_document(&pipeline, &document.id).await;
    assert_eq!(status, DocumentStatus::Complete);

    let stored = pipeline.core.document(&document.id).unwrap();
    assert_eq!(stored.num_pages, 3);

    // Chunks exist with dense indices
    let chunks = pipeline.core.chunks(&document.id);
    assert!(!chunks.is_empty());
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index as usize, i);
        assert!(chunk.vector_id.is_some(), "chunk {i} missing vector");
    }

    // One vector per chunk in the collection
    assert_eq!(pipeline.vectors.count(COLLECTION), chunks.len());

    // NER found the expected mentions
    let mentions = pipeline.core.mentions(&document.id);
    let found: Vec<(&str, EntityLabel)> = mentions
        .iter()
        .map(|m| (m.text.as_str(), m.label))
        .collect();
    assert!(found.contains(&("Alice", EntityLabel::Person)), "{found:?}");
    assert!(found.contains(&("Bob", EntityLabel::Person)), "{found:?}");
    assert!(found.contains(&("Paris", EntityLabel::Location)), "{found:?}");
    assert!(found.contains(&("2024-01-15", EntityLabel::Date)), "{found:?}");

    pipeline.cancel.cancel();
}

#[tokio::test]
async fn scanned_page_with_confident_fast_ocr_does_not_escalate() {
    let fast = FakeOcrEngine::with_text(
        "fast",
        "Scanned memo naming Carol and the Lisbon field office.",
        0.82,
    );
    let pipeline = start_pipeline(PipelineOptions {
        ocr_fast: Some(fast),
        ocr_heavy: Some(FakeOcrEngine::with_text("heavy", "unused", 0.99)),
        ..PipelineOptions::default()
    })
    .await;
    // PNG magic: binary, no embedded text
    std::fs::write(pipeline.dir.path().join("scan.png"), [0x89, 0x50, 0x4e, 0x47]).unwrap();

    let escalations = pipeline
        .bus
        .subscribe(TopicPattern::parse(topics::OCR_ESCALATED).unwrap());

    let outcome = pipeline.coordinator.ingest("scan.png").await.unwrap();
    let status = wait_for_document(&pipeline, outcome.document_id()).await;
    assert_eq!(status, DocumentStatus::Complete);

    // Fast engine only; text flowed into chunks
    assert!(escalations.try_recv().is_none());
    let chunks = pipeline.core.chunks(outcome.document_id());
    assert!(chunks.iter().any(|c| c.text.contains("Carol")));

    pipeline.cancel.cancel();
}

#[tokio::test]
async fn low_confidence_fast_ocr_escalates_to_heavy() {
    let pipeline = start_pipeline(PipelineOptions {
        ocr_fast: Some(FakeOcrEngine::with_text("fast", "g@rbl3d", 0.40)),
        ocr_heavy: Some(FakeOcrEngine::with_text(
            "heavy",
            "Recovered testimony mentioning Dmitri and Vienna.",
            0.95,
        )),
        ..PipelineOptions::default()
    })
    .await;
    std::fs::write(pipeline.dir.path().join("scan.png"), [0x89, 0x50, 0x4e, 0x47]).unwrap();

    let outcome = pipeline.coordinator.ingest("scan.png").await.unwrap();
    let status = wait_for_document(&pipeline, outcome.document_id()).await;
    assert_eq!(status, DocumentStatus::Complete);

    // The trail shows both the attempt and the escalation
    let events = pipeline.bus.recent_events(usize::MAX);
    assert!(events.iter().any(|e| e.topic == topics::OCR_ATTEMPTED));
    assert!(events.iter().any(|e| e.topic == topics::OCR_ESCALATED));

    let chunks = pipeline.core.chunks(outcome.document_id());
    assert!(chunks.iter().any(|c| c.text.contains("Dmitri")));

    pipeline.cancel.cancel();
}

#[tokio::test]
async fn ocr_with_no_engines_fails_the_document() {
    let pipeline = start_pipeline(PipelineOptions::default()).await;
    std::fs::write(pipeline.dir.path().join("scan.png"), [0x89, 0x50, 0x4e, 0x47]).unwrap();

    let failed = pipeline
        .bus
        .subscribe(TopicPattern::parse(topics::DOCUMENT_FAILED).unwrap());

    let outcome = pipeline.coordinator.ingest("scan.png").await.unwrap();
    let status = wait_for_document(&pipeline, outcome.document_id()).await;
    assert_eq!(status, DocumentStatus::Failed);
    assert!(failed.recv().await.is_some());

    pipeline.cancel.cancel();
}

#[tokio::test]
async fn poison_job_dead_letters_after_exactly_the_cap() {
    let dir = tempfile::tempdir().unwrap();
    let broker: Arc<dyn Broker> =
        Arc::new(DurableBroker::open(&dir.path().join("broker.jsonl")).unwrap());
    let ledger = Arc::new(JobLedger::open(&dir.path().join("ledger.jsonl")).unwrap());
    let directory = Arc::new(WorkerDirectory::new());
    let bus = EventBus::new();
    let supervisor = Supervisor::new(SupervisorParams {
        broker: Arc::clone(&broker),
        ledger,
        directory,
        bus: bus.clone(),
        clock: SystemClock,
        heartbeat_interval: Duration::from_millis(500),
    });

    let failed = bus.subscribe(TopicPattern::parse(topics::DOCUMENT_FAILED).unwrap());
    broker
        .enqueue(
            JobConfig::new(JobId::new("poison"), "ner", serde_json::json!({"boom": true}))
                .max_worker_requeues(3)
                .correlation_id("doc-poison"),
        )
        .await
        .unwrap();

    // Each round: a fresh worker claims, "crashes", and the supervisor
    // recovers. Exactly three requeues happen before the dead-letter.
    for round in 0..3 {
        broker
            .claim("ner", &WorkerId::new(format!("victim-{round}")))
            .await
            .unwrap()
            .unwrap();
        supervisor.scan_once().await.unwrap();
        let job = broker.job(&JobId::new("poison")).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.worker_requeue_count, round + 1);
    }

    broker
        .claim("ner", &WorkerId::new("victim-3"))
        .await
        .unwrap()
        .unwrap();
    supervisor.scan_once().await.unwrap();

    let job = broker.job(&JobId::new("poison")).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Dead);
    assert_eq!(job.worker_requeue_count, 3); // never exceeds the cap

    // document.failed emitted; no further worker is sacrificed
    assert!(failed.try_recv().is_some());
    assert!(broker
        .claim("ner", &WorkerId::new("victim-4"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn missing_gpu_pool_degrades_document_to_partial() {
    let pipeline = start_pipeline(PipelineOptions {
        embed_workers: false,
        ..PipelineOptions::default()
    })
    .await;
    std::fs::write(
        pipeline.dir.path().join("note.txt"),
        "Keyword searchable even without embeddings.",
    )
    .unwrap();

    let outcome = pipeline.coordinator.ingest("note.txt").await.unwrap();
    let status = wait_for_document(&pipeline, outcome.document_id()).await;
    assert_eq!(status, DocumentStatus::Partial);

    // Chunked (keyword-searchable) but un-embedded
    let chunks = pipeline.core.chunks(outcome.document_id());
    assert!(!chunks.is_empty());
    assert!(chunks.iter().all(|c| c.vector_id.is_none()));
    assert_eq!(pipeline.vectors.count(COLLECTION), 0);

    pipeline.cancel.cancel();
}

#[tokio::test]
async fn concurrent_duplicate_ingest_creates_one_document() {
    let pipeline = start_pipeline(PipelineOptions::default()).await;
    std::fs::write(pipeline.dir.path().join("a.txt"), "The same bytes twice.").unwrap();
    std::fs::write(pipeline.dir.path().join("b.txt"), "The same bytes twice.").unwrap();

    let (first, second) = tokio::join!(
        pipeline.coordinator.ingest("a.txt"),
        pipeline.coordinator.ingest("b.txt"),
    );
    let first = first.unwrap();
    let second = second.unwrap();

    assert_eq!(first.document_id(), second.document_id());
    let created = [&first, &second]
        .iter()
        .filter(|o| matches!(o, IngestOutcome::Created { .. }))
        .count();
    assert_eq!(created, 1);
    assert_eq!(pipeline.core.documents().len(), 1);

    let status = wait_for_document(&pipeline, first.document_id()).await;
    assert_eq!(status, DocumentStatus::Complete);

    // Exactly one run of each stage
    for pool in ["extract", "normalize", "chunk", "ner", "embed"] {
        let jobs = pipeline.ledger.list(Some(pool), None, 100, 0);
        assert_eq!(jobs.len(), 1, "pool {pool} ran {} jobs", jobs.len());
    }

    pipeline.cancel.cancel();
}

#[tokio::test]
async fn worker_count_scales_per_pool() {
    let pipeline = start_pipeline(PipelineOptions::default()).await;

    // All six pools have a live worker registered
    for pool in ["extract", "normalize", "chunk", "ner", "embed", "ocr"] {
        let mut live = 0;
        for _ in 0..100 {
            live = pipeline.directory.live_workers(
                pool,
                cf_core::Clock::epoch_ms(&SystemClock),
                15_000,
            );
            if live > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(live > 0, "no live workers in pool {pool}");
    }

    pipeline.cancel.cancel();
}
