// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ingestion coordinator: owns documents and drives their state machine.
//!
//! Ingest is content-addressed (re-submitting an identical file resolves
//! to the existing document and re-runs nothing). Stage completion events
//! trigger the successor stage; failures and GPU-pool unavailability
//! degrade the document to `failed` / `partial` instead of retrying
//! forever.

use crate::activity::{ActivityLogger, DocumentLog};
use crate::dispatcher::{DispatchError, Dispatcher};
use crate::error::RuntimeError;
use cf_broker::{Broker, JobLedger};
use cf_bus::{EventBus, TopicPattern};
use cf_core::{
    topics, BusEvent, Clock, CorrelationId, Document, DocumentId, DocumentStatus, Job, JobId,
};
use cf_pipeline::{resolve_path, ChunkConfig, NormalizeResult, StageError};
use cf_core::payload::{ExtractResult, OcrResult};
use cf_store::{CoreSchema, InsertOutcome};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Result of submitting a file for processing.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// New document created; the extract job is on its pool
    Created { document: Document, job: Job },
    /// Identical file already ingested; no stage re-runs
    Existing { document_id: DocumentId },
}

impl IngestOutcome {
    pub fn document_id(&self) -> &DocumentId {
        match self {
            IngestOutcome::Created { document, .. } => &document.id,
            IngestOutcome::Existing { document_id } => document_id,
        }
    }
}

pub struct CoordinatorParams<C: Clock> {
    pub core: CoreSchema,
    pub broker: Arc<dyn Broker>,
    pub ledger: Arc<JobLedger>,
    pub dispatcher: Arc<Dispatcher<C>>,
    pub bus: EventBus,
    pub clock: C,
    pub data_root: PathBuf,
    pub chunking: ChunkConfig,
    pub logger: Arc<ActivityLogger<DocumentLog>>,
}

pub struct Coordinator<C: Clock> {
    params: CoordinatorParams<C>,
    /// Stages that have recorded success, per document (idempotent
    /// against at-least-once event delivery)
    completed_stages: Mutex<HashMap<String, HashSet<String>>>,
}

impl<C: Clock + 'static> Coordinator<C> {
    pub fn new(params: CoordinatorParams<C>) -> Self {
        Self {
            params,
            completed_stages: Mutex::new(HashMap::new()),
        }
    }

    /// Submit a file. Hashes it, deduplicates by content address, and
    /// enqueues the first pipeline stage for new documents.
    pub async fn ingest(&self, file_path: &str) -> Result<IngestOutcome, RuntimeError> {
        let p = &self.params;
        let resolved = resolve_path(&p.data_root, file_path)?;
        let bytes = tokio::fs::read(&resolved)
            .await
            .map_err(|e| StageError::Transient(format!("read {}: {e}", resolved.display())))?;
        let file_hash = format!("{:x}", Sha256::digest(&bytes));
        drop(bytes);

        let document_id =
            DocumentId::new(format!("{}-{}", DocumentId::PREFIX, &file_hash[..16]));
        let document = Document::new(
            document_id.clone(),
            file_hash,
            file_path.to_string(),
            p.clock.epoch_ms(),
        );

        match p.core.insert_document(document)? {
            InsertOutcome::Existing(existing) => {
                info!(document = %existing, "duplicate ingest short-circuited");
                Ok(IngestOutcome::Existing {
                    document_id: existing,
                })
            }
            InsertOutcome::Created(document) => {
                p.logger.append(
                    document.id.as_str(),
                    &format!("ingested {} ({})", file_path, document.file_hash),
                );
                p.bus.publish(
                    BusEvent::new(
                        topics::DOCUMENT_INGESTED,
                        "coordinator",
                        serde_json::json!({
                            "document_id": document.id,
                            "file_hash": document.file_hash,
                            "file_path": file_path,
                        }),
                    )
                    .correlated(CorrelationId::new(document.id.to_string())),
                );

                let job = self
                    .enqueue_stage(
                        "extract",
                        serde_json::json!({
                            "file_path": file_path,
                            "document_id": document.id,
                        }),
                        &document.id,
                    )
                    .await?;
                Ok(IngestOutcome::Created { document, job })
            }
        }
    }

    /// Operator re-attempt: reset the requeue budget and re-pend the job.
    pub async fn requeue(&self, job_id: &JobId) -> Result<Job, RuntimeError> {
        let job = self.params.broker.reset(job_id).await?;
        let _ = self.params.ledger.record(&job);
        Ok(job)
    }

    /// React to stage completion/failure events until cancelled.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        // Pattern is a fixed literal
        #[allow(clippy::unwrap_used)]
        let stages = self.params.bus.subscribe(TopicPattern::parse("stage.**").unwrap());
        #[allow(clippy::unwrap_used)]
        let ocr_required = self
            .params
            .bus
            .subscribe(TopicPattern::parse(topics::DOCUMENT_OCR_REQUIRED).unwrap());

        loop {
            tokio::select! {
                event = stages.recv() => {
                    let Some(event) = event else { return };
                    if let Err(e) = self.handle_stage_event(&event).await {
                        warn!(topic = %event.topic, error = %e, "stage event handling failed");
                    }
                }
                event = ocr_required.recv() => {
                    let Some(event) = event else { return };
                    if let Err(e) = self.handle_ocr_required(&event).await {
                        warn!(error = %e, "ocr dispatch failed");
                    }
                }
                _ = cancel.cancelled() => return,
            }
        }
    }

    fn document_of(event: &BusEvent) -> Option<DocumentId> {
        event
            .correlation_id
            .as_ref()
            .map(|c| DocumentId::new(c.as_str()))
    }

    /// Record a stage success. Returns false when this is a duplicate
    /// delivery (handlers must be idempotent).
    fn record_completion(&self, document_id: &DocumentId, stage: &str) -> bool {
        self.completed_stages
            .lock()
            .entry(document_id.to_string())
            .or_default()
            .insert(stage.to_string())
    }

    fn all_mandatory_complete(&self, document_id: &DocumentId) -> bool {
        let completed = self.completed_stages.lock();
        let Some(done) = completed.get(document_id.as_str()) else {
            return false;
        };
        self.params
            .dispatcher
            .plan()
            .mandatory_stages()
            .iter()
            .all(|stage| done.contains(*stage))
    }

    async fn handle_ocr_required(&self, event: &BusEvent) -> Result<(), RuntimeError> {
        let Some(document_id) = Self::document_of(event) else {
            return Ok(());
        };
        let file_path = event.payload["file_path"].as_str().unwrap_or_default();
        self.params
            .logger
            .append(document_id.as_str(), "deferred to ocr");
        self.enqueue_stage(
            "ocr",
            serde_json::json!({
                "image_path": file_path,
                "lang": "en",
                "use_angle_cls": true,
                "document_id": document_id,
            }),
            &document_id,
        )
        .await?;
        Ok(())
    }

    async fn handle_stage_event(&self, event: &BusEvent) -> Result<(), RuntimeError> {
        let mut parts = event.topic.split('.');
        let (Some("stage"), Some(stage), Some(kind)) = (parts.next(), parts.next(), parts.next())
        else {
            return Ok(());
        };
        let Some(document_id) = Self::document_of(event) else {
            return Ok(());
        };

        match kind {
            "completed" => {
                self.handle_stage_completed(stage, &document_id, &event.payload["result"])
                    .await
            }
            "failed" => {
                self.fail_document(
                    &document_id,
                    format!(
                        "stage {stage} failed: {}",
                        event.payload["error"].as_str().unwrap_or("unknown")
                    ),
                )
                .await
            }
            _ => Ok(()),
        }
    }

    async fn handle_stage_completed(
        &self,
        stage: &str,
        document_id: &DocumentId,
        result: &serde_json::Value,
    ) -> Result<(), RuntimeError> {
        if !self.record_completion(document_id, stage) {
            return Ok(());
        }
        let p = &self.params;
        p.logger
            .append(document_id.as_str(), &format!("stage {stage} completed"));

        match stage {
            "extract" => {
                let extract: ExtractResult = match serde_json::from_value(result.clone()) {
                    Ok(v) => v,
                    Err(_) => return Ok(()),
                };
                if extract.ocr_required {
                    // The ocr detour is triggered by document.ocr_required
                    return Ok(());
                }
                self.enqueue_stage(
                    "normalize",
                    serde_json::json!({"text": extract.text, "document_id": document_id}),
                    document_id,
                )
                .await?;
            }
            "ocr" => {
                let ocr: OcrResult = match serde_json::from_value(result.clone()) {
                    Ok(v) => v,
                    Err(_) => return Ok(()),
                };
                self.enqueue_stage(
                    "normalize",
                    serde_json::json!({"text": ocr.text, "document_id": document_id}),
                    document_id,
                )
                .await?;
            }
            "normalize" => {
                let normalized: NormalizeResult = match serde_json::from_value(result.clone()) {
                    Ok(v) => v,
                    Err(_) => return Ok(()),
                };
                let mut payload = serde_json::json!({
                    "doc_id": document_id,
                    "text": normalized.text,
                });
                if let Ok(config) = serde_json::to_value(&p.chunking) {
                    if let (Some(obj), Some(extra)) = (payload.as_object_mut(), config.as_object())
                    {
                        for (k, v) in extra {
                            obj.insert(k.clone(), v.clone());
                        }
                    }
                }
                self.enqueue_stage("chunk", payload, document_id).await?;
            }
            "chunk" => {
                self.enqueue_stage(
                    "ner",
                    serde_json::json!({"doc_id": document_id}),
                    document_id,
                )
                .await?;
            }
            "ner" => {
                let chunks = p.core.chunks(document_id);
                let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
                let chunk_ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
                let payload = serde_json::json!({
                    "texts": texts,
                    "batch": true,
                    "chunk_ids": chunk_ids,
                    "doc_id": document_id,
                });
                match self.enqueue_stage_inner("embed", payload, document_id).await {
                    Ok(_) => {}
                    Err(DispatchError::Broker(e)) => return Err(RuntimeError::Broker(e)),
                    Err(refused) => {
                        // Degrade: keyword-searchable but un-embedded
                        warn!(
                            document = %document_id,
                            reason = %refused,
                            "embedding unavailable, marking document partial"
                        );
                        self.finish_document(document_id, DocumentStatus::Partial)
                            .await?;
                    }
                }
            }
            "embed" => {
                self.finish_document(document_id, DocumentStatus::Complete)
                    .await?;
            }
            _ => {
                // Extension-contributed stage; nothing for the core to do
            }
        }
        Ok(())
    }

    async fn finish_document(
        &self,
        document_id: &DocumentId,
        status: DocumentStatus,
    ) -> Result<(), RuntimeError> {
        let p = &self.params;

        if status == DocumentStatus::Complete && !self.all_mandatory_complete(document_id) {
            warn!(document = %document_id, "completion event without full mandatory record");
        }

        p.core
            .set_status(document_id, status, None, p.clock.epoch_ms())?;
        p.logger
            .append(document_id.as_str(), &format!("document {status}"));
        p.bus.publish(
            BusEvent::new(
                topics::DOCUMENT_PROCESSED,
                "coordinator",
                serde_json::json!({"document_id": document_id, "status": status.to_string()}),
            )
            .correlated(CorrelationId::new(document_id.to_string())),
        );
        self.completed_stages.lock().remove(document_id.as_str());
        Ok(())
    }

    async fn fail_document(
        &self,
        document_id: &DocumentId,
        reason: String,
    ) -> Result<(), RuntimeError> {
        let p = &self.params;
        p.core.set_status(
            document_id,
            DocumentStatus::Failed,
            Some(reason.clone()),
            p.clock.epoch_ms(),
        )?;
        p.logger
            .append(document_id.as_str(), &format!("document failed: {reason}"));
        p.bus.publish(
            BusEvent::new(
                topics::DOCUMENT_FAILED,
                "coordinator",
                serde_json::json!({"document_id": document_id, "reason": reason}),
            )
            .correlated(CorrelationId::new(document_id.to_string())),
        );
        self.completed_stages.lock().remove(document_id.as_str());
        Ok(())
    }

    async fn enqueue_stage(
        &self,
        stage: &str,
        payload: serde_json::Value,
        document_id: &DocumentId,
    ) -> Result<Job, RuntimeError> {
        match self.enqueue_stage_inner(stage, payload, document_id).await {
            Ok(job) => Ok(job),
            Err(DispatchError::Broker(e)) => Err(RuntimeError::Broker(e)),
            Err(refused) => {
                // Resource-class refusal at the dispatcher boundary
                self.fail_document(document_id, refused.to_string()).await?;
                Err(RuntimeError::Dispatch(refused.to_string()))
            }
        }
    }

    async fn enqueue_stage_inner(
        &self,
        stage: &str,
        payload: serde_json::Value,
        document_id: &DocumentId,
    ) -> Result<Job, DispatchError> {
        self.params
            .dispatcher
            .enqueue_stage(stage, payload, Some(document_id.to_string()))
            .await
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
