// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Extract stage: raw text, page count, and forensic metadata.
//!
//! PDFs with embedded text are extracted directly; image files and
//! image-only PDFs defer to OCR via a `document.ocr_required` event.

use crate::pdf;
use crate::stage::{resolve_path, StageContext, StageError, StageHandler};
use cf_core::{
    payload, topics, BusEvent, CorrelationId, DocumentId, DocumentMeta, DocumentStatus,
    ExtractPayload, ExtractResult,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "webp", "gif"];

pub struct ExtractStage;

impl ExtractStage {
    fn is_image(path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false)
    }
}

#[async_trait::async_trait]
impl StageHandler for ExtractStage {
    fn stage(&self) -> &'static str {
        "extract"
    }

    async fn handle(
        &self,
        raw: &serde_json::Value,
        ctx: &StageContext,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, StageError> {
        let request: ExtractPayload = payload::decode(raw)?;
        let path = resolve_path(&ctx.data_root, &request.file_path)?;

        let bytes = tokio::select! {
            read = tokio::fs::read(&path) => {
                read.map_err(|e| StageError::Transient(format!("read {}: {e}", path.display())))?
            }
            _ = cancel.cancelled() => return Err(StageError::Cancelled),
        };
        let size_bytes = bytes.len() as u64;

        let result = if pdf::is_pdf(&bytes) {
            let scan = pdf::scan(&bytes);
            let text = scan.text.trim().to_string();
            ExtractResult {
                ocr_required: text.is_empty(),
                pages: scan.pages.max(1),
                metadata: scan.metadata(size_bytes),
                text,
            }
        } else if Self::is_image(&path) || std::str::from_utf8(&bytes).is_err() {
            ExtractResult {
                text: String::new(),
                pages: 1,
                metadata: DocumentMeta {
                    size_bytes,
                    ..DocumentMeta::default()
                },
                ocr_required: true,
            }
        } else {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            let pages = text.matches('\u{c}').count() as u32 + 1;
            ExtractResult {
                text,
                pages,
                metadata: DocumentMeta {
                    size_bytes,
                    ..DocumentMeta::default()
                },
                ocr_required: false,
            }
        };

        if let Some(doc_id) = &request.document_id {
            let id = DocumentId::new(doc_id.clone());
            let pages = result.pages;
            let metadata = result.metadata.clone();
            ctx.core.update_document(&id, |doc| {
                doc.status = DocumentStatus::Processing;
                doc.num_pages = pages;
                doc.metadata = metadata;
            })?;

            if result.ocr_required {
                info!(document_id = doc_id, "no embedded text, deferring to ocr");
                ctx.bus.publish(
                    BusEvent::new(
                        topics::DOCUMENT_OCR_REQUIRED,
                        "stage.extract",
                        serde_json::json!({
                            "document_id": doc_id,
                            "file_path": request.file_path,
                        }),
                    )
                    .correlated(CorrelationId::new(doc_id.clone())),
                );
            }
        }

        Ok(payload::encode(&result)?)
    }
}

#[cfg(test)]
#[path = "extract_tests.rs"]
mod tests;
