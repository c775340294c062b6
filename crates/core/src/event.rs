// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event envelope and topic taxonomy for the session event bus.

use crate::id::ShortIdGen;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for an event envelope.
    pub struct EventId, prefix "ev";
}

crate::define_id! {
    /// Correlates the events of one logical flow (usually a document run).
    pub struct CorrelationId, prefix "corr";
}

/// Well-known topic names and constructors.
///
/// Topics are dotted strings; extensions publish under
/// `<extension>.<noun>.<verb>`.
pub mod topics {
    pub const DOCUMENT_INGESTED: &str = "document.ingested";
    pub const DOCUMENT_OCR_REQUIRED: &str = "document.ocr_required";
    pub const DOCUMENT_PROCESSED: &str = "document.processed";
    pub const DOCUMENT_FAILED: &str = "document.failed";
    pub const OCR_ATTEMPTED: &str = "ocr.attempted";
    pub const OCR_ESCALATED: &str = "ocr.escalated";
    pub const JOB_DEAD: &str = "job.dead";

    /// Topic emitted when a pipeline stage finishes for a document.
    pub fn stage_completed(stage: &str) -> String {
        format!("stage.{stage}.completed")
    }
}

/// An event published on the session bus.
///
/// `sequence` is monotonic per `source`; ordering is guaranteed per source
/// but not across sources. The session log is truncated on core startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusEvent {
    pub id: EventId,
    pub topic: String,
    pub source: String,
    pub payload: serde_json::Value,
    pub epoch_ms: u64,
    pub sequence: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
}

impl BusEvent {
    pub fn new(
        topic: impl Into<String>,
        source: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: EventId::generate(&ShortIdGen),
            topic: topic.into(),
            source: source.into(),
            payload,
            epoch_ms: 0,
            sequence: 0,
            correlation_id: None,
        }
    }

    pub fn correlated(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// One-line summary for activity logs.
    pub fn log_summary(&self) -> String {
        match &self.correlation_id {
            Some(c) => format!(
                "{} src={} seq={} corr={}",
                self.topic,
                self.source,
                self.sequence,
                c.short(12)
            ),
            None => format!("{} src={} seq={}", self.topic, self.source, self.sequence),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
