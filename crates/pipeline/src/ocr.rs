// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OCR stage with fast-engine / heavy-engine fallback.
//!
//! The fast engine runs first; escalation to the heavy engine triggers
//! when aggregate confidence, output length, or character quality fail.
//! Escalation is recorded on the result and in the event log.

use crate::stage::{StageContext, StageError, StageHandler};
use cf_core::{payload, topics, BusEvent, CorrelationId, OcrPayload, OcrResult};
use cf_engines::{LazyEngine, OcrEngine, OcrOutput, OcrRequest};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Quality gates that decide escalation.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Escalate below this aggregate confidence
    pub confidence_threshold: f32,
    /// Escalate when the recognized text is shorter than this
    pub min_text_length: usize,
    /// Escalate when the alphanumeric share of the text falls below this
    pub min_alnum_ratio: f32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            min_text_length: 20,
            min_alnum_ratio: 0.4,
        }
    }
}

impl OcrConfig {
    /// An empty page passes: "no text on the page" is a result, not a
    /// quality failure.
    fn accepts(&self, output: &OcrOutput) -> bool {
        let text = output.text.trim();
        if text.is_empty() {
            return output.confidence >= self.confidence_threshold;
        }
        if output.confidence < self.confidence_threshold {
            return false;
        }
        if text.len() < self.min_text_length {
            return false;
        }
        let alnum = text.chars().filter(|c| c.is_alphanumeric()).count();
        let visible = text.chars().filter(|c| !c.is_whitespace()).count().max(1);
        alnum as f32 / visible as f32 >= self.min_alnum_ratio
    }
}

pub struct OcrStage {
    fast: Option<LazyEngine<dyn OcrEngine>>,
    heavy: Option<LazyEngine<dyn OcrEngine>>,
    config: OcrConfig,
}

impl OcrStage {
    pub fn new(
        fast: Option<LazyEngine<dyn OcrEngine>>,
        heavy: Option<LazyEngine<dyn OcrEngine>>,
        config: OcrConfig,
    ) -> Self {
        Self { fast, heavy, config }
    }

    async fn run_engine(
        lazy: &LazyEngine<dyn OcrEngine>,
        request: &OcrRequest,
        cancel: &CancellationToken,
    ) -> Result<(String, OcrOutput), StageError> {
        let engine = lazy
            .get()
            .map_err(|e| StageError::Resource(e.to_string()))?;
        let output = tokio::select! {
            result = engine.recognize(request) => {
                result.map_err(|e| StageError::Transient(e.to_string()))?
            }
            _ = cancel.cancelled() => return Err(StageError::Cancelled),
        };
        Ok((engine.name().to_string(), output))
    }
}

#[async_trait::async_trait]
impl StageHandler for OcrStage {
    fn stage(&self) -> &'static str {
        "ocr"
    }

    async fn handle(
        &self,
        raw: &serde_json::Value,
        ctx: &StageContext,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, StageError> {
        let request: OcrPayload = payload::decode(raw)?;
        if request.image_path.is_none() && request.image_base64.is_none() {
            return Err(StageError::Failed(
                "ocr payload carries neither image_path nor image_base64".into(),
            ));
        }
        let correlation = request
            .document_id
            .clone()
            .map(CorrelationId::new);

        let engine_request = OcrRequest {
            image_path: request
                .image_path
                .as_ref()
                .map(|p| crate::stage::resolve_path(&ctx.data_root, p))
                .transpose()?
                .map(|p| p.display().to_string()),
            image_base64: request.image_base64.clone(),
            lang: request.lang.clone(),
            use_angle_cls: request.use_angle_cls,
        };

        // Fast engine first
        let fast_attempt = match &self.fast {
            Some(lazy) => match Self::run_engine(lazy, &engine_request, cancel).await {
                Ok((name, output)) => {
                    let mut event = BusEvent::new(
                        topics::OCR_ATTEMPTED,
                        "stage.ocr",
                        serde_json::json!({
                            "engine": name,
                            "confidence": output.confidence,
                            "chars": output.text.len(),
                        }),
                    );
                    if let Some(c) = &correlation {
                        event = event.correlated(c.clone());
                    }
                    ctx.bus.publish(event);
                    Some(output)
                }
                Err(StageError::Cancelled) => return Err(StageError::Cancelled),
                Err(e) => {
                    warn!(error = %e, "fast ocr engine failed");
                    None
                }
            },
            None => None,
        };

        if let Some(output) = &fast_attempt {
            if self.config.accepts(output) {
                let result = OcrResult {
                    text: output.text.clone(),
                    lines: output.lines.clone(),
                    confidence: output.confidence,
                    escalated: false,
                };
                return Ok(payload::encode(&result)?);
            }
        }

        // Escalate to the heavy engine
        if let Some(lazy) = &self.heavy {
            match Self::run_engine(lazy, &engine_request, cancel).await {
                Ok((name, output)) => {
                    info!(
                        engine = %name,
                        fast_confidence = fast_attempt.as_ref().map(|o| o.confidence),
                        "ocr escalated"
                    );
                    let mut event = BusEvent::new(
                        topics::OCR_ESCALATED,
                        "stage.ocr",
                        serde_json::json!({
                            "engine": name,
                            "fast_confidence": fast_attempt.as_ref().map(|o| o.confidence),
                            "confidence": output.confidence,
                        }),
                    );
                    if let Some(c) = &correlation {
                        event = event.correlated(c.clone());
                    }
                    ctx.bus.publish(event);

                    let result = OcrResult {
                        text: output.text,
                        lines: output.lines,
                        confidence: output.confidence,
                        escalated: true,
                    };
                    return Ok(payload::encode(&result)?);
                }
                Err(StageError::Cancelled) => return Err(StageError::Cancelled),
                Err(e) => warn!(error = %e, "heavy ocr engine failed"),
            }
        }

        // Heavy engine missing or broken: a degraded fast result beats none
        if let Some(output) = fast_attempt {
            return Ok(payload::encode(&OcrResult {
                text: output.text,
                lines: output.lines,
                confidence: output.confidence,
                escalated: false,
            })?);
        }

        Err(StageError::Failed(
            "no ocr engine produced output (both failed or unregistered)".into(),
        ))
    }
}

#[cfg(test)]
#[path = "ocr_tests.rs"]
mod tests;
