// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Normalize stage: whitespace and unicode cleanup, language guess,
//! quality score, word count. Pure CPU; normalization is idempotent.

use crate::stage::{StageContext, StageError, StageHandler};
use cf_core::payload;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizePayload {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeResult {
    pub text: String,
    pub language: String,
    /// 0–1, a coarse signal of how text-like the input is
    pub quality: f32,
    pub word_count: usize,
}

const EN_STOPWORDS: &[&str] = &["the", "and", "of", "to", "in", "is", "was", "that", "for", "on"];
const ES_STOPWORDS: &[&str] = &["el", "la", "de", "que", "y", "en", "los", "del", "las", "por"];
const FR_STOPWORDS: &[&str] = &["le", "la", "de", "et", "les", "des", "est", "dans", "que", "pour"];
const DE_STOPWORDS: &[&str] = &["der", "die", "und", "das", "ist", "von", "den", "mit", "für", "auf"];

/// Normalize whitespace and common unicode lookalikes.
///
/// Form feeds survive as page markers. `normalize_text` is a fixpoint:
/// applying it twice equals applying it once.
pub fn normalize_text(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' => folded.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' => folded.push('"'),
            '\u{2013}' | '\u{2014}' | '\u{2212}' => folded.push('-'),
            '\u{00A0}' | '\u{2009}' | '\u{200A}' | '\u{2002}' | '\u{2003}' => folded.push(' '),
            '\u{FB01}' => folded.push_str("fi"),
            '\u{FB02}' => folded.push_str("fl"),
            '\u{FEFF}' | '\u{200B}' => {}
            '\r' => {}
            c if c.is_control() && c != '\n' && c != '\t' && c != '\u{c}' => {}
            c => folded.push(c),
        }
    }

    // Collapse runs of spaces/tabs; preserve newline structure up to
    // double blank lines
    let mut out = String::with_capacity(folded.len());
    let mut pending_newlines = 0usize;
    let mut pending_space = false;
    let mut pending_page_break = false;
    for c in folded.chars() {
        match c {
            '\n' => pending_newlines += 1,
            '\u{c}' => pending_page_break = true,
            ' ' | '\t' => pending_space = true,
            c => {
                if pending_page_break {
                    if !out.is_empty() {
                        out.push('\u{c}');
                    }
                } else if pending_newlines > 0 {
                    if !out.is_empty() {
                        out.push_str(if pending_newlines == 1 { "\n" } else { "\n\n" });
                    }
                } else if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_newlines = 0;
                pending_space = false;
                pending_page_break = false;
                out.push(c);
            }
        }
    }
    out
}

fn detect_language(text: &str) -> String {
    let words: Vec<String> = text
        .split_whitespace()
        .take(500)
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .collect();
    if words.is_empty() {
        return "und".to_string();
    }

    let score = |stopwords: &[&str]| -> usize {
        words
            .iter()
            .filter(|w| stopwords.contains(&w.as_str()))
            .count()
    };
    let candidates = [
        ("en", score(EN_STOPWORDS)),
        ("es", score(ES_STOPWORDS)),
        ("fr", score(FR_STOPWORDS)),
        ("de", score(DE_STOPWORDS)),
    ];
    let best = candidates.iter().max_by_key(|(_, n)| *n).map(|(lang, n)| (*lang, *n));
    match best {
        Some((lang, n)) if n > 0 => lang.to_string(),
        _ => "und".to_string(),
    }
}

fn quality_score(text: &str) -> f32 {
    if text.is_empty() {
        return 0.0;
    }
    let total = text.chars().count() as f32;
    let alpha = text.chars().filter(|c| c.is_alphabetic()).count() as f32;
    let spaces = text.chars().filter(|c| c.is_whitespace()).count() as f32;

    let alpha_ratio = alpha / total;
    // Natural text runs ~10–25% whitespace; score distance from that band
    let space_ratio = spaces / total;
    let space_score = if (0.05..=0.35).contains(&space_ratio) {
        1.0
    } else {
        0.5
    };
    (0.7 * alpha_ratio / 0.75 + 0.3 * space_score).clamp(0.0, 1.0)
}

pub struct NormalizeStage;

#[async_trait::async_trait]
impl StageHandler for NormalizeStage {
    fn stage(&self) -> &'static str {
        "normalize"
    }

    async fn handle(
        &self,
        raw: &serde_json::Value,
        _ctx: &StageContext,
        _cancel: &CancellationToken,
    ) -> Result<serde_json::Value, StageError> {
        let request: NormalizePayload = payload::decode(raw)?;
        let text = normalize_text(&request.text);
        let result = NormalizeResult {
            language: detect_language(&text),
            quality: quality_score(&text),
            word_count: text.split_whitespace().count(),
            text,
        };
        Ok(payload::encode(&result)?)
    }
}

#[cfg(test)]
#[path = "normalize_tests.rs"]
mod tests;
