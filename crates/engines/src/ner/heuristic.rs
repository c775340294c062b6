// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pattern-based NER model.
//!
//! The built-in fallback when no learned model is registered: dates and
//! money by pattern, proper-noun runs classified by local context.
//! Exposes no confidence scores; the stage derives them.

use super::{NerModel, RawMention};
use crate::error::EngineError;
use async_trait::async_trait;
use regex::Regex;

/// Words that start sentences without naming anything.
const STOPWORDS: &[&str] = &[
    "The", "A", "An", "This", "That", "These", "Those", "On", "In", "At", "By", "It", "He", "She",
    "They", "We", "You", "I", "But", "And", "Or", "If", "When", "While", "After", "Before",
];

/// Prepositions that mark the following proper noun as a place.
const PLACE_CUES: &[&str] = &["in", "at", "near", "from", "to", "toward", "towards"];

const ORG_SUFFIXES: &[&str] = &[
    "Inc", "Inc.", "Corp", "Corp.", "Ltd", "Ltd.", "LLC", "Co", "Co.", "Group", "Bank",
    "University", "Institute", "Agency", "Ministry", "Department",
];

pub struct HeuristicNer {
    proper_run: Regex,
    iso_date: Regex,
    written_date: Regex,
    money: Regex,
}

impl HeuristicNer {
    // Patterns are fixed strings; construction cannot fail
    #[allow(clippy::unwrap_used)]
    pub fn new() -> Self {
        Self {
            proper_run: Regex::new(r"\b[A-Z][a-z]+(?:[ \t][A-Z][a-z]+)*\b").unwrap(),
            iso_date: Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").unwrap(),
            written_date: Regex::new(
                r"\b(?:January|February|March|April|May|June|July|August|September|October|November|December)[ \t]\d{1,2},?[ \t]\d{4}\b",
            )
            .unwrap(),
            money: Regex::new(r"[$€£]\d[\d,]*(?:\.\d+)?").unwrap(),
        }
    }

    /// The word immediately before byte offset `start`, if any.
    fn preceding_word(text: &str, start: usize) -> Option<&str> {
        text[..start].split_whitespace().next_back()
    }

    fn classify(&self, text: &str, run: &str, start: usize) -> Option<&'static str> {
        if run.split_whitespace().count() == 1 && STOPWORDS.contains(&run) {
            return None;
        }
        let last_word = run.split_whitespace().next_back().unwrap_or(run);
        if ORG_SUFFIXES.contains(&last_word) {
            return Some("ORG");
        }
        if let Some(prev) = Self::preceding_word(text, start) {
            let prev = prev.trim_matches(|c: char| !c.is_alphanumeric());
            if PLACE_CUES.contains(&prev.to_lowercase().as_str()) {
                return Some("GPE");
            }
        }
        Some("PERSON")
    }
}

impl Default for HeuristicNer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NerModel for HeuristicNer {
    fn name(&self) -> &str {
        "heuristic-ner-v1"
    }

    async fn extract(&self, text: &str) -> Result<Vec<RawMention>, EngineError> {
        let mut mentions = Vec::new();
        let mut claimed = vec![false; text.len()];

        let mut claim = |start: usize, end: usize| {
            let overlaps = claimed[start..end].iter().any(|c| *c);
            if !overlaps {
                for slot in &mut claimed[start..end] {
                    *slot = true;
                }
            }
            !overlaps
        };

        for regex in [&self.iso_date, &self.written_date] {
            for m in regex.find_iter(text) {
                if claim(m.start(), m.end()) {
                    mentions.push(RawMention {
                        text: m.as_str().to_string(),
                        label: "DATE".to_string(),
                        start_char: m.start(),
                        end_char: m.end(),
                        confidence: None,
                    });
                }
            }
        }

        for m in self.money.find_iter(text) {
            if claim(m.start(), m.end()) {
                mentions.push(RawMention {
                    text: m.as_str().to_string(),
                    label: "MONEY".to_string(),
                    start_char: m.start(),
                    end_char: m.end(),
                    confidence: None,
                });
            }
        }

        for m in self.proper_run.find_iter(text) {
            let Some(label) = self.classify(text, m.as_str(), m.start()) else {
                continue;
            };
            if claim(m.start(), m.end()) {
                mentions.push(RawMention {
                    text: m.as_str().to_string(),
                    label: label.to_string(),
                    start_char: m.start(),
                    end_char: m.end(),
                    confidence: None,
                });
            }
        }

        mentions.sort_by_key(|m| m.start_char);
        Ok(mentions)
    }
}

#[cfg(test)]
#[path = "heuristic_tests.rs"]
mod tests;
