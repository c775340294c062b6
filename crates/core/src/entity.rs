// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named-entity mentions and their canonical (deduplicated) forms.

use crate::chunk::ChunkId;
use crate::document::DocumentId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Standardized entity label set.
///
/// Model-specific tag schemes are folded into this table; unknown labels
/// map to `Misc` rather than failing the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityLabel {
    Person,
    Org,
    Location,
    Date,
    Time,
    Money,
    Percent,
    Event,
    Product,
    Misc,
}

impl EntityLabel {
    /// Map a raw model tag onto the standardized label set.
    pub fn standardize(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "PERSON" | "PER" => EntityLabel::Person,
            "ORG" | "ORGANIZATION" => EntityLabel::Org,
            "GPE" | "LOC" | "LOCATION" | "FAC" => EntityLabel::Location,
            "DATE" => EntityLabel::Date,
            "TIME" => EntityLabel::Time,
            "MONEY" | "CURRENCY" => EntityLabel::Money,
            "PERCENT" => EntityLabel::Percent,
            "EVENT" => EntityLabel::Event,
            "PRODUCT" | "WORK_OF_ART" => EntityLabel::Product,
            _ => EntityLabel::Misc,
        }
    }
}

impl fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityLabel::Person => "person",
            EntityLabel::Org => "org",
            EntityLabel::Location => "location",
            EntityLabel::Date => "date",
            EntityLabel::Time => "time",
            EntityLabel::Money => "money",
            EntityLabel::Percent => "percent",
            EntityLabel::Event => "event",
            EntityLabel::Product => "product",
            EntityLabel::Misc => "misc",
        };
        write!(f, "{s}")
    }
}

/// A single extraction from one chunk.
///
/// `confidence` is a heuristic ranking signal, not a calibrated
/// probability: models that expose no score get one derived from
/// capitalization and multi-word shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMention {
    pub document_id: DocumentId,
    pub chunk_id: ChunkId,
    pub text: String,
    pub label: EntityLabel,
    pub start_char: usize,
    pub end_char: usize,
    pub confidence: f32,
}

/// The merged representative of many mentions of the same real-world entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntity {
    pub id: String,
    pub text: String,
    pub label: EntityLabel,
    pub mention_count: u32,
}

impl CanonicalEntity {
    /// Canonical key for deduplication: case-folded text plus label.
    pub fn key(text: &str, label: EntityLabel) -> String {
        format!("{}:{}", label, text.trim().to_lowercase())
    }
}

#[cfg(test)]
#[path = "entity_tests.rs"]
mod tests;
