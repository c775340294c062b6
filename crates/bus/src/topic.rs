// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Glob matching for dotted topic names.
//!
//! `*` matches exactly one segment; `**` (final segment only) matches any
//! remaining suffix. `shard.*.created` matches `shard.claims.created` but
//! not `shard.created`.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TopicPatternError {
    #[error("empty topic pattern")]
    Empty,
    #[error("'**' is only allowed as the final segment: {0}")]
    RestNotLast(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Any,
    Rest,
}

/// A parsed subscription pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPattern {
    segments: Vec<Segment>,
    raw: String,
}

impl TopicPattern {
    pub fn parse(pattern: &str) -> Result<Self, TopicPatternError> {
        if pattern.is_empty() {
            return Err(TopicPatternError::Empty);
        }
        let parts: Vec<&str> = pattern.split('.').collect();
        let mut segments = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let segment = match *part {
                "**" => {
                    if i + 1 != parts.len() {
                        return Err(TopicPatternError::RestNotLast(pattern.to_string()));
                    }
                    Segment::Rest
                }
                "*" => Segment::Any,
                literal => Segment::Literal(literal.to_string()),
            };
            segments.push(segment);
        }
        Ok(Self {
            segments,
            raw: pattern.to_string(),
        })
    }

    pub fn matches(&self, topic: &str) -> bool {
        let topic_segments: Vec<&str> = topic.split('.').collect();
        let mut ti = 0;
        for segment in &self.segments {
            match segment {
                Segment::Rest => return ti < topic_segments.len(),
                Segment::Any => {
                    if ti >= topic_segments.len() {
                        return false;
                    }
                    ti += 1;
                }
                Segment::Literal(lit) => {
                    if topic_segments.get(ti) != Some(&lit.as_str()) {
                        return false;
                    }
                    ti += 1;
                }
            }
        }
        ti == topic_segments.len()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

#[cfg(test)]
#[path = "topic_tests.rs"]
mod tests;
