// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test builders and proptest strategies for other crates' tests.

use crate::document::{Document, DocumentId};
use crate::job::{Job, JobConfig, JobId};

/// A pending job in the given pool with an empty payload.
pub fn test_job(id: &str, pool: &str) -> Job {
    Job::new(
        JobConfig::new(JobId::new(id), pool, serde_json::json!({})),
        1_000_000,
    )
}

/// A pending document with a hash derived from the id.
pub fn test_document(id: &str) -> Document {
    Document::new(
        DocumentId::new(id),
        format!("hash-{id}"),
        format!("/data/{id}.pdf"),
        1_000_000,
    )
}

#[cfg(feature = "test-support")]
pub mod strategies {
    use proptest::prelude::*;

    /// Dotted topic strings with 1..=4 segments.
    pub fn topic() -> impl Strategy<Value = String> {
        proptest::collection::vec("[a-z][a-z0-9_]{0,8}", 1..=4).prop_map(|segs| segs.join("."))
    }

    /// Priorities across the full range callers actually use.
    pub fn priority() -> impl Strategy<Value = i32> {
        -100..=100i32
    }
}
