// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed identifiers and id generation.
//!
//! Every core entity id is a prefixed string (`doc-…`, `job-…`, `ev-…`)
//! so ids stay recognizable across the broker journal, the session log,
//! and the activity logs. `define_id!` builds the newtype; `generate`
//! mints a fresh id from an [`IdGen`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Define a prefixed newtype ID wrapper around `String`.
///
/// Generates `new()` (wraps an existing id verbatim), `generate()`
/// (mints `<prefix>-<suffix>` from an [`IdGen`]), `as_str()`, `short()`,
/// `Display`, `From<String>`, `From<&str>`, and `PartialEq<str>`.
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident, prefix $prefix:literal;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Prefix carried by generated ids of this type.
            pub const PREFIX: &'static str = $prefix;

            /// Wrap an existing identifier verbatim.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Mint a fresh `<prefix>-<suffix>` id.
            pub fn generate(id_gen: &impl $crate::id::IdGen) -> Self {
                Self(format!(concat!($prefix, "-{}"), id_gen.next()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Truncated to at most `n` characters, for log lines.
            pub fn short(&self, n: usize) -> &str {
                if self.0.len() <= n {
                    &self.0
                } else {
                    &self.0[..n]
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

/// Source of id suffixes.
pub trait IdGen: Send + Sync {
    fn next(&self) -> String;
}

/// UUID v4 suffixes for jobs and workers, where global uniqueness
/// matters more than brevity.
#[derive(Clone, Copy, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Short nanoid suffixes for high-volume, log-friendly ids (event
/// envelopes).
#[derive(Clone, Copy, Default)]
pub struct ShortIdGen;

impl IdGen for ShortIdGen {
    fn next(&self) -> String {
        nanoid::nanoid!(10)
    }
}

/// Sequential suffixes for deterministic tests.
#[derive(Clone)]
pub struct SequentialIdGen {
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new() -> Self {
        Self {
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> String {
        self.counter.fetch_add(1, Ordering::SeqCst).to_string()
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
