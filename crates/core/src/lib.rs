// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cf-core: Core types for the Casefile document-intelligence runtime

pub mod chunk;
pub mod clock;
pub mod document;
pub mod entity;
pub mod error;
pub mod event;
pub mod id;
pub mod job;
pub mod payload;
pub mod pool;
pub mod time_fmt;
pub mod worker;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use chunk::{Chunk, ChunkId};
pub use clock::{Clock, FakeClock, SystemClock};
pub use document::{Document, DocumentId, DocumentMeta, DocumentStatus};
pub use entity::{CanonicalEntity, EntityLabel, EntityMention};
pub use error::ErrorClass;
pub use event::{topics, BusEvent, CorrelationId, EventId};
pub use id::{IdGen, SequentialIdGen, ShortIdGen, UuidIdGen};
pub use job::{Job, JobConfig, JobId, JobStatus, DEFAULT_MAX_WORKER_REQUEUES};
pub use payload::{
    EmbedPayload, EmbedResult, ExtractPayload, ExtractResult, NerPayload, NerResult, OcrLine,
    OcrPayload, OcrResult, PayloadError,
};
pub use pool::{PoolDef, ResourceTier};
pub use time_fmt::{format_utc_ms, parse_duration};
pub use worker::{WorkerId, WorkerRecord};
