// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool declarations: named worker classes with homogeneous resources.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Resource class a pool's workers must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceTier {
    #[serde(rename = "cpu-light")]
    CpuLight,
    #[serde(rename = "cpu-ner")]
    CpuNer,
    #[serde(rename = "cpu-extract")]
    CpuExtract,
    #[serde(rename = "gpu-embed")]
    GpuEmbed,
    #[serde(rename = "gpu-paddle")]
    GpuPaddle,
    #[serde(rename = "gpu-qwen")]
    GpuQwen,
}

impl ResourceTier {
    /// GPU tiers are reserved for workers with accelerator access; the
    /// dispatcher refuses to cross-place CPU work onto them or vice versa.
    pub fn is_gpu(&self) -> bool {
        matches!(
            self,
            ResourceTier::GpuEmbed | ResourceTier::GpuPaddle | ResourceTier::GpuQwen
        )
    }
}

impl fmt::Display for ResourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceTier::CpuLight => "cpu-light",
            ResourceTier::CpuNer => "cpu-ner",
            ResourceTier::CpuExtract => "cpu-extract",
            ResourceTier::GpuEmbed => "gpu-embed",
            ResourceTier::GpuPaddle => "gpu-paddle",
            ResourceTier::GpuQwen => "gpu-qwen",
        };
        write!(f, "{s}")
    }
}

/// Declarative description of a worker pool.
///
/// A pool has one queue; multiple workers drain it up to `max_concurrency`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolDef {
    pub name: String,
    pub resource_tier: ResourceTier,
    pub max_concurrency: u32,
    /// Per-job wall-clock budget; exceeding it cancels the handler
    #[serde(with = "duration_ms")]
    pub job_timeout: Duration,
}

impl PoolDef {
    pub fn new(name: impl Into<String>, tier: ResourceTier) -> Self {
        Self {
            name: name.into(),
            resource_tier: tier,
            max_concurrency: 1,
            job_timeout: Duration::from_secs(300),
        }
    }

    pub fn max_concurrency(mut self, n: u32) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    pub fn job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }
}

/// The default pool set for the document pipeline.
pub fn default_pools() -> Vec<PoolDef> {
    vec![
        PoolDef::new("extract", ResourceTier::CpuExtract)
            .max_concurrency(4)
            .job_timeout(Duration::from_secs(120)),
        PoolDef::new("normalize", ResourceTier::CpuLight)
            .max_concurrency(8)
            .job_timeout(Duration::from_secs(30)),
        PoolDef::new("ner", ResourceTier::CpuNer)
            .max_concurrency(2)
            .job_timeout(Duration::from_secs(120)),
        PoolDef::new("chunk", ResourceTier::CpuLight)
            .max_concurrency(8)
            .job_timeout(Duration::from_secs(30)),
        PoolDef::new("embed", ResourceTier::GpuEmbed)
            .max_concurrency(2)
            .job_timeout(Duration::from_secs(300)),
        PoolDef::new("ocr", ResourceTier::GpuPaddle)
            .max_concurrency(1)
            .job_timeout(Duration::from_secs(600)),
    ]
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        duration.as_millis().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
