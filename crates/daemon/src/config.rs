// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TOML daemon configuration: pools, engines, chunking.

use cf_core::{parse_duration, PoolDef, ResourceTier};
use cf_pipeline::ChunkConfig;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid duration for pool {pool}: {reason}")]
    Duration { pool: String, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolEntry {
    pub resource_tier: ResourceTier,
    #[serde(default = "default_concurrency")]
    pub max_concurrency: u32,
    /// Duration string, e.g. "120s"
    #[serde(default = "default_timeout")]
    pub job_timeout: String,
    /// In-process workers the daemon starts for this pool
    #[serde(default = "default_workers")]
    pub workers: u32,
}

fn default_concurrency() -> u32 {
    1
}

fn default_timeout() -> String {
    "300s".into()
}

fn default_workers() -> u32 {
    1
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OcrEngines {
    /// Fast bounding-box engine endpoint; absent = unregistered
    pub fast_endpoint: Option<String>,
    /// Heavy vision-LM engine endpoint; absent = unregistered
    pub heavy_endpoint: Option<String>,
    #[serde(default = "default_ocr_threshold")]
    pub confidence_threshold: f32,
}

fn default_ocr_threshold() -> f32 {
    0.6
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbedEngine {
    /// HTTP encoder endpoint; absent = deterministic hash encoder
    pub endpoint: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_model() -> String {
    "feature-hash-v1".into()
}

fn default_dimensions() -> usize {
    384
}

fn default_collection() -> String {
    "chunks".into()
}

impl Default for EmbedEngine {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: default_model(),
            dimensions: default_dimensions(),
            collection: default_collection(),
        }
    }
}

/// Daemon configuration file shape.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub pools: BTreeMap<String, PoolEntry>,
    #[serde(default)]
    pub ocr: OcrEngines,
    #[serde(default)]
    pub embed: EmbedEngine,
    #[serde(default)]
    pub chunking: ChunkConfig,
}

impl DaemonConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// The standard pool set when no config file declares any.
    pub fn with_default_pools(mut self) -> Self {
        if self.pools.is_empty() {
            for pool in cf_core::pool::default_pools() {
                self.pools.insert(
                    pool.name.clone(),
                    PoolEntry {
                        resource_tier: pool.resource_tier,
                        max_concurrency: pool.max_concurrency,
                        job_timeout: format!("{}s", pool.job_timeout.as_secs()),
                        workers: 1,
                    },
                );
            }
        }
        self
    }

    /// Resolve pool entries into declarations.
    pub fn pool_defs(&self) -> Result<Vec<(PoolDef, u32)>, ConfigError> {
        let mut defs = Vec::new();
        for (name, entry) in &self.pools {
            let timeout = parse_duration(&entry.job_timeout).map_err(|reason| {
                ConfigError::Duration {
                    pool: name.clone(),
                    reason,
                }
            })?;
            defs.push((
                PoolDef::new(name.clone(), entry.resource_tier)
                    .max_concurrency(entry.max_concurrency)
                    .job_timeout(timeout),
                entry.workers,
            ));
        }
        Ok(defs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
