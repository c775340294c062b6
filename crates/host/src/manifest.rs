// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Extension manifests.

use cf_core::PoolDef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What an extension declares to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionManifest {
    pub name: String,
    pub version: String,
    /// Routes mount under `/api/<api_prefix>/...`
    pub api_prefix: String,
    /// Storage schema this extension owns; no other schema is reachable
    pub schema_name: String,
    /// Topic patterns this extension subscribes to
    #[serde(default)]
    pub subscriptions: Vec<String>,
    /// Event types this extension publishes
    #[serde(default)]
    pub publishes: Vec<String>,
    /// Worker pools this extension contributes
    #[serde(default)]
    pub pools: Vec<PoolDef>,
    /// Free-form metadata for anything richer
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ExtensionManifest {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            api_prefix: name.clone(),
            schema_name: name.clone(),
            name,
            version: version.into(),
            subscriptions: Vec::new(),
            publishes: Vec::new(),
            pools: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    pub fn schema_name(mut self, schema: impl Into<String>) -> Self {
        self.schema_name = schema.into();
        self
    }

    pub fn subscribes(mut self, pattern: impl Into<String>) -> Self {
        self.subscriptions.push(pattern.into());
        self
    }

    pub fn publishes(mut self, topic: impl Into<String>) -> Self {
        self.publishes.push(topic.into());
        self
    }

    pub fn pool(mut self, pool: PoolDef) -> Self {
        self.pools.push(pool);
        self
    }
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
