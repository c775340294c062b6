// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The extension contract and the capability set handed to extensions.

use crate::host::HostError;
use crate::manifest::ExtensionManifest;
use crate::routes::RouteDef;
use cf_bus::EventBus;
use cf_core::{Clock, Job};
use cf_pipeline::StageHandler;
use cf_runtime::{DispatchError, Dispatcher, HandlerRegistry, WorkerDirectory};
use cf_store::{MigrationRegistry, SchemaHandle};
use std::sync::Arc;

/// Enqueue capability independent of the dispatcher's clock type.
#[async_trait::async_trait]
pub trait JobSubmitter: Send + Sync {
    async fn submit(
        &self,
        pool: &str,
        payload: serde_json::Value,
        priority: i32,
        correlation_id: Option<String>,
    ) -> Result<Job, DispatchError>;
}

#[async_trait::async_trait]
impl<C: Clock + 'static> JobSubmitter for Dispatcher<C> {
    async fn submit(
        &self,
        pool: &str,
        payload: serde_json::Value,
        priority: i32,
        correlation_id: Option<String>,
    ) -> Result<Job, DispatchError> {
        self.enqueue_pool(pool, payload, priority, correlation_id)
            .await
    }
}

/// Capabilities handed to an extension at initialization.
///
/// The store handle is restricted to the extension's own schema;
/// cross-schema reads go through typed interfaces other extensions
/// choose to expose.
#[derive(Clone)]
pub struct ExtensionContext {
    pub bus: EventBus,
    pub store: SchemaHandle,
    pub submitter: Arc<dyn JobSubmitter>,
    pub directory: Arc<WorkerDirectory>,
    pub registry: Arc<HandlerRegistry>,
}

impl ExtensionContext {
    /// Register a handler for a pool this extension contributed.
    pub fn register_handler(&self, pool: &str, handler: Arc<dyn StageHandler>) {
        self.registry.register(pool, handler);
    }
}

/// A modular analytic unit.
#[async_trait::async_trait]
pub trait Extension: Send + Sync {
    fn manifest(&self) -> ExtensionManifest;

    /// Target version of the extension's schema.
    fn schema_version(&self) -> u32 {
        1
    }

    /// Migrations for the extension's own schema; the host applies them
    /// before `initialize`. The core does not order migrations across
    /// extensions, so register dependents after their dependencies.
    fn migrations(&self) -> MigrationRegistry {
        MigrationRegistry::new()
    }

    /// Called once per host lifetime; must be idempotent.
    async fn initialize(&self, ctx: &ExtensionContext) -> Result<(), HostError>;

    /// Declarative route table, mounted under `/api/<api_prefix>`.
    fn routes(&self) -> Vec<RouteDef> {
        Vec::new()
    }

    /// Called at shutdown after subscribers have quiesced.
    async fn shutdown(&self) {}
}
