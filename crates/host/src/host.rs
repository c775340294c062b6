// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Extension host lifecycle.
//!
//! Extensions register with the host at startup; `initialize_all` opens
//! each one's schema (applying its migrations), registers its pools,
//! calls `initialize` exactly once, and mounts its routes. Shutdown runs
//! in reverse registration order after the bus quiesces.

use crate::extension::{Extension, ExtensionContext, JobSubmitter};
use crate::manifest::ExtensionManifest;
use crate::routes::Router;
use cf_bus::EventBus;
use cf_runtime::{HandlerRegistry, WorkerDirectory};
use cf_store::{ContentStore, StoreError};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("duplicate extension: {0}")]
    Duplicate(String),
    #[error("extension {name} failed to initialize: {reason}")]
    Init { name: String, reason: String },
}

struct Hosted {
    extension: Arc<dyn Extension>,
    manifest: ExtensionManifest,
    initialized: bool,
}

pub struct HostParams {
    pub store: ContentStore,
    pub bus: EventBus,
    pub submitter: Arc<dyn JobSubmitter>,
    pub directory: Arc<WorkerDirectory>,
    pub registry: Arc<HandlerRegistry>,
}

pub struct ExtensionHost {
    params: HostParams,
    hosted: Mutex<Vec<Hosted>>,
    router: Mutex<Router>,
}

impl ExtensionHost {
    pub fn new(params: HostParams) -> Self {
        Self {
            params,
            hosted: Mutex::new(Vec::new()),
            router: Mutex::new(Router::new()),
        }
    }

    /// Register a packaged extension. Initialization order is
    /// registration order.
    pub fn register(&self, extension: Arc<dyn Extension>) -> Result<(), HostError> {
        let manifest = extension.manifest();
        let mut hosted = self.hosted.lock();
        if hosted.iter().any(|h| h.manifest.name == manifest.name) {
            return Err(HostError::Duplicate(manifest.name));
        }
        hosted.push(Hosted {
            extension,
            manifest,
            initialized: false,
        });
        Ok(())
    }

    pub fn manifests(&self) -> Vec<ExtensionManifest> {
        self.hosted.lock().iter().map(|h| h.manifest.clone()).collect()
    }

    /// Initialize every registered extension that is not yet initialized.
    /// Safe to call more than once.
    pub async fn initialize_all(&self) -> Result<(), HostError> {
        let pending: Vec<(Arc<dyn Extension>, ExtensionManifest)> = {
            let hosted = self.hosted.lock();
            hosted
                .iter()
                .filter(|h| !h.initialized)
                .map(|h| (Arc::clone(&h.extension), h.manifest.clone()))
                .collect()
        };

        let mut done: HashSet<String> = HashSet::new();
        for (extension, manifest) in pending {
            let schema = self.params.store.schema_versioned(
                &manifest.schema_name,
                extension.schema_version(),
                &extension.migrations(),
            )?;

            for pool in &manifest.pools {
                self.params.directory.register_pool(pool.clone());
            }

            let ctx = ExtensionContext {
                bus: self.params.bus.clone(),
                store: schema,
                submitter: Arc::clone(&self.params.submitter),
                directory: Arc::clone(&self.params.directory),
                registry: Arc::clone(&self.params.registry),
            };
            extension.initialize(&ctx).await?;

            self.router
                .lock()
                .mount(&format!("/api/{}", manifest.api_prefix), extension.routes());

            info!(
                extension = %manifest.name,
                version = %manifest.version,
                schema = %manifest.schema_name,
                "extension initialized"
            );
            done.insert(manifest.name);
        }

        let mut hosted = self.hosted.lock();
        for h in hosted.iter_mut() {
            if done.contains(&h.manifest.name) {
                h.initialized = true;
            }
        }
        Ok(())
    }

    /// Route an API request across every mounted extension table.
    pub async fn dispatch(&self, request: crate::routes::ApiRequest) -> crate::routes::ApiResponse {
        // Snapshot the table so no lock is held across the handler await
        let router = self.router.lock().clone();
        router.dispatch(request).await
    }

    /// Shut down extensions in reverse registration order after closing
    /// the bus so their subscriptions drain.
    pub async fn shutdown_all(&self) {
        self.params.bus.close();
        let extensions: Vec<Arc<dyn Extension>> = {
            let hosted = self.hosted.lock();
            hosted.iter().rev().map(|h| Arc::clone(&h.extension)).collect()
        };
        for extension in extensions {
            extension.shutdown().await;
        }
    }

    /// Mount a route table outside any extension (the core's own routes).
    pub fn mount_core_routes(&self, prefix: &str, routes: Vec<crate::routes::RouteDef>) {
        self.router.lock().mount(prefix, routes);
    }
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
