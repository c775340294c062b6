// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The core's own API surface: thin wrappers over component methods.
//!
//! Long-running operations return a `job_id`; clients poll
//! `/api/jobs/{id}` against the record ledger.

use crate::lifecycle::Daemon;
use cf_core::{DocumentId, JobId};
use cf_host::{route_fn, ApiResponse, Method, RouteDef};
use cf_runtime::IngestOutcome;
use cf_store::MigrationRegistry;
use std::sync::Arc;

/// Current version of the core schema. Migrations registered here run on
/// startup before anything touches the store.
pub const CORE_SCHEMA_VERSION: u32 = 1;

pub fn core_migrations() -> MigrationRegistry {
    MigrationRegistry::new()
}

/// Routes mounted under `/api/core`.
pub fn core_routes(daemon: &Arc<Daemon>) -> Vec<RouteDef> {
    let mut routes = Vec::new();

    {
        routes.push(RouteDef::new(
            Method::Get,
            "/health",
            route_fn(|_| async {
                ApiResponse::ok(serde_json::json!({"status": "up"}))
            }),
        ));
    }

    {
        let daemon = Arc::clone(daemon);
        routes.push(RouteDef::new(
            Method::Get,
            "/documents",
            route_fn(move |_| {
                let daemon = Arc::clone(&daemon);
                async move {
                    let documents = daemon.core.documents();
                    ApiResponse::ok(serde_json::json!({ "documents": documents }))
                }
            }),
        ));
    }

    {
        let daemon = Arc::clone(daemon);
        routes.push(RouteDef::new(
            Method::Get,
            "/documents/{id}",
            route_fn(move |request| {
                let daemon = Arc::clone(&daemon);
                async move {
                    let id = DocumentId::new(request.params["id"].clone());
                    match daemon.core.document(&id) {
                        Some(document) => ApiResponse::ok(serde_json::json!(document)),
                        None => ApiResponse::not_found(),
                    }
                }
            }),
        ));
    }

    {
        let daemon = Arc::clone(daemon);
        routes.push(RouteDef::new(
            Method::Get,
            "/documents/{id}/chunks",
            route_fn(move |request| {
                let daemon = Arc::clone(&daemon);
                async move {
                    let id = DocumentId::new(request.params["id"].clone());
                    ApiResponse::ok(serde_json::json!({"chunks": daemon.core.chunks(&id)}))
                }
            }),
        ));
    }

    {
        let daemon = Arc::clone(daemon);
        routes.push(RouteDef::new(
            Method::Get,
            "/entities",
            route_fn(move |_| {
                let daemon = Arc::clone(&daemon);
                async move {
                    ApiResponse::ok(
                        serde_json::json!({"entities": daemon.core.canonical_entities()}),
                    )
                }
            }),
        ));
    }

    {
        let daemon = Arc::clone(daemon);
        routes.push(RouteDef::new(
            Method::Post,
            "/ingest",
            route_fn(move |request| {
                let daemon = Arc::clone(&daemon);
                async move {
                    let Some(path) = request.body["file_path"].as_str() else {
                        return ApiResponse::error(400, "file_path is required");
                    };
                    match daemon.coordinator.ingest(path).await {
                        Ok(IngestOutcome::Created { document, job }) => {
                            ApiResponse::ok(serde_json::json!({
                                "document_id": document.id,
                                "job_id": job.id,
                                "existing": false,
                            }))
                        }
                        Ok(IngestOutcome::Existing { document_id }) => {
                            ApiResponse::ok(serde_json::json!({
                                "document_id": document_id,
                                "existing": true,
                            }))
                        }
                        Err(e) => ApiResponse::error(422, e.to_string()),
                    }
                }
            }),
        ));
    }

    routes
}

/// Routes mounted under `/api` (shared job polling surface).
pub fn job_routes(daemon: &Arc<Daemon>) -> Vec<RouteDef> {
    let mut routes = Vec::new();

    {
        let daemon = Arc::clone(daemon);
        routes.push(RouteDef::new(
            Method::Post,
            "/jobs/search",
            route_fn(move |request| {
                let daemon = Arc::clone(&daemon);
                async move {
                    let pool = request.body["pool"].as_str().map(str::to_string);
                    let status = request.body["status"]
                        .as_str()
                        .and_then(|s| serde_json::from_value(serde_json::json!(s)).ok());
                    let limit = request.body["limit"].as_u64().unwrap_or(50) as usize;
                    let offset = request.body["offset"].as_u64().unwrap_or(0) as usize;
                    let jobs = daemon.ledger.list(pool.as_deref(), status, limit, offset);
                    ApiResponse::ok(serde_json::json!({"jobs": jobs}))
                }
            }),
        ));
    }

    {
        let daemon = Arc::clone(daemon);
        routes.push(RouteDef::new(
            Method::Get,
            "/jobs/{id}",
            route_fn(move |request| {
                let daemon = Arc::clone(&daemon);
                async move {
                    let id = JobId::new(request.params["id"].clone());
                    match daemon.broker.job(&id).await {
                        Ok(Some(job)) => ApiResponse::ok(serde_json::json!(job)),
                        Ok(None) => match daemon.ledger.get(&id) {
                            Some(job) => ApiResponse::ok(serde_json::json!(job)),
                            None => ApiResponse::not_found(),
                        },
                        Err(e) => ApiResponse::error(500, e.to_string()),
                    }
                }
            }),
        ));
    }

    {
        let daemon = Arc::clone(daemon);
        routes.push(RouteDef::new(
            Method::Post,
            "/jobs/{id}/requeue",
            route_fn(move |request| {
                let daemon = Arc::clone(&daemon);
                async move {
                    let id = JobId::new(request.params["id"].clone());
                    match daemon.coordinator.requeue(&id).await {
                        Ok(job) => ApiResponse::ok(serde_json::json!(job)),
                        Err(e) => ApiResponse::error(422, e.to_string()),
                    }
                }
            }),
        ));
    }

    routes
}
