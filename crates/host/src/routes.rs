// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative route tables and the router that merges them.
//!
//! Extensions return route tables; the router mounts each under its api
//! prefix at load time. Paths support `{param}` segments, captured into
//! the request's params map.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Delete,
}

/// A request routed to a handler.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: serde_json::Value,
    /// `{param}` captures from the matched route pattern
    pub params: HashMap<String, String>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method,
            path: path.into(),
            body,
            params: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl ApiResponse {
    pub fn ok(body: serde_json::Value) -> Self {
        Self { status: 200, body }
    }

    pub fn not_found() -> Self {
        Self {
            status: 404,
            body: serde_json::json!({"error": "not found"}),
        }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: serde_json::json!({"error": message.into()}),
        }
    }
}

#[async_trait::async_trait]
pub trait RouteHandler: Send + Sync {
    async fn call(&self, request: ApiRequest) -> ApiResponse;
}

type BoxedRouteFuture = Pin<Box<dyn Future<Output = ApiResponse> + Send>>;

struct FnHandler<F>(F);

#[async_trait::async_trait]
impl<F> RouteHandler for FnHandler<F>
where
    F: Fn(ApiRequest) -> BoxedRouteFuture + Send + Sync,
{
    async fn call(&self, request: ApiRequest) -> ApiResponse {
        (self.0)(request).await
    }
}

/// A route handler from an async closure.
pub fn route_fn<F, Fut>(f: F) -> Arc<dyn RouteHandler>
where
    F: Fn(ApiRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResponse> + Send + 'static,
{
    Arc::new(FnHandler(move |request| {
        Box::pin(f(request)) as BoxedRouteFuture
    }))
}

/// One row of a route table.
#[derive(Clone)]
pub struct RouteDef {
    pub method: Method,
    /// Path relative to the mount prefix, e.g. `/entities/{id}`
    pub path: String,
    pub handler: Arc<dyn RouteHandler>,
}

impl RouteDef {
    pub fn new(method: Method, path: impl Into<String>, handler: Arc<dyn RouteHandler>) -> Self {
        Self {
            method,
            path: path.into(),
            handler,
        }
    }
}

/// Mounted route set. Insertion-ordered so earlier mounts win ties.
/// Cheap to clone: handlers are shared.
#[derive(Default, Clone)]
pub struct Router {
    routes: IndexMap<(Method, String), Arc<dyn RouteHandler>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount a route table under a prefix (e.g. `/api/contradictions`).
    pub fn mount(&mut self, prefix: &str, routes: Vec<RouteDef>) {
        for route in routes {
            let path = format!(
                "{}/{}",
                prefix.trim_end_matches('/'),
                route.path.trim_start_matches('/')
            );
            self.routes.insert((route.method, path), route.handler);
        }
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Find and invoke the handler for a request.
    pub async fn dispatch(&self, mut request: ApiRequest) -> ApiResponse {
        for ((method, pattern), handler) in &self.routes {
            if *method != request.method {
                continue;
            }
            if let Some(params) = match_path(pattern, &request.path) {
                request.params = params;
                return handler.call(request).await;
            }
        }
        ApiResponse::not_found()
    }
}

/// Match a concrete path against a `{param}` pattern.
fn match_path(pattern: &str, path: &str) -> Option<HashMap<String, String>> {
    let pattern_segments: Vec<&str> = pattern.trim_matches('/').split('/').collect();
    let path_segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    if pattern_segments.len() != path_segments.len() {
        return None;
    }

    let mut params = HashMap::new();
    for (pattern_segment, path_segment) in pattern_segments.iter().zip(&path_segments) {
        if let Some(name) = pattern_segment
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
        {
            params.insert(name.to_string(), (*path_segment).to_string());
        } else if pattern_segment != path_segment {
            return None;
        }
    }
    Some(params)
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
