// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Vector schema: named collections of dense vectors.
//!
//! Points are keyed by an external id and tagged with a JSON payload
//! (`document_id`, `chunk_id`, `model`). Collection creation is an
//! idempotent upsert so concurrent first-embedders cannot race.

use crate::schema::{SchemaHandle, StoreError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A stored vector with its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorPoint {
    pub vector: Vec<f32>,
    pub payload: serde_json::Value,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Collections {
    /// collection name → dimensions
    dimensions: HashMap<String, usize>,
}

struct Inner {
    collections: Collections,
    points: HashMap<String, HashMap<String, VectorPoint>>,
    schema: SchemaHandle,
}

impl Inner {
    fn persist_collection(&self, name: &str) -> Result<(), StoreError> {
        self.schema
            .save_table("collections", &self.collections)?;
        if let Some(points) = self.points.get(name) {
            self.schema.save_table(&format!("points-{name}"), points)?;
        }
        Ok(())
    }
}

/// The vector store. Cheap to clone.
#[derive(Clone)]
pub struct VectorStore {
    inner: Arc<Mutex<Inner>>,
}

impl VectorStore {
    pub fn open(schema: SchemaHandle) -> Result<Self, StoreError> {
        let collections: Collections = schema.load_table("collections")?;
        let mut points = HashMap::new();
        for name in collections.dimensions.keys() {
            let table: HashMap<String, VectorPoint> =
                schema.load_table(&format!("points-{name}"))?;
            points.insert(name.clone(), table);
        }
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                collections,
                points,
                schema,
            })),
        })
    }

    /// Create a collection if absent. Idempotent; an existing collection
    /// with different dimensions is an error.
    pub fn ensure_collection(&self, name: &str, dimensions: usize) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        match inner.collections.dimensions.get(name) {
            Some(&existing) if existing == dimensions => Ok(()),
            Some(&existing) => Err(StoreError::CollectionDims {
                collection: name.to_string(),
                expected: existing,
                got: dimensions,
            }),
            None => {
                inner
                    .collections
                    .dimensions
                    .insert(name.to_string(), dimensions);
                inner.points.insert(name.to_string(), HashMap::new());
                inner.persist_collection(name)
            }
        }
    }

    /// Upsert a point. Auto-creates the collection with the vector's
    /// dimensions on first insert.
    pub fn upsert(
        &self,
        collection: &str,
        id: &str,
        vector: Vec<f32>,
        payload: serde_json::Value,
    ) -> Result<(), StoreError> {
        self.ensure_collection(collection, vector.len())?;
        let mut inner = self.inner.lock();
        let expected = inner
            .collections
            .dimensions
            .get(collection)
            .copied()
            .unwrap_or(vector.len());
        if vector.len() != expected {
            return Err(StoreError::CollectionDims {
                collection: collection.to_string(),
                expected,
                got: vector.len(),
            });
        }
        inner
            .points
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), VectorPoint { vector, payload });
        inner.persist_collection(collection)
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<VectorPoint> {
        self.inner
            .lock()
            .points
            .get(collection)
            .and_then(|points| points.get(id))
            .cloned()
    }

    pub fn count(&self, collection: &str) -> usize {
        self.inner
            .lock()
            .points
            .get(collection)
            .map_or(0, |p| p.len())
    }

    pub fn collections(&self) -> Vec<(String, usize)> {
        self.inner
            .lock()
            .collections
            .dimensions
            .iter()
            .map(|(name, dims)| (name.clone(), *dims))
            .collect()
    }

    /// Cosine-similarity search, best matches first.
    pub fn search(&self, collection: &str, query: &[f32], top_k: usize) -> Vec<(String, f32)> {
        let inner = self.inner.lock();
        let Some(points) = inner.points.get(collection) else {
            return Vec::new();
        };
        let mut scored: Vec<(String, f32)> = points
            .iter()
            .map(|(id, point)| (id.clone(), cosine(query, &point.vector)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }
}

/// Cosine similarity; zero vectors score 0.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

#[cfg(test)]
#[path = "vector_tests.rs"]
mod tests;
