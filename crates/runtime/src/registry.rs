// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool → stage handler registry.

use cf_pipeline::StageHandler;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps pool names to the stage handler their workers run. Extensions
/// register handlers for pools they contribute.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Mutex<HashMap<String, Arc<dyn StageHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, pool: impl Into<String>, handler: Arc<dyn StageHandler>) {
        self.handlers.lock().insert(pool.into(), handler);
    }

    pub fn get(&self, pool: &str) -> Option<Arc<dyn StageHandler>> {
        self.handlers.lock().get(pool).cloned()
    }

    pub fn pools(&self) -> Vec<String> {
        self.handlers.lock().keys().cloned().collect()
    }
}
