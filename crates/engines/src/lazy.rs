// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-worker lazy engine initialization.
//!
//! Expensive engines (OCR, embedding) are constructed on first use and
//! retained for the worker's lifetime. A failed initialization surfaces on
//! the job that needed the engine and is retried on the next one; nothing
//! fails at registration time.

use crate::error::EngineError;
use parking_lot::Mutex;
use std::sync::Arc;

type Factory<T> = Box<dyn Fn() -> Result<Arc<T>, EngineError> + Send + Sync>;

pub struct LazyEngine<T: ?Sized> {
    factory: Factory<T>,
    engine: Mutex<Option<Arc<T>>>,
}

impl<T: ?Sized> LazyEngine<T> {
    pub fn new(factory: impl Fn() -> Result<Arc<T>, EngineError> + Send + Sync + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            engine: Mutex::new(None),
        }
    }

    /// An engine that is already constructed (tests, cheap engines).
    pub fn ready(engine: Arc<T>) -> Self
    where
        T: Send + Sync + 'static,
    {
        let lazy = Self::new({
            let engine = Arc::clone(&engine);
            move || Ok(Arc::clone(&engine))
        });
        *lazy.engine.lock() = Some(engine);
        lazy
    }

    /// Get the engine, initializing on first call.
    pub fn get(&self) -> Result<Arc<T>, EngineError> {
        let mut slot = self.engine.lock();
        if let Some(engine) = slot.as_ref() {
            return Ok(Arc::clone(engine));
        }
        let engine = (self.factory)()?;
        *slot = Some(Arc::clone(&engine));
        Ok(engine)
    }

    /// Whether initialization has happened yet.
    pub fn initialized(&self) -> bool {
        self.engine.lock().is_some()
    }

    /// Release the engine (worker shutdown).
    pub fn release(&self) {
        *self.engine.lock() = None;
    }
}

#[cfg(test)]
#[path = "lazy_tests.rs"]
mod tests;
