// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schema migration system.
//!
//! Migrations transform a schema's combined table JSON from one version to
//! the next. The registry chains migrations to reach the current version.
//! The core schema's migrations are applied by the core on startup; each
//! extension manages its own.

use serde_json::Value;
use thiserror::Error;

/// Errors that can occur during migration
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("migration v{from}→v{to} failed: {reason}")]
    Failed { from: u32, to: u32, reason: String },
    #[error("no migration path from v{0} to v{1}")]
    NoPath(u32, u32),
    #[error("schema version {0} is newer than supported ({1})")]
    TooNew(u32, u32),
}

/// A migration from one schema version to the next.
pub trait Migration: Send + Sync {
    fn source_version(&self) -> u32;
    fn target_version(&self) -> u32;
    fn migrate(&self, tables: &mut Value) -> Result<(), MigrationError>;
}

/// Registry of migrations for upgrading a schema.
#[derive(Default)]
pub struct MigrationRegistry {
    migrations: Vec<Box<dyn Migration>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, migration: Box<dyn Migration>) -> Self {
        self.migrations.push(migration);
        self
    }

    /// Migrate the combined table object from `current` to `target`.
    pub fn migrate_to(
        &self,
        mut tables: Value,
        current: u32,
        target: u32,
    ) -> Result<Value, MigrationError> {
        if current == target {
            return Ok(tables);
        }
        if current > target {
            return Err(MigrationError::TooNew(current, target));
        }

        let mut version = current;
        while version < target {
            let migration = self
                .migrations
                .iter()
                .find(|m| m.source_version() == version)
                .ok_or(MigrationError::NoPath(version, target))?;

            migration.migrate(&mut tables)?;
            version = migration.target_version();
        }
        Ok(tables)
    }
}

#[cfg(test)]
#[path = "migration_tests.rs"]
mod tests;
