// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schema directories and atomic table persistence.
//!
//! Each schema owns one directory; a handle can only touch tables inside
//! it. Extensions receive a handle to their own schema and nothing else.

use crate::migration::{MigrationError, MigrationRegistry};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("migration error: {0}")]
    Migration(#[from] MigrationError),
    #[error("document not found: {0}")]
    DocumentNotFound(String),
    #[error("chunk indices for document {document_id} are not dense from 0")]
    ChunkIndexGap { document_id: String },
    #[error("collection {collection} has {expected} dimensions, got {got}")]
    CollectionDims {
        collection: String,
        expected: usize,
        got: usize,
    },
    #[error("invalid schema name: {0}")]
    InvalidSchemaName(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct SchemaVersion {
    v: u32,
    updated_at: chrono::DateTime<chrono::Utc>,
}

/// Root of the content store: `<root>/<schema>/...`
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_owned(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open a schema at version 1 with no migrations.
    pub fn schema(&self, name: &str) -> Result<SchemaHandle, StoreError> {
        self.schema_versioned(name, 1, &MigrationRegistry::new())
    }

    /// Open a schema, applying any newer migrations to reach `version`.
    pub fn schema_versioned(
        &self,
        name: &str,
        version: u32,
        migrations: &MigrationRegistry,
    ) -> Result<SchemaHandle, StoreError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(StoreError::InvalidSchemaName(name.to_string()));
        }

        let dir = self.root.join(name);
        fs::create_dir_all(&dir)?;
        let handle = SchemaHandle {
            name: name.to_string(),
            dir,
        };
        handle.migrate_to(version, migrations)?;
        Ok(handle)
    }
}

/// Access to one schema's tables. Cloneable; all clones share the
/// directory. Writes are atomic (tmp + rename).
#[derive(Debug, Clone)]
pub struct SchemaHandle {
    name: String,
    dir: PathBuf,
}

impl SchemaHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.json"))
    }

    /// Load a table, or its default when absent. A corrupt table is moved
    /// aside to `.bak` and treated as absent rather than wedging the
    /// schema.
    pub fn load_table<T: DeserializeOwned + Default>(&self, table: &str) -> Result<T, StoreError> {
        let path = self.table_path(table);
        if !path.exists() {
            return Ok(T::default());
        }
        let file = File::open(&path)?;
        let reader = BufReader::new(file);
        match serde_json::from_reader(reader) {
            Ok(value) => Ok(value),
            Err(e) => {
                let bak = path.with_extension("json.bak");
                warn!(
                    schema = %self.name,
                    table,
                    error = %e,
                    "corrupt table, moving to .bak and starting fresh"
                );
                fs::rename(&path, &bak)?;
                Ok(T::default())
            }
        }
    }

    /// Save a table atomically (write to .tmp, fsync, then rename).
    pub fn save_table<T: Serialize>(&self, table: &str, value: &T) -> Result<(), StoreError> {
        let path = self.table_path(table);
        let tmp = path.with_extension("json.tmp");
        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, value)?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn version(&self) -> Result<u32, StoreError> {
        let path = self.table_path("schema_version");
        if !path.exists() {
            return Ok(0);
        }
        let file = File::open(&path)?;
        let v: SchemaVersion = serde_json::from_reader(BufReader::new(file))?;
        Ok(v.v)
    }

    fn set_version(&self, v: u32) -> Result<(), StoreError> {
        self.save_table(
            "schema_version",
            &SchemaVersion {
                v,
                updated_at: chrono::Utc::now(),
            },
        )
    }

    /// Apply migrations to bring this schema to `target`.
    ///
    /// All tables are gathered into one JSON object keyed by table name,
    /// migrated, and written back.
    fn migrate_to(&self, target: u32, registry: &MigrationRegistry) -> Result<(), StoreError> {
        let current = self.version()?;
        if current == target {
            return Ok(());
        }
        if current > target {
            return Err(MigrationError::TooNew(current, target).into());
        }
        // A fresh schema needs no data migration
        if current == 0 {
            self.set_version(target)?;
            return Ok(());
        }

        let mut tables = serde_json::Map::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if path.extension().and_then(|e| e.to_str()) != Some("json")
                || stem == "schema_version"
            {
                continue;
            }
            let file = File::open(&path)?;
            let value: Value = serde_json::from_reader(BufReader::new(file))?;
            tables.insert(stem.to_string(), value);
        }

        let migrated = registry.migrate_to(Value::Object(tables), current, target)?;
        if let Value::Object(map) = migrated {
            for (table, value) in map {
                self.save_table(&table, &value)?;
            }
        }
        self.set_version(target)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
