// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::migration::{Migration, MigrationError, MigrationRegistry};
use serde_json::Value;
use std::collections::HashMap;

#[test]
fn table_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = ContentStore::open(dir.path()).unwrap();
    let schema = store.schema("core").unwrap();

    let mut table: HashMap<String, u32> = HashMap::new();
    table.insert("a".into(), 1);
    schema.save_table("counts", &table).unwrap();

    let loaded: HashMap<String, u32> = schema.load_table("counts").unwrap();
    assert_eq!(loaded, table);
}

#[test]
fn absent_table_is_default() {
    let dir = tempfile::tempdir().unwrap();
    let store = ContentStore::open(dir.path()).unwrap();
    let schema = store.schema("core").unwrap();

    let loaded: HashMap<String, u32> = schema.load_table("missing").unwrap();
    assert!(loaded.is_empty());
}

#[test]
fn corrupt_table_rotates_to_bak() {
    let dir = tempfile::tempdir().unwrap();
    let store = ContentStore::open(dir.path()).unwrap();
    let schema = store.schema("core").unwrap();
    std::fs::write(schema.dir().join("bad.json"), "{nope").unwrap();

    let loaded: HashMap<String, u32> = schema.load_table("bad").unwrap();
    assert!(loaded.is_empty());
    assert!(schema.dir().join("bad.json.bak").exists());
}

#[test]
fn schemas_are_isolated_directories() {
    let dir = tempfile::tempdir().unwrap();
    let store = ContentStore::open(dir.path()).unwrap();
    let core = store.schema("core").unwrap();
    let ext = store.schema("claims").unwrap();

    core.save_table("t", &serde_json::json!({"who": "core"})).unwrap();
    let from_ext: Value = ext.load_table("t").unwrap();
    assert_eq!(from_ext, Value::Null);
    assert_ne!(core.dir(), ext.dir());
}

#[test]
fn rejects_path_like_schema_names() {
    let dir = tempfile::tempdir().unwrap();
    let store = ContentStore::open(dir.path()).unwrap();
    assert!(matches!(
        store.schema("../escape"),
        Err(StoreError::InvalidSchemaName(_))
    ));
    assert!(matches!(store.schema(""), Err(StoreError::InvalidSchemaName(_))));
}

struct RenameField;

impl Migration for RenameField {
    fn source_version(&self) -> u32 {
        1
    }
    fn target_version(&self) -> u32 {
        2
    }
    fn migrate(&self, tables: &mut Value) -> Result<(), MigrationError> {
        if let Some(t) = tables.get_mut("items").and_then(|v| v.as_object_mut()) {
            if let Some(old) = t.remove("old_name") {
                t.insert("new_name".into(), old);
            }
        }
        Ok(())
    }
}

#[test]
fn migration_applies_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let store = ContentStore::open(dir.path()).unwrap();

    {
        let schema = store.schema("ext").unwrap();
        schema
            .save_table("items", &serde_json::json!({"old_name": 7}))
            .unwrap();
        assert_eq!(schema.version().unwrap(), 1);
    }

    let registry = MigrationRegistry::new().register(Box::new(RenameField));
    let schema = store.schema_versioned("ext", 2, &registry).unwrap();
    assert_eq!(schema.version().unwrap(), 2);

    let items: Value = schema.load_table("items").unwrap();
    assert_eq!(items, serde_json::json!({"new_name": 7}));
}

#[test]
fn newer_schema_than_supported_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = ContentStore::open(dir.path()).unwrap();
    {
        let registry = MigrationRegistry::new();
        store.schema_versioned("ext", 5, &registry).unwrap();
    }
    let registry = MigrationRegistry::new();
    assert!(matches!(
        store.schema_versioned("ext", 2, &registry),
        Err(StoreError::Migration(MigrationError::TooNew(5, 2)))
    ));
}
