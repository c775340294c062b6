// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::fs;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct Op {
    name: String,
}

fn op(name: &str) -> Op {
    Op { name: name.into() }
}

#[test]
fn append_flush_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ops.jsonl");

    {
        let (mut journal, entries) = Journal::<Op>::open(&path).unwrap();
        assert!(entries.is_empty());
        journal.append(&op("a")).unwrap();
        journal.append(&op("b")).unwrap();
        journal.flush().unwrap();
    }

    let (_, entries) = Journal::<Op>::open(&path).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq, 1);
    assert_eq!(entries[0].record, op("a"));
    assert_eq!(entries[1].record, op("b"));
}

#[test]
fn sequence_continues_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ops.jsonl");

    {
        let (mut journal, _) = Journal::<Op>::open(&path).unwrap();
        journal.append(&op("a")).unwrap();
        journal.flush().unwrap();
    }
    {
        let (mut journal, _) = Journal::<Op>::open(&path).unwrap();
        let seq = journal.append(&op("b")).unwrap();
        assert_eq!(seq, 2);
    }
}

#[test]
fn unflushed_entries_are_not_durable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ops.jsonl");

    {
        let (mut journal, _) = Journal::<Op>::open(&path).unwrap();
        journal.append(&op("lost")).unwrap();
        // dropped without flush
    }

    let (_, entries) = Journal::<Op>::open(&path).unwrap();
    assert!(entries.is_empty());
}

#[test]
fn corrupt_tail_rotates_and_preserves_valid_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ops.jsonl");

    {
        let (mut journal, _) = Journal::<Op>::open(&path).unwrap();
        journal.append(&op("good")).unwrap();
        journal.flush().unwrap();
    }
    // Corrupt the tail
    let mut content = fs::read_to_string(&path).unwrap();
    content.push_str("{\"seq\": 2, \"record\": {trunca");
    fs::write(&path, content).unwrap();

    let (_, entries) = Journal::<Op>::open(&path).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].record, op("good"));
    assert!(path.with_extension("bak").exists());
}

#[test]
fn rewrite_compacts_and_reopens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ops.jsonl");

    let (mut journal, _) = Journal::<Op>::open(&path).unwrap();
    for i in 0..10 {
        journal.append(&op(&format!("op-{i}"))).unwrap();
    }
    journal.flush().unwrap();

    journal.rewrite(&[op("kept")]).unwrap();
    assert_eq!(journal.appended_since_rewrite(), 0);

    // Appends after the rewrite are preserved too
    journal.append(&op("after")).unwrap();
    journal.flush().unwrap();
    drop(journal);

    let (_, entries) = Journal::<Op>::open(&path).unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.record.name.as_str()).collect();
    assert_eq!(names, vec!["kept", "after"]);
}

#[test]
fn bak_rotation_keeps_three() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ops.jsonl");
    fs::write(&path, "x").unwrap();

    for _ in 0..4 {
        let bak = rotate_bak_path(&path);
        fs::write(&bak, "bak").unwrap();
    }
    assert!(path.with_extension("bak").exists());
    assert!(path.with_extension("bak.2").exists());
    assert!(path.with_extension("bak.3").exists());
    assert!(!path.with_extension("bak.4").exists());
}
