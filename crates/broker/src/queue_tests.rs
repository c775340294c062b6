// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn priority_first() {
    let mut q = PoolQueue::new();
    q.push(0, 100, 1, &JobId::new("low"));
    q.push(5, 200, 2, &JobId::new("high"));

    assert_eq!(q.pop(), Some(JobId::new("high")));
    assert_eq!(q.pop(), Some(JobId::new("low")));
    assert_eq!(q.pop(), None);
}

#[test]
fn fifo_on_priority_tie() {
    let mut q = PoolQueue::new();
    q.push(1, 200, 2, &JobId::new("second"));
    q.push(1, 100, 1, &JobId::new("first"));

    assert_eq!(q.pop(), Some(JobId::new("first")));
    assert_eq!(q.pop(), Some(JobId::new("second")));
}

#[test]
fn enqueue_seq_breaks_equal_timestamps() {
    let mut q = PoolQueue::new();
    q.push(1, 100, 2, &JobId::new("b"));
    q.push(1, 100, 1, &JobId::new("a"));

    assert_eq!(q.pop(), Some(JobId::new("a")));
    assert_eq!(q.pop(), Some(JobId::new("b")));
}

#[test]
fn peek_does_not_consume() {
    let mut q = PoolQueue::new();
    q.push(2, 100, 1, &JobId::new("a"));
    q.push(1, 100, 2, &JobId::new("b"));

    assert_eq!(q.peek(10), vec![JobId::new("a"), JobId::new("b")]);
    assert_eq!(q.len(), 2);
}

#[test]
fn remove_specific_job() {
    let mut q = PoolQueue::new();
    q.push(1, 100, 1, &JobId::new("a"));
    q.push(1, 101, 2, &JobId::new("b"));

    q.remove(&JobId::new("a"));
    assert_eq!(q.pop(), Some(JobId::new("b")));
    assert!(q.is_empty());
}
