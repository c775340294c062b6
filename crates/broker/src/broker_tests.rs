// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cf_core::{FakeClock, JobConfig};
use std::sync::Arc;

fn config(id: &str, pool: &str) -> JobConfig {
    JobConfig::new(JobId::new(id), pool, serde_json::json!({"n": 1}))
}

fn open_broker(dir: &tempfile::TempDir) -> DurableBroker<FakeClock> {
    DurableBroker::open_with_clock(&dir.path().join("broker.jsonl"), FakeClock::new()).unwrap()
}

#[tokio::test]
async fn enqueue_then_claim() {
    let dir = tempfile::tempdir().unwrap();
    let broker = open_broker(&dir);

    broker.enqueue(config("j1", "extract")).await.unwrap();
    let job = broker
        .claim("extract", &WorkerId::new("w1"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(job.id, "j1");
    assert_eq!(job.status, JobStatus::Claimed);
    assert_eq!(job.claimed_by, Some(WorkerId::new("w1")));
}

#[tokio::test]
async fn claim_order_is_priority_then_fifo() {
    let dir = tempfile::tempdir().unwrap();
    let broker = open_broker(&dir);

    broker.enqueue(config("low", "p").priority(0)).await.unwrap();
    broker.enqueue(config("old", "p").priority(5)).await.unwrap();
    broker.enqueue(config("new", "p").priority(5)).await.unwrap();

    let w = WorkerId::new("w1");
    assert_eq!(broker.claim("p", &w).await.unwrap().unwrap().id, "old");
    assert_eq!(broker.claim("p", &w).await.unwrap().unwrap().id, "new");
    assert_eq!(broker.claim("p", &w).await.unwrap().unwrap().id, "low");
    assert!(broker.claim("p", &w).await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_claims_have_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let broker = Arc::new(open_broker(&dir));
    broker.enqueue(config("j1", "p")).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let broker = Arc::clone(&broker);
        handles.push(tokio::spawn(async move {
            broker.claim("p", &WorkerId::new(format!("w{i}"))).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().is_some() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn ack_completes_job() {
    let dir = tempfile::tempdir().unwrap();
    let broker = open_broker(&dir);
    broker.enqueue(config("j1", "p")).await.unwrap();
    let w = WorkerId::new("w1");
    let job = broker.claim("p", &w).await.unwrap().unwrap();
    broker.start(&job.id).await.unwrap();

    let done = broker
        .ack(&job.id, serde_json::json!({"ok": true}))
        .await
        .unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.claimed_by.is_none());
    assert_eq!(done.attempts, 1);
}

#[tokio::test]
async fn nack_requeue_until_cap_then_deadletter() {
    let dir = tempfile::tempdir().unwrap();
    let broker = open_broker(&dir);
    broker
        .enqueue(config("j1", "p").max_worker_requeues(2))
        .await
        .unwrap();
    let w = WorkerId::new("w1");

    for round in 0..2 {
        let job = broker.claim("p", &w).await.unwrap().unwrap();
        broker.start(&job.id).await.unwrap();
        let outcome = broker
            .nack(&job.id, "boom", ErrorClass::Transient, true)
            .await
            .unwrap();
        assert_eq!(outcome, NackOutcome::Requeued, "round {round}");
    }

    let job = broker.claim("p", &w).await.unwrap().unwrap();
    broker.start(&job.id).await.unwrap();
    let outcome = broker
        .nack(&job.id, "boom", ErrorClass::Transient, true)
        .await
        .unwrap();
    assert_eq!(outcome, NackOutcome::DeadLettered);

    let job = broker.job(&JobId::new("j1")).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Dead);
    // Strict cap: the counter never exceeds max_worker_requeues
    assert_eq!(job.worker_requeue_count, 2);
    assert!(broker.claim("p", &w).await.unwrap().is_none());
}

#[tokio::test]
async fn nack_without_requeue_on_payload_error_deadletters() {
    let dir = tempfile::tempdir().unwrap();
    let broker = open_broker(&dir);
    broker.enqueue(config("j1", "p")).await.unwrap();
    let w = WorkerId::new("w1");
    let job = broker.claim("p", &w).await.unwrap().unwrap();
    broker.start(&job.id).await.unwrap();

    let outcome = broker
        .nack(&job.id, "missing field", ErrorClass::Payload, false)
        .await
        .unwrap();
    assert_eq!(outcome, NackOutcome::DeadLettered);
    assert_eq!(
        broker.job(&job.id).await.unwrap().unwrap().status,
        JobStatus::Dead
    );
}

#[tokio::test]
async fn operator_reset_repends_and_zeroes_budget() {
    let dir = tempfile::tempdir().unwrap();
    let broker = open_broker(&dir);
    broker
        .enqueue(config("j1", "p").max_worker_requeues(0))
        .await
        .unwrap();
    let w = WorkerId::new("w1");
    let job = broker.claim("p", &w).await.unwrap().unwrap();
    broker.start(&job.id).await.unwrap();
    broker
        .nack(&job.id, "boom", ErrorClass::Transient, true)
        .await
        .unwrap();

    let job = broker.reset(&JobId::new("j1")).await.unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.worker_requeue_count, 0);
    assert!(broker.claim("p", &w).await.unwrap().is_some());
}

#[tokio::test]
async fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broker.jsonl");

    {
        let broker = DurableBroker::open_with_clock(&path, FakeClock::new()).unwrap();
        broker.enqueue(config("j1", "p").priority(3)).await.unwrap();
        broker.enqueue(config("j2", "p")).await.unwrap();
        let job = broker.claim("p", &WorkerId::new("w1")).await.unwrap().unwrap();
        assert_eq!(job.id, "j1");
        broker.flush().unwrap();
    }

    let broker = DurableBroker::open_with_clock(&path, FakeClock::new()).unwrap();
    // j1 was claimed before the restart; only j2 is claimable
    let job = broker.claim("p", &WorkerId::new("w2")).await.unwrap().unwrap();
    assert_eq!(job.id, "j2");
    let j1 = broker.job(&JobId::new("j1")).await.unwrap().unwrap();
    assert_eq!(j1.status, JobStatus::Claimed);
}

#[tokio::test]
async fn peek_returns_claim_order() {
    let dir = tempfile::tempdir().unwrap();
    let broker = open_broker(&dir);
    broker.enqueue(config("a", "p").priority(1)).await.unwrap();
    broker.enqueue(config("b", "p").priority(9)).await.unwrap();

    let ids = broker.peek("p").await.unwrap();
    assert_eq!(ids, vec![JobId::new("b"), JobId::new("a")]);
    assert_eq!(broker.pool_depth("p").await.unwrap(), 2);
}

#[tokio::test]
async fn unknown_job_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let broker = open_broker(&dir);
    let err = broker
        .ack(&JobId::new("nope"), serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::JobNotFound(_)));
    assert_eq!(err.class(), ErrorClass::Payload);
}
