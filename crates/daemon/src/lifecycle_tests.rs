// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::protocol::{Request, Response};
use cf_host::Method;

fn test_env(dir: &tempfile::TempDir) -> DaemonEnv {
    let data_root = dir.path().to_path_buf();
    DaemonEnv {
        broker_path: data_root.join("broker/journal.jsonl"),
        store_path: data_root.join("store"),
        log_level: "warn".into(),
        max_worker_requeues: 3,
        socket_path: data_root.join("casefiled.sock"),
        data_root,
    }
}

async fn start(dir: &tempfile::TempDir) -> Arc<Daemon> {
    Daemon::start(test_env(dir), DaemonConfig::default(), Vec::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn ping_pools_and_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = start(&dir).await;

    assert!(matches!(
        daemon.handle_request(Request::Ping).await,
        Response::Pong { .. }
    ));

    let Response::Pools { pools } = daemon.handle_request(Request::Pools).await else {
        panic!("expected pools");
    };
    let extract = pools.iter().find(|p| p.name == "extract").unwrap();
    assert_eq!(extract.resource_tier, "cpu-extract");
    assert!(extract.live_workers >= 1);

    assert_eq!(
        daemon.handle_request(Request::Shutdown).await,
        Response::ShuttingDown
    );
    daemon.shutdown().await;
}

#[tokio::test]
async fn second_daemon_on_same_root_is_locked_out() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = start(&dir).await;

    let err = Daemon::start(test_env(&dir), DaemonConfig::default(), Vec::new())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, DaemonError::Locked(_)));
    daemon.shutdown().await;
}

#[tokio::test]
async fn enqueue_to_unknown_pool_is_typed_unavailability() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = start(&dir).await;

    let response = daemon
        .handle_request(Request::Enqueue {
            pool: "no-such-pool".into(),
            payload: serde_json::json!({}),
            priority: 0,
        })
        .await;
    let Response::Error { class, .. } = response else {
        panic!("expected typed error");
    };
    assert_eq!(class, ErrorClass::Resource);
    daemon.shutdown().await;
}

#[tokio::test]
async fn job_status_round_trips_through_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = start(&dir).await;

    let Response::Job { job } = daemon
        .handle_request(Request::Enqueue {
            pool: "normalize".into(),
            payload: serde_json::json!({"text": "hello world"}),
            priority: 0,
        })
        .await
    else {
        panic!("expected job");
    };

    let Response::Job { job: fetched } = daemon
        .handle_request(Request::JobStatus {
            id: job.id.to_string(),
        })
        .await
    else {
        panic!("expected job status");
    };
    assert_eq!(fetched.id, job.id);

    assert!(matches!(
        daemon
            .handle_request(Request::JobStatus { id: "ghost".into() })
            .await,
        Response::JobNotFound { .. }
    ));
    daemon.shutdown().await;
}

#[tokio::test]
async fn api_routes_health_and_unknown() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = start(&dir).await;

    let Response::Api { status, body } = daemon
        .handle_request(Request::Api {
            method: Method::Get,
            path: "/api/core/health".into(),
            body: serde_json::Value::Null,
        })
        .await
    else {
        panic!("expected api response");
    };
    assert_eq!(status, 200);
    assert_eq!(body["status"], "up");

    let Response::Api { status, .. } = daemon
        .handle_request(Request::Api {
            method: Method::Get,
            path: "/api/nope".into(),
            body: serde_json::Value::Null,
        })
        .await
    else {
        panic!("expected api response");
    };
    assert_eq!(status, 404);
    daemon.shutdown().await;
}

#[tokio::test]
async fn ingest_and_duplicate_detection() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = start(&dir).await;
    std::fs::write(dir.path().join("note.txt"), "Alice met Bob in Paris.").unwrap();

    let Response::Ingested {
        document_id,
        job_id,
        existing,
    } = daemon
        .handle_request(Request::Ingest {
            path: "note.txt".into(),
        })
        .await
    else {
        panic!("expected ingested");
    };
    assert!(!existing);
    assert!(job_id.is_some());

    let Response::Ingested {
        document_id: second,
        existing,
        ..
    } = daemon
        .handle_request(Request::Ingest {
            path: "note.txt".into(),
        })
        .await
    else {
        panic!("expected ingested");
    };
    assert!(existing);
    assert_eq!(second, document_id);
    daemon.shutdown().await;
}
