// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn requests_round_trip() {
    let requests = vec![
        Request::Ping,
        Request::Enqueue {
            pool: "embed".into(),
            payload: serde_json::json!({"text": "x", "doc_id": "d", "chunk_id": "c"}),
            priority: 2,
        },
        Request::JobStatus { id: "j-1".into() },
        Request::Pools,
        Request::Ingest {
            path: "docs/report.pdf".into(),
        },
        Request::Requeue { id: "j-1".into() },
        Request::Events { limit: 50 },
        Request::WorkerStart {
            pool: "extract".into(),
        },
        Request::Api {
            method: Method::Get,
            path: "/api/core/health".into(),
            body: serde_json::Value::Null,
        },
        Request::Shutdown,
    ];
    for request in requests {
        let json = serde_json::to_string(&request).unwrap();
        let back: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request, "{json}");
    }
}

#[test]
fn request_tags_are_stable() {
    let json = serde_json::to_value(Request::Ingest {
        path: "a.pdf".into(),
    })
    .unwrap();
    assert_eq!(json["type"], "Ingest");
    assert_eq!(json["path"], "a.pdf");
}

#[test]
fn enqueue_priority_defaults_to_zero() {
    let request: Request =
        serde_json::from_str(r#"{"type": "Enqueue", "pool": "p", "payload": {}}"#).unwrap();
    assert!(matches!(request, Request::Enqueue { priority: 0, .. }));
}

#[test]
fn responses_round_trip() {
    let responses = vec![
        Response::Pong {
            version: "0.1.0".into(),
        },
        Response::JobNotFound { id: "j-9".into() },
        Response::Ingested {
            document_id: "doc-1".into(),
            job_id: Some("j-1".into()),
            existing: false,
        },
        Response::error(ErrorClass::Resource, "pool embed unavailable"),
        Response::ShuttingDown,
    ];
    for response in responses {
        let json = serde_json::to_string(&response).unwrap();
        let back: Response = serde_json::from_str(&json).unwrap();
        assert_eq!(back, response, "{json}");
    }
}

#[test]
fn error_response_carries_classification() {
    let json = serde_json::to_value(Response::error(ErrorClass::Resource, "no gpu")).unwrap();
    assert_eq!(json["class"], "resource");
    assert_eq!(json["message"], "no gpu");
}
