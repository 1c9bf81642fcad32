//! Router-level tests.

use super::*;
use crate::test_support::test_state;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use tempfile::TempDir;
use tower::ServiceExt;

async fn send(router: Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = router.oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health() {
    let (state, _store) = test_state();
    let (status, body) = send(create_router(state), Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["jobs"], 0);
    assert_eq!(body["armed"], 0);
}

#[tokio::test]
async fn test_job_lifecycle_over_http() {
    let dir = TempDir::new().unwrap();
    let (state, _store) = test_state();
    let router = create_router(state);
    let spec = serde_json::json!({
        "source": dir.path().to_string_lossy(),
        "target": dir.path().join("dst").to_string_lossy(),
        "cron": "0 2 * * *",
    });

    let (status, body) = send(router.clone(), Method::POST, "/jobs", Some(spec)).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["job"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(router.clone(), Method::GET, "/jobs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (status, body) = send(router.clone(), Method::POST, &format!("/jobs/{}/run", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["record"]["result"]["kind"], "synced");
    assert_eq!(body["record"]["result"]["outcome"]["status"], "succeeded");

    let (status, body) = send(router.clone(), Method::POST, &format!("/jobs/{}/toggle", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["job"]["enabled"], false);

    let (status, body) = send(router.clone(), Method::POST, &format!("/jobs/{}/run", id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("disabled"));

    let (status, _) = send(router.clone(), Method::DELETE, &format!("/jobs/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(router, Method::GET, &format!("/jobs/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains(&id));
}

#[tokio::test]
async fn test_unknown_job_run_is_404() {
    let (state, _store) = test_state();
    let (status, _) = send(create_router(state), Method::POST, "/jobs/nope/run", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
