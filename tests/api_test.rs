//! Route-level tests driven through the router in-process with the
//! in-memory status store.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use stage_social_creator::app_state::AppState;
use stage_social_creator::db::memory::MemoryStatusStore;
use stage_social_creator::db::store::StatusStore;
use stage_social_creator::models::platform::Platform;
use stage_social_creator::naming::derive_identity;
use stage_social_creator::routes;
use stage_social_creator::services::queue::JobQueue;

fn test_app() -> (Router, Arc<MemoryStatusStore>) {
    let store = Arc::new(MemoryStatusStore::new());
    // The client is lazy; queue-free endpoints never touch Redis.
    let queue = JobQueue::new("redis://localhost:6379").unwrap();
    let state = AppState::new(store.clone(), queue, "STAGE".to_string());
    (routes::api_router(state), store)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn dry_run_returns_handles_without_creating_a_job() {
    let (app, store) = test_app();

    let response = app
        .oneshot(post_json(
            "/api/v1/profiles",
            json!({ "title": "Udaipur", "dry_run": true }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["slug"], "udaipur");
    assert_eq!(body["handles"]["instagram"]["handle"], "stage.udaipur");
    assert_eq!(body["handles"]["facebook"]["handle"], "StageUdaipur");
    assert_eq!(body["handles"]["youtube"]["handle"], "StageUdaipur");
    assert_eq!(
        body["handles"]["youtube"]["url"],
        "https://youtube.com/@StageUdaipur"
    );

    // Nothing persisted.
    assert!(store.list_jobs().await.unwrap().is_empty());
}

#[tokio::test]
async fn short_platform_names_are_accepted() {
    let (app, _store) = test_app();

    // "fb"/"yt"/"ig" are what operators type on the CLI; the HTTP body
    // takes them too.
    let response = app
        .oneshot(post_json(
            "/api/v1/profiles",
            json!({ "title": "Kota", "platforms": ["fb", "yt"], "dry_run": true }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["slug"], "kota");
}

#[tokio::test]
async fn empty_title_is_rejected() {
    let (app, _store) = test_app();

    let response = app
        .oneshot(post_json(
            "/api/v1/profiles",
            json!({ "title": "", "dry_run": true }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn title_with_no_usable_characters_is_rejected() {
    let (app, _store) = test_app();

    let response = app
        .oneshot(post_json(
            "/api/v1/profiles",
            json!({ "title": "!!! ???", "dry_run": true }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_platform_list_is_rejected() {
    let (app, _store) = test_app();

    let response = app
        .oneshot(post_json(
            "/api/v1/profiles",
            json!({ "title": "Kota", "platforms": [] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_job_returns_not_found() {
    let (app, _store) = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/profiles/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_profile_reports_step_states() {
    let (app, store) = test_app();

    let identity = derive_identity("Kota", "STAGE").unwrap();
    let requested: BTreeSet<Platform> =
        [Platform::Facebook, Platform::Youtube].into_iter().collect();
    let job = store.create_job("Kota", &identity, &requested).await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/profiles/{}", job.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["title"], "Kota");
    assert_eq!(body["status"], "in_progress");
    assert_eq!(body["steps"]["facebook"]["state"], "pending");
    assert_eq!(body["steps"]["instagram"]["state"], "not_requested");
}

#[tokio::test]
async fn list_returns_jobs_in_creation_order() {
    let (app, store) = test_app();

    for title in ["Kota", "Udaipur"] {
        let identity = derive_identity(title, "STAGE").unwrap();
        let requested: BTreeSet<Platform> = Platform::ALL.into_iter().collect();
        store.create_job(title, &identity, &requested).await.unwrap();
    }

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/profiles")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let jobs = body.as_array().unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0]["title"], "Kota");
    assert_eq!(jobs[1]["title"], "Udaipur");
}
