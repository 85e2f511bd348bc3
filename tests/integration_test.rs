//! Integration tests against live infrastructure.
//!
//! These tests require:
//! 1. PostgreSQL database running (with migrations applied)
//! 2. Redis running
//! 3. API server running on configured port
//! 4. Worker process running with browser bridge and cloud phone access
//!
//! Run with: cargo test --test integration_test -- --ignored --nocapture
//!
//! Set API_BASE_URL to override default (http://localhost:3000)

use serde_json::{json, Value};
use std::time::Duration;

/// Get base URL from env or default to localhost
fn get_base_url() -> String {
    std::env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

#[tokio::test]
#[ignore] // Requires running API server and infrastructure
async fn health_check_reports_dependencies() {
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/health", get_base_url()))
        .send()
        .await
        .expect("Health check failed");

    assert!(
        response.status().is_success(),
        "Health check returned non-success status: {}",
        response.status()
    );

    let body: Value = response.json().await.expect("Invalid health body");
    assert_eq!(body["checks"]["database"]["status"], "ok");
    assert_eq!(body["checks"]["redis"]["status"], "ok");
}

#[tokio::test]
#[ignore] // Requires running API server and infrastructure
async fn dry_run_round_trip() {
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/v1/profiles", get_base_url()))
        .json(&json!({ "title": "Udaipur", "dry_run": true }))
        .send()
        .await
        .expect("Request failed");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Invalid body");
    assert_eq!(body["handles"]["instagram"]["handle"], "stage.udaipur");
}

/// Full provisioning flow: submit a job, poll until the worker settles it.
/// Creates real platform presences; run only against a staging setup.
#[tokio::test]
#[ignore] // Requires running worker, browser bridge, cloud phone, OTP credit
async fn full_provisioning_flow() {
    let client = reqwest::Client::new();
    let base_url = get_base_url();

    let response = client
        .post(format!("{}/api/v1/profiles", base_url))
        .json(&json!({ "title": "Kota", "platforms": ["fb", "yt"] }))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Invalid body");
    let job_id = body["job_id"].as_str().expect("Missing job_id").to_string();

    // Poll status until the job leaves in_progress (up to 10 minutes).
    for _ in 0..120 {
        tokio::time::sleep(Duration::from_secs(5)).await;

        let response = client
            .get(format!("{}/api/v1/profiles/{}", base_url, job_id))
            .send()
            .await
            .expect("Status request failed");
        let body: Value = response.json().await.expect("Invalid status body");

        match body["status"].as_str() {
            Some("succeeded") => {
                assert_eq!(body["steps"]["facebook"]["state"], "succeeded");
                assert_eq!(body["steps"]["youtube"]["state"], "succeeded");
                assert!(body["steps"]["facebook"]["url"].is_string());
                return;
            }
            Some("failed") => panic!("provisioning failed: {body}"),
            _ => continue,
        }
    }
    panic!("job {job_id} did not settle in time");
}
