//! HTTP-level tests over the in-memory store.
//!
//! Run with: `cargo test -p pixdrop-api --test api_test`

mod helpers;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Duration;
use helpers::{noisy_jpeg, setup_test_app, setup_test_app_with, small_png, test_config, upload_body};
use serde_json::Value;

const CLIENT: &str = "203.0.113.7";

#[tokio::test]
async fn rate_limit_scenario_admits_five_then_rejects_until_window_expires() {
    let app = setup_test_app();
    let client = app.client();
    let jpeg = noisy_jpeg(5 * 1024 * 1024);
    let body = upload_body(&jpeg, "photo.jpg", "image/jpeg");

    for _ in 0..5 {
        let response = client
            .post("/upload")
            .add_header("x-forwarded-for", CLIENT)
            .json(&body)
            .await;
        assert_eq!(response.status_code(), 200);
        let json: Value = response.json();
        assert_eq!(json["message"], "Image uploaded successfully");
        assert!(json["key"].as_str().unwrap().starts_with("uploads/"));
        app.advance(Duration::minutes(1));
    }

    let response = client
        .post("/upload")
        .add_header("x-forwarded-for", CLIENT)
        .json(&body)
        .await;
    assert_eq!(response.status_code(), 429);
    let json: Value = response.json();
    assert_eq!(json["limit"], 5);
    assert_eq!(json["timeWindow"], 6);

    app.advance(Duration::hours(6));

    let response = client
        .post("/upload")
        .add_header("x-forwarded-for", CLIENT)
        .json(&body)
        .await;
    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn clients_are_limited_independently() {
    let app = setup_test_app();
    let body = upload_body(&small_png(), "a.png", "image/png");

    for _ in 0..5 {
        app.client()
            .post("/upload")
            .add_header("x-forwarded-for", CLIENT)
            .json(&body)
            .await
            .assert_status_ok();
    }

    app.client()
        .post("/upload")
        .add_header("x-forwarded-for", "198.51.100.1")
        .json(&body)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn oversize_and_wrong_type_are_400_and_cost_nothing() {
    let app = setup_test_app_with(test_config(&[("MAX_FILE_SIZE_MB", "1")]));

    let big = upload_body(&vec![0u8; 1024 * 1024 + 1], "big.jpg", "image/jpeg");
    let response = app.client().post("/upload").json(&big).await;
    assert_eq!(response.status_code(), 400);
    assert_eq!(response.json::<Value>()["limit"], 1);

    let pdf = upload_body(b"%PDF-1.4", "doc.pdf", "application/pdf");
    let response = app.client().post("/upload").json(&pdf).await;
    assert_eq!(response.status_code(), 400);

    assert!(app.storage.is_empty());
}

#[tokio::test]
async fn capacity_ceiling_is_507() {
    let app = setup_test_app_with(test_config(&[("MAX_STORAGE_GB", "0.000001")]));
    let body = upload_body(&noisy_jpeg(4096), "a.jpg", "image/jpeg");

    app.client()
        .post("/upload")
        .add_header("x-forwarded-for", CLIENT)
        .json(&body)
        .await
        .assert_status_ok();

    let response = app
        .client()
        .post("/upload")
        .add_header("x-forwarded-for", CLIENT)
        .json(&body)
        .await;
    assert_eq!(response.status_code(), 507);
    assert!(response.json::<Value>()["limit"].is_number());
}

#[tokio::test]
async fn missing_fields_are_400() {
    let app = setup_test_app();
    let response = app
        .client()
        .post("/upload")
        .json(&serde_json::json!({ "fileName": "a.png" }))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn disabled_quota_never_rate_limits() {
    let app = setup_test_app_with(test_config(&[("QUOTA_ENFORCED", "false")]));
    let body = upload_body(&small_png(), "a.png", "image/png");

    for _ in 0..7 {
        app.client()
            .post("/upload")
            .add_header("x-forwarded-for", CLIENT)
            .json(&body)
            .await
            .assert_status_ok();
    }
    assert!(!app.storage.keys().iter().any(|k| k.starts_with("stats/")));
}

#[tokio::test]
async fn process_list_fetch_download_delete_workflow() {
    let app = setup_test_app();
    let client = app.client();

    let response = client
        .post("/process")
        .json(&serde_json::json!({
            "image": STANDARD.encode(small_png()),
            "option": "sepia",
            "fileName": "1700000000-cat.png",
        }))
        .await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["message"], "Image processed successfully");
    assert_eq!(json["name"], "1700000000-cat.png");

    let listing: Value = client.get("/images").await.json();
    let images = listing["images"].as_array().unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0]["id"], "1700000000");
    assert!(images[0]["thumbnailUrl"].is_string());

    let response = client.get("/images/1700000000-cat.png").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.header("content-type"), "image/png");

    let response = client.get("/images/1700000000-cat.png/url").await;
    assert!(response.json::<Value>()["url"].is_string());

    let response = client.get("/download/1700000000-cat.png").await;
    assert_eq!(response.status_code(), 302);
    assert!(response.header("location").to_str().unwrap().contains("1700000000-cat.png"));

    let response = client.delete("/images/1700000000-cat.png").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["message"], "Files deleted successfully");
    assert!(app.storage.is_empty());

    assert_eq!(client.get("/images/1700000000-cat.png").await.status_code(), 404);
    assert_eq!(client.get("/download/1700000000-cat.png").await.status_code(), 404);
}

#[tokio::test]
async fn unknown_process_option_is_400() {
    let app = setup_test_app();
    let response = app
        .client()
        .post("/process")
        .json(&serde_json::json!({
            "image": STANDARD.encode(small_png()),
            "option": "emboss",
            "fileName": "x.png",
        }))
        .await;
    assert_eq!(response.status_code(), 400);
    assert_eq!(response.json::<Value>()["code"], "UNKNOWN_OPERATION");
}

#[tokio::test]
async fn reset_limits_restores_admission() {
    let app = setup_test_app();
    let body = upload_body(&small_png(), "a.png", "image/png");

    for _ in 0..5 {
        app.client()
            .post("/upload")
            .add_header("x-forwarded-for", CLIENT)
            .json(&body)
            .await
            .assert_status_ok();
    }

    let response = app.client().post("/limits/reset").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(
        response.json::<Value>()["message"],
        "Rate limits reset successfully"
    );
    app.client().post("/limits/reset").await.assert_status_ok();

    app.client()
        .post("/upload")
        .add_header("x-forwarded-for", CLIENT)
        .json(&body)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn responses_carry_request_id() {
    let app = setup_test_app();
    let response = app
        .client()
        .get("/images")
        .add_header("x-request-id", "req-42")
        .await;
    assert_eq!(response.header("x-request-id"), "req-42");
}
