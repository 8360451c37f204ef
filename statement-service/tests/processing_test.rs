mod common;

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use common::{TestApp, TEST_USER_ID};
use futures::stream::TryStreamExt;
use mongodb::bson::doc;
use serde_json::json;
use statement_service::models::FileStatus;
use statement_service::workers::FALLBACK_DESCRIPTION;
use std::time::Duration;

const PROCESSING_TIMEOUT: Duration = Duration::from_secs(15);

/// Local stand-in for the extraction gateway.
async fn spawn_stub_gateway(status: StatusCode, body: serde_json::Value) -> String {
    let app = Router::new().route(
        "/api/v2/openai/extract",
        post(move || {
            let body = body.clone();
            async move { (status, Json(body)) }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind stub gateway");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    format!("http://{}/api/v2/openai/extract", addr)
}

#[tokio::test]
async fn fallback_processing_completes_merge_project() {
    // Default test config carries the placeholder token, so every job uses
    // the fallback extractor.
    let app = TestApp::spawn().await;

    let response = app
        .upload(
            &[("march.pdf", b"%PDF-1.4 march"), ("april.pdf", b"%PDF-1.4 april")],
            Some("Fallback batch"),
            Some("merge"),
        )
        .await;
    assert_eq!(StatusCode::CREATED, response.status());
    let body: serde_json::Value = response.json().await.unwrap();
    let project_id = body["id"].as_str().unwrap().to_string();

    let project = app
        .wait_for_project_terminal(&project_id, PROCESSING_TIMEOUT)
        .await;

    assert_eq!(project["status"], "completed");

    let files = project["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    for file in files {
        assert_eq!(file["status"], "completed");
        assert_eq!(file["progress"], 100);
        assert!(file["error_message"].is_null());
    }

    // Exactly one synthetic transaction per file, recognizable by the
    // fixed description.
    let transactions = project["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 2);
    for txn in transactions {
        assert_eq!(txn["description"], FALLBACK_DESCRIPTION);
        assert_eq!(txn["amount"], 123.45);
        assert_eq!(txn["debit"], 123.45);
        assert!(txn["credit"].is_null());
        assert_eq!(txn["currency"], "USD");
    }

    app.cleanup().await;
}

#[tokio::test]
async fn separate_mode_projects_complete_independently() {
    let app = TestApp::spawn().await;

    let response = app
        .upload(
            &[("jan.pdf", b"%PDF-1.4 jan"), ("feb.pdf", b"%PDF-1.4 feb")],
            Some("Monthly"),
            Some("separate"),
        )
        .await;
    assert_eq!(StatusCode::CREATED, response.status());
    let body: serde_json::Value = response.json().await.unwrap();

    for project in body["projects"].as_array().unwrap() {
        let project_id = project["id"].as_str().unwrap();
        let finished = app
            .wait_for_project_terminal(project_id, PROCESSING_TIMEOUT)
            .await;
        assert_eq!(finished["status"], "completed");
        assert_eq!(finished["files"].as_array().unwrap().len(), 1);
        assert_eq!(finished["transactions"].as_array().unwrap().len(), 1);
    }

    app.cleanup().await;
}

#[tokio::test]
async fn gateway_error_falls_back_and_still_completes() {
    let endpoint = spawn_stub_gateway(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": "boom" }),
    )
    .await;

    let app = TestApp::spawn_with(move |config| {
        config.extraction.endpoint = endpoint;
        config.extraction.api_token = "live-token-4f3a2b1c".to_string();
        config.extraction.timeout_secs = 5;
    })
    .await;

    let response = app
        .upload(&[("march.pdf", b"%PDF-1.4 march")], None, None)
        .await;
    assert_eq!(StatusCode::CREATED, response.status());
    let body: serde_json::Value = response.json().await.unwrap();
    let project_id = body["id"].as_str().unwrap().to_string();

    let project = app
        .wait_for_project_terminal(&project_id, PROCESSING_TIMEOUT)
        .await;

    // A gateway failure is never user-visible as a file error.
    assert_eq!(project["status"], "completed");
    let files = project["files"].as_array().unwrap();
    assert_eq!(files[0]["status"], "completed");

    let transactions = project["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0]["description"], FALLBACK_DESCRIPTION);

    app.cleanup().await;
}

#[tokio::test]
async fn gateway_rows_are_normalized_and_persisted() {
    let endpoint = spawn_stub_gateway(
        StatusCode::OK,
        json!({
            "extraction": {
                "transactions": [
                    {
                        "date": "2024-03-01",
                        "description": "CARD PURCHASE 1234",
                        "amount": -50.25,
                        "debit": null,
                        "credit": null,
                        "balance": 1200.50,
                        "currency": "USD"
                    },
                    {
                        "date": "2024-03-02",
                        "description": "PAYROLL ACME",
                        "amount": 2500.0,
                        "debit": null,
                        "credit": null,
                        "balance": 3700.75,
                        "currency": "USD"
                    }
                ]
            }
        }),
    )
    .await;

    let app = TestApp::spawn_with(move |config| {
        config.extraction.endpoint = endpoint;
        config.extraction.api_token = "live-token-4f3a2b1c".to_string();
    })
    .await;

    let response = app
        .upload(&[("march.pdf", b"%PDF-1.4 march")], None, None)
        .await;
    let body: serde_json::Value = response.json().await.unwrap();
    let project_id = body["id"].as_str().unwrap().to_string();

    let project = app
        .wait_for_project_terminal(&project_id, PROCESSING_TIMEOUT)
        .await;
    assert_eq!(project["status"], "completed");

    let mut transactions = project["transactions"].as_array().unwrap().clone();
    transactions.sort_by_key(|t| t["date"].as_str().unwrap().to_string());
    assert_eq!(transactions.len(), 2);

    // Signed amount becomes absolute with a derived debit
    assert_eq!(transactions[0]["description"], "CARD PURCHASE 1234");
    assert_eq!(transactions[0]["amount"], 50.25);
    assert_eq!(transactions[0]["debit"], 50.25);
    assert!(transactions[0]["credit"].is_null());

    // Positive amount becomes a credit
    assert_eq!(transactions[1]["amount"], 2500.0);
    assert!(transactions[1]["debit"].is_null());
    assert_eq!(transactions[1]["credit"], 2500.0);

    app.cleanup().await;
}

#[tokio::test]
async fn process_endpoint_requeues_pending_files() {
    // Workers off at submission so the files stay pending until the
    // explicit process trigger.
    let app = TestApp::spawn_with(|config| {
        config.worker.enabled = false;
    })
    .await;

    let response = app
        .upload(&[("march.pdf", b"%PDF-1.4 march")], None, None)
        .await;
    let body: serde_json::Value = response.json().await.unwrap();
    let project_id = body["id"].as_str().unwrap().to_string();

    let response = reqwest::Client::new()
        .post(format!("{}/projects/{}/process", app.address, project_id))
        .header("X-User-ID", TEST_USER_ID)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::OK, response.status());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);

    // With no worker running the file must sit in queued, one step past
    // pending, never regressing.
    let mut cursor = app
        .db
        .files()
        .find(doc! { "project_id": &project_id }, None)
        .await
        .unwrap();
    while let Some(file) = cursor.try_next().await.unwrap() {
        assert_eq!(file.status, FileStatus::Queued);
    }

    let project = app.get_project(&project_id).await;
    assert_eq!(project["files"][0]["progress"], 10);

    app.cleanup().await;
}
