mod common;

use axum::http::StatusCode;
use common::{TestApp, TEST_USER_ID};
use mongodb::bson::doc;
use serde_json::json;
use statement_service::models::ReviewStatus;
use std::time::Duration;

const PROCESSING_TIMEOUT: Duration = Duration::from_secs(15);

async fn first_transaction_id(app: &TestApp) -> String {
    let response = app
        .upload(&[("march.pdf", b"%PDF-1.4 march")], None, None)
        .await;
    let body: serde_json::Value = response.json().await.unwrap();
    let project_id = body["id"].as_str().unwrap().to_string();
    let project = app
        .wait_for_project_terminal(&project_id, PROCESSING_TIMEOUT)
        .await;
    project["transactions"][0]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn review_edit_updates_fields_but_not_parentage() {
    let app = TestApp::spawn().await;
    let transaction_id = first_transaction_id(&app).await;

    let original = app
        .db
        .transactions()
        .find_one(doc! { "_id": &transaction_id }, None)
        .await
        .unwrap()
        .expect("Transaction not found in DB");

    let response = reqwest::Client::new()
        .patch(format!("{}/transactions/{}", app.address, transaction_id))
        .header("X-User-ID", TEST_USER_ID)
        .json(&json!({
            "category": "Office Supplies",
            "review_status": "verified",
            "description": "Staples order #4411"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::OK, response.status());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["category"], "Office Supplies");
    assert_eq!(body["review_status"], "verified");
    assert_eq!(body["description"], "Staples order #4411");

    let updated = app
        .db
        .transactions()
        .find_one(doc! { "_id": &transaction_id }, None)
        .await
        .unwrap()
        .expect("Transaction not found in DB");
    assert_eq!(updated.category.as_deref(), Some("Office Supplies"));
    assert_eq!(updated.review_status, Some(ReviewStatus::Verified));
    // Parentage is immutable
    assert_eq!(updated.file_id, original.file_id);

    app.cleanup().await;
}

#[tokio::test]
async fn review_edit_accepts_plain_dates() {
    let app = TestApp::spawn().await;
    let transaction_id = first_transaction_id(&app).await;

    let response = reqwest::Client::new()
        .patch(format!("{}/transactions/{}", app.address, transaction_id))
        .header("X-User-ID", TEST_USER_ID)
        .json(&json!({ "date": "2024-06-30" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::OK, response.status());
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["date"].as_str().unwrap().starts_with("2024-06-30"));

    app.cleanup().await;
}

#[tokio::test]
async fn empty_review_edit_is_rejected() {
    let app = TestApp::spawn().await;
    let transaction_id = first_transaction_id(&app).await;

    let response = reqwest::Client::new()
        .patch(format!("{}/transactions/{}", app.address, transaction_id))
        .header("X-User-ID", TEST_USER_ID)
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::BAD_REQUEST, response.status());

    app.cleanup().await;
}

#[tokio::test]
async fn invalid_currency_is_rejected() {
    let app = TestApp::spawn().await;
    let transaction_id = first_transaction_id(&app).await;

    let response = reqwest::Client::new()
        .patch(format!("{}/transactions/{}", app.address, transaction_id))
        .header("X-User-ID", TEST_USER_ID)
        .json(&json!({ "currency": "US" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::UNPROCESSABLE_ENTITY, response.status());

    app.cleanup().await;
}

#[tokio::test]
async fn editing_unknown_transaction_is_404() {
    let app = TestApp::spawn().await;

    let response = reqwest::Client::new()
        .patch(format!("{}/transactions/{}", app.address, "no-such-id"))
        .header("X-User-ID", TEST_USER_ID)
        .json(&json!({ "category": "Travel" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::NOT_FOUND, response.status());

    app.cleanup().await;
}
