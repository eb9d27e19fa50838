use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::helpers::{TestApp, CLIENT_TOKEN};

async fn assert_response(
    problem: &str,
    expected_status: StatusCode,
    expected_body: Value,
    response: reqwest::Response,
) {
    let status = response.status();
    assert_eq!(
        Some("application/json"),
        response
            .headers()
            .get("content-type")
            .and_then(|value| value.to_str().ok()),
        "response to {problem} was not JSON",
    );
    let body: Value = response.json().await.expect("response body was not JSON");
    assert_eq!(
        (expected_status, &expected_body),
        (status, &body),
        "unexpected response when the payload was {problem}",
    );
}

#[tokio::test]
async fn subscribe_returns_200_and_stores_normalized_email() {
    let app = TestApp::spawn().await;

    let response = app.subscribe("User@Example.com ", CLIENT_TOKEN).await;

    assert_response(
        "valid",
        StatusCode::OK,
        json!({ "success": true, "message": "Successfully subscribed to newsletter" }),
        response,
    )
    .await;

    let stored = app.stored_emails().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].email, "user@example.com");
    assert!(!stored[0].is_confirmed);
    assert!(stored[0].updated_at.is_none());
    assert!(stored[0].confirmed_at.is_none());
    assert!(stored[0].created_at <= time::OffsetDateTime::now_utc());
}

#[tokio::test]
async fn repeated_subscription_returns_400() {
    let app = TestApp::spawn().await;

    app.subscribe("User@Example.com ", CLIENT_TOKEN).await;
    let response = app.subscribe("User@Example.com ", CLIENT_TOKEN).await;

    assert_response(
        "a repeat",
        StatusCode::BAD_REQUEST,
        json!({ "success": false, "error": "email already subscribed" }),
        response,
    )
    .await;
    assert_eq!(app.stored_emails().await.len(), 1);
}

#[tokio::test]
async fn case_and_whitespace_variants_are_duplicates() {
    let app = TestApp::spawn().await;

    app.subscribe("ursula@earthsea.org", CLIENT_TOKEN).await;
    let response = app.subscribe("\tURSULA@EarthSea.org  ", CLIENT_TOKEN).await;

    assert_response(
        "a case variant",
        StatusCode::BAD_REQUEST,
        json!({ "success": false, "error": "email already subscribed" }),
        response,
    )
    .await;
    assert_eq!(app.stored_emails().await.len(), 1);
}

#[tokio::test]
async fn concurrent_duplicates_store_one_row() {
    let app = TestApp::spawn().await;

    let attempts = (0..10).map(|_| app.subscribe("tenar@atuan.net", CLIENT_TOKEN));
    let responses = futures::future::join_all(attempts).await;

    let mut created = 0;
    for response in responses {
        match response.status() {
            StatusCode::OK => created += 1,
            StatusCode::BAD_REQUEST => {
                let body: Value = response.json().await.unwrap();
                assert_eq!(body["error"], "email already subscribed");
            }
            status => panic!("unexpected status {}: {:?}", status, response.text().await),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(app.stored_emails().await.len(), 1);
}

#[tokio::test]
async fn invalid_fields_return_400() {
    let app = TestApp::spawn().await;
    let long_email = format!("{}@example.com", "a".repeat(250));
    let cases = [
        ("an empty email", "", CLIENT_TOKEN, "email: email is required"),
        (
            "an overlong email",
            long_email.as_str(),
            CLIENT_TOKEN,
            "email: email is too long (max 254 characters)",
        ),
        (
            "not an email",
            "not-an-email",
            CLIENT_TOKEN,
            "email: invalid email format",
        ),
        (
            "an email without a tld",
            "ursula@earthsea",
            CLIENT_TOKEN,
            "email: invalid email format",
        ),
        (
            "a missing token",
            "ursula@earthsea.org",
            "",
            "clientToken: clientToken is required",
        ),
        (
            "a wrong token",
            "ursula@earthsea.org",
            "not-the-token",
            "clientToken: invalid clientToken",
        ),
    ];

    for (problem, email, token, error) in cases {
        let response = app.subscribe(email, token).await;

        assert_response(
            problem,
            StatusCode::BAD_REQUEST,
            json!({ "success": false, "error": error }),
            response,
        )
        .await;
    }
    assert!(app.stored_emails().await.is_empty());
}

#[tokio::test]
async fn malformed_body_returns_400() {
    let app = TestApp::spawn().await;
    let cases = [
        ("truncated JSON", r#"{"email": "ursula@earthsea.org""#),
        ("plain text", "email=ursula@earthsea.org"),
        ("a number email", r#"{"email": 7, "clientToken": "x"}"#),
    ];

    for (problem, body) in cases {
        let response = app.post_subscribe(body).await;

        assert_response(
            problem,
            StatusCode::BAD_REQUEST,
            json!({ "success": false, "error": "Invalid request body" }),
            response,
        )
        .await;
    }
}

#[tokio::test]
async fn storage_failure_returns_500_without_detail() {
    let app = TestApp::spawn().await;
    sqlx::query("DROP TABLE emails")
        .execute(&app.pool)
        .await
        .expect("failed to drop table");

    let response = app.subscribe("ursula@earthsea.org", CLIENT_TOKEN).await;

    assert_response(
        "valid, with storage gone",
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "success": false, "error": "Internal server error" }),
        response,
    )
    .await;
}

#[tokio::test]
async fn capitalized_keys_and_trailing_data_are_accepted() {
    let app = TestApp::spawn().await;
    let body = format!(
        r#"{{"Email": "ogion@gont.org", "ClientToken": "{}"}}
        {{"email": "ignored@gont.org"}}"#,
        CLIENT_TOKEN
    );

    let response = app.post_subscribe(body).await;

    assert_response(
        "capitalized keys and a second value",
        StatusCode::OK,
        json!({ "success": true, "message": "Successfully subscribed to newsletter" }),
        response,
    )
    .await;
    let stored = app.stored_emails().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].email, "ogion@gont.org");
}
