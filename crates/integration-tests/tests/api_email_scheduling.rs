mod support;

use serial_test::serial;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use shared::models::{AdvisorRecord, ClientAccessState, ClientRecord};
use support::test_app::{TEST_ADVISOR_ID, TestAppBuilder};

fn sample_advisor() -> AdvisorRecord {
    AdvisorRecord {
        advisor_id: TEST_ADVISOR_ID.to_string(),
        display_name: "Jordan Advisor".to_string(),
        email: "jordan@example.com".to_string(),
        advising_weekdays: vec![
            "Mon".to_string(),
            "Tue".to_string(),
            "Wed".to_string(),
            "Thu".to_string(),
            "Fri".to_string(),
            "Sat".to_string(),
            "Sun".to_string(),
        ],
        workday_start_hour: 9,
        workday_end_hour: 17,
        default_duration_minutes: 30,
        search_days: 14,
        max_suggestions: 3,
        time_zone: "UTC".to_string(),
    }
}

async fn post_json(app: &axum::Router, path: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::post(path)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: Value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body should be valid json")
    };
    (status, parsed)
}

#[tokio::test]
#[serial]
async fn incoming_email_with_no_parseable_window_scans_the_full_search_range() {
    let store = support::test_store().await;
    support::reset_database(store.pool()).await;
    store.upsert_advisor(&sample_advisor()).await.expect("advisor upsert");

    let app = TestAppBuilder::new().build(store.clone());

    let (status, body) = post_json(
        &app,
        "/spike/email",
        json!({
            "fromEmail": "client@example.com",
            "subject": "Scheduling",
            "body": "Hi, could we find some time to chat sometime soon?",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["suggestionCount"].as_u64(), None); // wire format is snake_case, not camelCase
    assert_eq!(body["suggestion_count"].as_u64(), Some(3));
    assert_eq!(body["delivery_status"].as_str(), Some("logged"));
    assert!(body["access_denied"].is_null());

    let request_id = body["request_id"].as_str().expect("request_id present").to_string();
    let trace = store.get_trace(&request_id).await.expect("trace lookup").expect("trace row");
    assert_eq!(trace.suggestion_count, 3);
}

#[tokio::test]
#[serial]
async fn incoming_email_rejects_a_duration_over_the_configured_maximum() {
    let store = support::test_store().await;
    support::reset_database(store.pool()).await;
    store.upsert_advisor(&sample_advisor()).await.expect("advisor upsert");

    let app = TestAppBuilder::new()
        .with_config(|config| config.max_duration_minutes = 60)
        .build(store);

    let (status, body) = post_json(
        &app,
        "/spike/email",
        json!({
            "fromEmail": "client@example.com",
            "subject": "Scheduling",
            "body": "Can we do a 90 minute deep dive sometime this week?",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("exceeds configured maximum"));
}

#[tokio::test]
#[serial]
async fn incoming_email_from_a_blocked_client_is_logged_and_denied() {
    let store = support::test_store().await;
    support::reset_database(store.pool()).await;
    store.upsert_advisor(&sample_advisor()).await.expect("advisor upsert");
    store
        .upsert_client(&ClientRecord {
            client_id: "client-blocked".to_string(),
            advisor_id: TEST_ADVISOR_ID.to_string(),
            email: "blocked@example.com".to_string(),
            display_name: "Blocked Client".to_string(),
            access_state: ClientAccessState::Blocked,
            interaction_count: 0,
            advising_weekdays_override: None,
        })
        .await
        .expect("client upsert");

    let app = TestAppBuilder::new().build(store);

    let (status, body) = post_json(
        &app,
        "/spike/email",
        json!({
            "fromEmail": "blocked@example.com",
            "subject": "Scheduling",
            "body": "Can we meet?",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["access_denied"].as_bool(), Some(true));
    assert_eq!(body["access_state"].as_str(), Some("blocked"));
    assert_eq!(body["suggestion_count"].as_u64(), Some(0));
}

#[tokio::test]
#[serial]
async fn incoming_email_rejects_a_missing_from_address() {
    let store = support::test_store().await;
    support::reset_database(store.pool()).await;
    store.upsert_advisor(&sample_advisor()).await.expect("advisor upsert");

    let app = TestAppBuilder::new().build(store);

    let (status, _body) = post_json(
        &app,
        "/spike/email",
        json!({
            "subject": "Scheduling",
            "body": "Can we meet?",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}
