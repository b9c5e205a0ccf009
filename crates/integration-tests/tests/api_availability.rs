mod support;

use serial_test::serial;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use tower::ServiceExt;

use shared::hmac_token;
use shared::models::{AdvisorRecord, LegacyTokenPayload};
use support::test_app::{TEST_ADVISOR_ID, TEST_HMAC_SIGNING_KEY, TestAppBuilder};

fn sample_advisor() -> AdvisorRecord {
    AdvisorRecord {
        advisor_id: TEST_ADVISOR_ID.to_string(),
        display_name: "Jordan Advisor".to_string(),
        email: "jordan@example.com".to_string(),
        advising_weekdays: vec!["Mon".to_string(), "Tue".to_string(), "Wed".to_string()],
        workday_start_hour: 9,
        workday_end_hour: 17,
        default_duration_minutes: 30,
        search_days: 14,
        max_suggestions: 3,
        time_zone: "UTC".to_string(),
    }
}

fn legacy_token() -> String {
    let now_ms = Utc::now().timestamp_millis();
    let payload = LegacyTokenPayload {
        advisor_id: TEST_ADVISOR_ID.to_string(),
        issued_at_ms: now_ms,
        expires_at_ms: now_ms + 60 * 60 * 1000,
        client_timezone: Some("America/New_York".to_string()),
        duration_minutes: Some(30),
    };
    hmac_token::sign(&payload, TEST_HMAC_SIGNING_KEY).expect("token signs")
}

#[tokio::test]
#[serial]
async fn availability_view_renders_the_grid_for_a_valid_legacy_token() {
    let store = support::test_store().await;
    support::reset_database(store.pool()).await;
    store.upsert_advisor(&sample_advisor()).await.expect("advisor upsert");

    let app = TestAppBuilder::new().build(store);
    let token = legacy_token();

    let response = app
        .oneshot(
            Request::get(format!("/availability?t={token}&for=client-ref"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("Jordan Advisor"));
}

#[tokio::test]
#[serial]
async fn availability_view_denies_a_missing_token() {
    let store = support::test_store().await;
    support::reset_database(store.pool()).await;
    store.upsert_advisor(&sample_advisor()).await.expect("advisor upsert");

    let app = TestAppBuilder::new().build(store);

    let response = app
        .oneshot(Request::get("/availability").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[serial]
async fn availability_view_denies_a_tampered_token() {
    let store = support::test_store().await;
    support::reset_database(store.pool()).await;
    store.upsert_advisor(&sample_advisor()).await.expect("advisor upsert");

    let app = TestAppBuilder::new().build(store);
    let mut token = legacy_token();
    token.push('x');

    let response = app
        .oneshot(
            Request::get(format!("/availability?t={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
