mod support;

use serial_test::serial;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use shared::models::{AdvisorRecord, TraceRecord, TraceStatus};
use support::test_app::{TEST_ADVISOR_ID, TestAppBuilder};

fn sample_advisor() -> AdvisorRecord {
    AdvisorRecord {
        advisor_id: TEST_ADVISOR_ID.to_string(),
        display_name: "Jordan Advisor".to_string(),
        email: "jordan@example.com".to_string(),
        advising_weekdays: vec!["Mon".to_string()],
        workday_start_hour: 9,
        workday_end_hour: 17,
        default_duration_minutes: 30,
        search_days: 14,
        max_suggestions: 3,
        time_zone: "UTC".to_string(),
    }
}

fn sample_trace() -> TraceRecord {
    TraceRecord {
        request_id: "req-1".to_string(),
        response_id: "resp-1".to_string(),
        advisor_id: TEST_ADVISOR_ID.to_string(),
        status: TraceStatus::Ok,
        stage: Some("completed".to_string()),
        intent_source: None,
        llm_status: None,
        suggestion_count: 2,
        delivery_status: Some("logged".to_string()),
        access_state: None,
        link_ttl_minutes: Some(60),
        latency_ms: 12,
        feedback_count: 0,
        created_at: chrono::Utc::now(),
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
    let parsed: Value = serde_json::from_slice(&bytes).expect("response body should be valid json");
    (status, parsed)
}

#[tokio::test]
#[serial]
async fn feedback_against_a_known_request_response_pair_is_recorded() {
    let store = support::test_store().await;
    support::reset_database(store.pool()).await;
    store.upsert_advisor(&sample_advisor()).await.expect("advisor upsert");
    store.insert_trace(&sample_trace()).await.expect("trace insert");

    let app = TestAppBuilder::new().build(store.clone());

    let (status, body) = post_json(
        &app,
        "/spike/feedback",
        json!({
            "request_id": "req-1",
            "response_id": "resp-1",
            "feedback_type": "helpful",
            "feedback_reason": "other",
            "feedback_source": "client"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"].as_str(), Some("recorded"));

    let trace = store.get_trace("req-1").await.expect("trace lookup").expect("trace row");
    assert_eq!(trace.feedback_count, 1);
}

#[tokio::test]
#[serial]
async fn feedback_against_an_unknown_pair_returns_not_found() {
    let store = support::test_store().await;
    support::reset_database(store.pool()).await;

    let app = TestAppBuilder::new().build(store);

    let (status, _body) = post_json(
        &app,
        "/spike/feedback",
        json!({
            "request_id": "missing-req",
            "response_id": "missing-resp",
            "feedback_type": "incorrect",
            "feedback_reason": "availability_mismatch",
            "feedback_source": "advisor"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
