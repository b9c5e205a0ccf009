//! Advisor/client/policy CRUD and trace lookup under `/advisor/...`
//! (§4.6/§6, supplemented per SPEC_FULL §6). Single-advisor-per-deployment:
//! every handler here operates on `state.config.advisor_id`.

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use shared::models::{AdvisorPolicyRecord, AdvisorRecord, ClientAccessState, ClientRecord, IntentExtractionMode, ResponseMode};
use uuid::Uuid;

use super::AppState;
use super::errors::{not_found, store_error_response};
use super::observability::RequestContext;

pub(super) async fn get_advisor(State(state): State<AppState>, Extension(req_ctx): Extension<RequestContext>) -> Response {
    match state.store.get_advisor(&state.config.advisor_id).await {
        Ok(Some(advisor)) => Json(advisor).into_response(),
        Ok(None) => not_found("No advisor is configured for this deployment", Some(&req_ctx.request_id)),
        Err(err) => store_error_response(err, &req_ctx.request_id),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct AdvisorUpdateRequest {
    display_name: String,
    email: String,
    advising_weekdays: Vec<String>,
    workday_start_hour: u8,
    workday_end_hour: u8,
    default_duration_minutes: u32,
    search_days: u32,
    max_suggestions: u32,
    time_zone: String,
}

pub(super) async fn put_advisor(
    State(state): State<AppState>,
    Extension(req_ctx): Extension<RequestContext>,
    Json(body): Json<AdvisorUpdateRequest>,
) -> Response {
    let advisor = AdvisorRecord {
        advisor_id: state.config.advisor_id.clone(),
        display_name: body.display_name,
        email: body.email,
        advising_weekdays: body.advising_weekdays,
        workday_start_hour: body.workday_start_hour,
        workday_end_hour: body.workday_end_hour,
        default_duration_minutes: body.default_duration_minutes,
        search_days: body.search_days,
        max_suggestions: body.max_suggestions,
        time_zone: body.time_zone,
    };

    match state.store.upsert_advisor(&advisor).await {
        Ok(()) => Json(advisor).into_response(),
        Err(err) => store_error_response(err, &req_ctx.request_id),
    }
}

pub(super) async fn get_advisor_policy(
    State(state): State<AppState>,
    Extension(req_ctx): Extension<RequestContext>,
) -> Response {
    match state.store.get_advisor_policy(&state.config.advisor_id).await {
        Ok(Some(policy)) => Json(policy).into_response(),
        Ok(None) => not_found("No policy is configured for this advisor", Some(&req_ctx.request_id)),
        Err(err) => store_error_response(err, &req_ctx.request_id),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct AdvisorPolicyUpdateRequest {
    #[serde(default)]
    advising_weekdays_preset: Option<Vec<String>>,
    intent_extraction_mode: IntentExtractionMode,
    response_mode: ResponseMode,
    llm_confidence_threshold: f64,
    ttl_minutes: u32,
}

pub(super) async fn put_advisor_policy(
    State(state): State<AppState>,
    Extension(req_ctx): Extension<RequestContext>,
    Json(body): Json<AdvisorPolicyUpdateRequest>,
) -> Response {
    let existing_policy_id = match state.store.get_advisor_policy(&state.config.advisor_id).await {
        Ok(existing) => existing.map(|policy| policy.policy_id),
        Err(err) => return store_error_response(err, &req_ctx.request_id),
    };

    let policy = AdvisorPolicyRecord {
        policy_id: existing_policy_id.unwrap_or_else(|| format!("policy_{}", Uuid::new_v4())),
        advisor_id: state.config.advisor_id.clone(),
        advising_weekdays_preset: body.advising_weekdays_preset,
        intent_extraction_mode: body.intent_extraction_mode,
        response_mode: body.response_mode,
        llm_confidence_threshold: body.llm_confidence_threshold,
        ttl_minutes: body.ttl_minutes,
    };

    match state.store.upsert_advisor_policy(&policy).await {
        Ok(()) => Json(policy).into_response(),
        Err(err) => store_error_response(err, &req_ctx.request_id),
    }
}

pub(super) async fn list_clients(
    State(state): State<AppState>,
    Extension(req_ctx): Extension<RequestContext>,
) -> Response {
    match state.store.list_clients(&state.config.advisor_id).await {
        Ok(clients) => Json(clients).into_response(),
        Err(err) => store_error_response(err, &req_ctx.request_id),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateClientRequest {
    email: String,
    display_name: String,
    #[serde(default)]
    advising_weekdays_override: Option<Vec<String>>,
}

pub(super) async fn create_client(
    State(state): State<AppState>,
    Extension(req_ctx): Extension<RequestContext>,
    Json(body): Json<CreateClientRequest>,
) -> Response {
    let client = ClientRecord {
        client_id: format!("client_{}", Uuid::new_v4()),
        advisor_id: state.config.advisor_id.clone(),
        email: body.email,
        display_name: body.display_name,
        access_state: ClientAccessState::Active,
        interaction_count: 0,
        advising_weekdays_override: body.advising_weekdays_override,
    };

    match state.store.upsert_client(&client).await {
        Ok(()) => Json(client).into_response(),
        Err(err) => store_error_response(err, &req_ctx.request_id),
    }
}

/// Sets the client's `accessState` to `blocked` rather than deleting the
/// row, so trace records referencing the client id remain valid.
pub(super) async fn block_client(
    State(state): State<AppState>,
    Extension(req_ctx): Extension<RequestContext>,
    Path(client_id): Path<String>,
) -> Response {
    match state.store.set_client_access_state(&client_id, ClientAccessState::Blocked).await {
        Ok(true) => Json(serde_json::json!({ "clientId": client_id, "accessState": "blocked" })).into_response(),
        Ok(false) => not_found("No client with that id exists", Some(&req_ctx.request_id)),
        Err(err) => store_error_response(err, &req_ctx.request_id),
    }
}

pub(super) async fn get_trace(
    State(state): State<AppState>,
    Extension(req_ctx): Extension<RequestContext>,
    Path(request_id): Path<String>,
) -> Response {
    match state.store.get_trace(&request_id).await {
        Ok(Some(trace)) => Json(trace).into_response(),
        Ok(None) => not_found("No trace with that request id exists", Some(&req_ctx.request_id)),
        Err(err) => store_error_response(err, &req_ctx.request_id),
    }
}
