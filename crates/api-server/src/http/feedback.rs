//! `POST /spike/feedback` (§4.5's feedback path).

use axum::Json;
use axum::extract::{Extension, State};
use axum::response::{IntoResponse, Response};
use shared::models::FeedbackRequest;
use shared::orchestrator;

use super::AppState;
use super::errors::orchestrator_error_response;
use super::observability::RequestContext;

pub(super) async fn handle_feedback(
    State(state): State<AppState>,
    Extension(req_ctx): Extension<RequestContext>,
    Json(payload): Json<FeedbackRequest>,
) -> Response {
    match orchestrator::process_feedback(&state.store, &payload).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => orchestrator_error_response(err, &req_ctx.request_id),
    }
}
