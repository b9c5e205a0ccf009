//! Maps the core's error kinds (spec §7) onto HTTP responses at the edge.
//! Handlers never forward `OrchestratorError`/`StoreError` display text
//! straight to a client body beyond the stable message strings below —
//! no stack traces, no internal detail.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use shared::models::{ErrorBody, ErrorResponse};
use shared::orchestrator::OrchestratorError;
use shared::repos::StoreError;
use tracing::error;

pub(super) fn error_body(message: &str, request_id: Option<&str>) -> Json<ErrorResponse> {
    Json(ErrorResponse {
        error: ErrorBody {
            message: message.to_string(),
            request_id: request_id.map(str::to_string),
        },
    })
}

pub(super) fn bad_request(message: &str, request_id: Option<&str>) -> Response {
    (StatusCode::BAD_REQUEST, error_body(message, request_id)).into_response()
}

pub(super) fn not_found(message: &str, request_id: Option<&str>) -> Response {
    (StatusCode::NOT_FOUND, error_body(message, request_id)).into_response()
}

pub(super) fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, error_body(message, None)).into_response()
}

/// §7: the public availability view renders a 403 HTML page rather than a
/// JSON body when the token is missing, expired, or invalid.
pub(super) fn access_denied_html() -> Response {
    (
        StatusCode::FORBIDDEN,
        Html(
            "<!doctype html><html><body><h1>Link expired or invalid</h1>\
             <p>This availability link is no longer valid. Ask your advisor to send a new one.</p>\
             </body></html>"
                .to_string(),
        ),
    )
        .into_response()
}

pub(super) fn internal_error(message: &str, request_id: Option<&str>) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        error_body(message, request_id),
    )
        .into_response()
}

pub(super) fn store_error_response(err: StoreError, request_id: &str) -> Response {
    error!(error = %err, request_id, "store operation failed");
    internal_error("Unexpected server error", Some(request_id))
}

/// §7's error-kind table: Validation -> 400, CalendarLookupFailed /
/// TokenAllocationFailed -> 500, Store -> 500, FeedbackNotFound -> 404.
pub(super) fn orchestrator_error_response(err: OrchestratorError, request_id: &str) -> Response {
    match err {
        OrchestratorError::Validation(message) => bad_request(&message, Some(request_id)),
        OrchestratorError::CalendarLookupFailed(detail) => {
            error!(error = %detail, request_id, stage = "calendar_lookup", "calendar lookup failed");
            internal_error("Calendar lookup failed", Some(request_id))
        }
        OrchestratorError::TokenAllocationFailed(detail) => {
            error!(error = %detail, request_id, "availability link token allocation failed");
            internal_error("Could not allocate an availability link", Some(request_id))
        }
        OrchestratorError::Store(inner) => store_error_response(inner, request_id),
        OrchestratorError::FeedbackNotFound => {
            not_found("No matching request/response pair was found", Some(request_id))
        }
    }
}
