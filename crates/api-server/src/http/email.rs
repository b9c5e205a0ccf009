//! `POST /spike/email` (§4.5/§6): loads the single deployment advisor plus
//! the client record (if any) for the normalized `fromEmail`, then hands
//! everything to [`shared::orchestrator::process`].

use axum::Json;
use axum::extract::{Extension, State};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use shared::models::IncomingEmailRequest;
use shared::orchestrator::{self, ProcessContext};
use tracing::error;

use super::AppState;
use super::errors::{bad_request, internal_error, orchestrator_error_response};
use super::observability::RequestContext;

/// Fills `fromEmail`/`subject` from the SES webhook envelope's
/// `mail.commonHeaders` when the caller didn't supply them directly —
/// the SES notification delivery shape described in §6.
fn apply_ses_envelope(mut request: IncomingEmailRequest) -> IncomingEmailRequest {
    let Some(envelope) = request.ses.as_ref() else {
        return request;
    };
    let Some(headers) = envelope.mail.as_ref().and_then(|mail| mail.common_headers.as_ref()) else {
        return request;
    };

    if request.from_email.is_none() {
        request.from_email = headers.from.first().cloned();
    }
    if request.subject.is_none() {
        request.subject = headers.subject.clone();
    }

    request
}

pub(super) async fn handle_incoming_email(
    State(state): State<AppState>,
    Extension(req_ctx): Extension<RequestContext>,
    Json(request): Json<IncomingEmailRequest>,
) -> Response {
    let request = apply_ses_envelope(request);
    let request_id = req_ctx.request_id;

    let Some(from_email) = request.from_email.as_deref().and_then(orchestrator::normalize_from_email) else {
        return bad_request("fromEmail is required and must contain an email address", Some(&request_id));
    };

    let advisor = match state.store.get_advisor(&state.config.advisor_id).await {
        Ok(Some(advisor)) => advisor,
        Ok(None) => {
            error!(advisor_id = %state.config.advisor_id, "configured advisor record is missing");
            return internal_error("Advisor is not configured", Some(&request_id));
        }
        Err(err) => return orchestrator_error_response(err.into(), &request_id),
    };

    let client = match state.store.find_client_by_email(&advisor.advisor_id, &from_email).await {
        Ok(client) => client,
        Err(err) => return orchestrator_error_response(err.into(), &request_id),
    };

    let policy = match state.store.get_advisor_policy(&advisor.advisor_id).await {
        Ok(policy) => policy,
        Err(err) => return orchestrator_error_response(err.into(), &request_id),
    };

    let ctx = ProcessContext {
        request: &request,
        advisor: &advisor,
        client: client.as_ref(),
        policy: policy.as_ref(),
        config: &state.config,
        collaborators: &state.collaborators,
        store: &state.store,
        now: Utc::now(),
        request_id: request_id.clone(),
    };

    match orchestrator::process(ctx).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => orchestrator_error_response(err, &request_id),
    }
}
