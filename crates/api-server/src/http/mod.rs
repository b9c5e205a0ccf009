use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::{Router, middleware};
use shared::collaborators::Collaborators;
use shared::config::ApiConfig;
use shared::repos::Store;
use tera::Tera;

mod authn;
mod availability;
mod email;
mod errors;
mod feedback;
mod health;
mod oauth;
mod observability;
mod path_normalize;
mod portal;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub collaborators: Arc<Collaborators>,
    pub config: Arc<ApiConfig>,
    pub http_client: reqwest::Client,
    pub templates: Arc<Tera>,
}

/// Routes under `/advisor/...` other than the OAuth entry points require
/// portal auth (§4.6); the webhook paths (`/spike/...`) and the
/// token-gated `/availability` view authenticate by other means and stay
/// outside this layer.
pub fn build_router(app_state: AppState) -> Router {
    let portal_routes = Router::new()
        .route("/advisor", get(portal::get_advisor).put(portal::put_advisor))
        .route(
            "/advisor/policy",
            get(portal::get_advisor_policy).put(portal::put_advisor_policy),
        )
        .route(
            "/advisor/clients",
            get(portal::list_clients).post(portal::create_client),
        )
        .route("/advisor/clients/{id}", delete(portal::block_client))
        .route("/advisor/traces/{requestId}", get(portal::get_trace))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            authn::require_portal_auth,
        ));

    let oauth_routes = Router::new()
        .route("/advisor/auth/google/start", get(oauth::start_google_oauth))
        .route(
            "/advisor/auth/google/callback",
            get(oauth::google_oauth_callback),
        );

    let public_routes = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/spike/email", post(email::handle_incoming_email))
        .route("/spike/feedback", post(feedback::handle_feedback))
        .route("/availability", get(availability::render_availability));

    public_routes
        .merge(oauth_routes)
        .merge(portal_routes)
        .with_state(app_state.clone())
        .layer(middleware::from_fn_with_state(
            app_state,
            path_normalize::strip_stage_prefix_middleware,
        ))
        .layer(middleware::from_fn(
            observability::request_observability_middleware,
        ))
}
