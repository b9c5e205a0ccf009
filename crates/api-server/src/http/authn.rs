//! Portal Router auth (§4.6): three modes — `none`, `secret_basic`
//! (constant-time HTTP Basic check against a configured secret), and
//! `google_oauth` (a signed session cookie issued by [`super::oauth`]).
//! API callers under `/advisor/...` get a 401 on failure; browser
//! navigations (an `Accept: text/html` `GET`) are redirected to the OAuth
//! start route instead, per §4.6's "on absence redirect browser to
//! `/advisor/auth/google/start?returnTo=...`" note.

use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use shared::config::AuthMode;
use url::form_urlencoded;

use super::AppState;
use super::errors::unauthorized;
use super::oauth::verify_session_cookie;

fn wants_html(req: &Request) -> bool {
    req.method() == Method::GET
        && req
            .headers()
            .get(header::ACCEPT)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.contains("text/html"))
            .unwrap_or(false)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

fn check_secret_basic(req: &Request, username: &str, password: &str) -> bool {
    let Some(header_value) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    else {
        return false;
    };

    let Some(encoded) = header_value.strip_prefix("Basic ") else {
        return false;
    };

    let Ok(decoded) = BASE64_STANDARD.decode(encoded.trim()) else {
        return false;
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return false;
    };
    let Some((supplied_user, supplied_pass)) = decoded.split_once(':') else {
        return false;
    };

    constant_time_eq(supplied_user, username) && constant_time_eq(supplied_pass, password)
}

fn redirect_to_login(req: &Request) -> Response {
    let return_to = req.uri().path_and_query().map(|pq| pq.as_str()).unwrap_or("/advisor");
    let encoded: String = form_urlencoded::byte_serialize(return_to.as_bytes()).collect();
    Redirect::to(&format!("/advisor/auth/google/start?returnTo={encoded}")).into_response()
}

pub(super) async fn require_portal_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let authorized = match state.config.auth_mode {
        AuthMode::None => true,
        AuthMode::SecretBasic => {
            let Some((username, password)) = state.config.basic_auth_credentials() else {
                return unauthorized("secret_basic auth mode is misconfigured");
            };
            check_secret_basic(&req, username, password)
        }
        AuthMode::GoogleOauth => {
            let cookie_header = req
                .headers()
                .get(header::COOKIE)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("");
            verify_session_cookie(cookie_header, &state.config.session_signing_key).is_some()
        }
    };

    if authorized {
        return next.run(req).await;
    }

    if state.config.auth_mode == AuthMode::GoogleOauth && wants_html(&req) {
        return redirect_to_login(&req);
    }

    let mut response = unauthorized("Missing or invalid portal credentials");
    if state.config.auth_mode == AuthMode::SecretBasic {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Basic realm=\"advisor portal\""));
        *response.status_mut() = StatusCode::UNAUTHORIZED;
    }
    response
}
