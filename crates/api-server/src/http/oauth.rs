//! Google OAuth start/callback for `AuthMode::GoogleOauth` (§4.6): stores a
//! one-time nonce in the key-value store, exchanges the authorization code
//! for tokens, confirms the advisor's email is on the authorised list, and
//! issues a 12-hour signed session cookie.

use axum::extract::{Query, State};
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Redirect, Response};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use super::AppState;
use super::errors::{bad_request, internal_error, unauthorized};

const SESSION_COOKIE_NAME: &str = "advisor_portal_session";
const OAUTH_NONCE_PARTITION: &str = "oauth-nonce";
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

#[derive(Debug, Deserialize)]
pub(super) struct StartQuery {
    #[serde(rename = "returnTo")]
    return_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Serialize)]
struct SessionClaims {
    advisor_id: String,
    exp: i64,
}

pub(super) fn sign_session_cookie(advisor_id: &str, signing_key: &str, ttl_hours: i64) -> String {
    let claims = SessionClaims {
        advisor_id: advisor_id.to_string(),
        exp: (Utc::now() + Duration::hours(ttl_hours)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(signing_key.as_bytes()),
    )
    .expect("session claims always encode")
}

/// Returns the advisor id carried by a valid, unexpired session cookie, or
/// `None` on any decode/verification failure.
pub(super) fn verify_session_cookie(cookie_header: &str, signing_key: &str) -> Option<String> {
    let token = cookie_header
        .split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix(&format!("{SESSION_COOKIE_NAME}=")))?;

    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(signing_key.as_bytes()),
        &Validation::default(),
    )
    .ok()?;

    Some(data.claims.advisor_id)
}

fn session_cookie_header(value: &str, ttl_hours: i64) -> HeaderValue {
    let max_age_seconds = ttl_hours.max(0) * 3600;
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE_NAME}={value}; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age={max_age_seconds}"
    ))
    .expect("cookie header is always valid ascii")
}

pub(super) async fn start_google_oauth(
    State(state): State<AppState>,
    Query(query): Query<StartQuery>,
) -> Response {
    let Some(google_oauth) = state.config.google_oauth.as_ref() else {
        return bad_request("Google OAuth is not configured for this deployment", None);
    };

    let return_to = query.return_to.unwrap_or_else(|| "/advisor".to_string());
    let nonce = Uuid::new_v4().to_string();

    let stored = state
        .collaborators
        .kv_store
        .put_if_absent(
            OAUTH_NONCE_PARTITION,
            &nonce,
            json!({ "returnTo": return_to }),
            state.config.oauth_state_ttl_seconds,
        )
        .await;

    match stored {
        Ok(true) => {}
        Ok(false) => return internal_error("Could not allocate an OAuth state nonce", None),
        Err(err) => {
            warn!(error = %err, "oauth nonce store failed");
            return internal_error("OAuth start failed", None);
        }
    }

    let authorize_url = format!(
        "{GOOGLE_AUTH_URL}?client_id={}&redirect_uri={}&response_type=code&scope=openid%20email&state={nonce}&access_type=online&prompt=select_account",
        urlencoding_component(&google_oauth.client_id),
        urlencoding_component(&google_oauth.redirect_uri),
    );

    Redirect::to(&authorize_url).into_response()
}

pub(super) async fn google_oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Some(google_oauth) = state.config.google_oauth.as_ref() else {
        return bad_request("Google OAuth is not configured for this deployment", None);
    };

    let (Some(code), Some(oauth_state)) = (query.code, query.state) else {
        return bad_request("Missing code or state parameter", None);
    };

    let nonce_record = match state.collaborators.kv_store.get(OAUTH_NONCE_PARTITION, &oauth_state).await {
        Ok(Some(value)) => value,
        Ok(None) => return unauthorized("OAuth state is unknown or expired"),
        Err(err) => {
            warn!(error = %err, "oauth nonce lookup failed");
            return internal_error("OAuth callback failed", None);
        }
    };
    let _ = state
        .collaborators
        .kv_store
        .delete(OAUTH_NONCE_PARTITION, &oauth_state)
        .await;

    let return_to = nonce_record
        .get("returnTo")
        .and_then(|v| v.as_str())
        .unwrap_or("/advisor")
        .to_string();

    let token_response = state
        .http_client
        .post(GOOGLE_TOKEN_URL)
        .form(&[
            ("code", code.as_str()),
            ("client_id", google_oauth.client_id.as_str()),
            ("client_secret", google_oauth.client_secret.as_str()),
            ("redirect_uri", google_oauth.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await;

    let access_token = match token_response {
        Ok(response) if response.status().is_success() => {
            match response.json::<GoogleTokenResponse>().await {
                Ok(parsed) => parsed.access_token,
                Err(err) => {
                    warn!(error = %err, "google token response decode failed");
                    return internal_error("OAuth callback failed", None);
                }
            }
        }
        Ok(response) => {
            warn!(status = %response.status(), "google token exchange rejected");
            return unauthorized("Google rejected the authorization code");
        }
        Err(err) => {
            warn!(error = %err, "google token exchange request failed");
            return internal_error("OAuth callback failed", None);
        }
    };

    let userinfo = state
        .http_client
        .get(GOOGLE_USERINFO_URL)
        .bearer_auth(&access_token)
        .send()
        .await;

    let email = match userinfo {
        Ok(response) if response.status().is_success() => {
            match response.json::<GoogleUserInfo>().await {
                Ok(parsed) => parsed.email,
                Err(err) => {
                    warn!(error = %err, "google userinfo decode failed");
                    return internal_error("OAuth callback failed", None);
                }
            }
        }
        _ => return internal_error("OAuth callback failed", None),
    };

    let authorized = google_oauth
        .authorized_advisor_emails
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&email));

    if !authorized {
        return unauthorized("This Google account is not authorised for this advisor portal");
    }

    let cookie_value = sign_session_cookie(
        &state.config.advisor_id,
        &state.config.session_signing_key,
        state.config.session_ttl_hours,
    );

    let mut response = Redirect::to(&return_to).into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        session_cookie_header(&cookie_value, state.config.session_ttl_hours),
    );
    response
}

fn urlencoding_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_round_trips() {
        let token = sign_session_cookie("advisor-1", "signing-key", 12);
        let cookie_header = format!("{SESSION_COOKIE_NAME}={token}; Path=/");
        let advisor_id = verify_session_cookie(&cookie_header, "signing-key").expect("verifies");
        assert_eq!(advisor_id, "advisor-1");
    }

    #[test]
    fn session_cookie_rejects_wrong_key() {
        let token = sign_session_cookie("advisor-1", "signing-key", 12);
        let cookie_header = format!("{SESSION_COOKIE_NAME}={token}");
        assert!(verify_session_cookie(&cookie_header, "different-key").is_none());
    }

    #[test]
    fn missing_cookie_is_rejected() {
        assert!(verify_session_cookie("other_cookie=value", "signing-key").is_none());
    }
}
