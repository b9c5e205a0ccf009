#![allow(dead_code)]

use std::net::IpAddr;
use std::sync::Arc;

use scheduler_api::http::{AppState, build_router};
use shared::collaborators::{CalendarProvider, Collaborators, LlmClient};
use shared::config::{ApiConfig, AuthMode, CalendarMode, IntentExtractionMode, ResponseMode};
use shared::providers::{raw_email, secrets};
use shared::repos::Store;
use tera::Tera;

use super::fakes::{InMemoryKeyValueStore, RecordingMailer, StubCalendarProvider, StubLlmClient};

pub const TEST_ADVISOR_ID: &str = "advisor-test";
pub const TEST_HMAC_SIGNING_KEY: &str = "test-hmac-signing-key";
pub const TEST_BASIC_AUTH_USER: &str = "portal-user";
pub const TEST_BASIC_AUTH_PASS: &str = "portal-pass";

fn test_config() -> ApiConfig {
    ApiConfig {
        advisor_id: TEST_ADVISOR_ID.to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        public_base_url: "http://127.0.0.1:0".to_string(),
        database_url: String::new(),
        database_max_connections: 5,
        redis_url: String::new(),
        stage_prefix: None,
        auth_mode: AuthMode::None,
        basic_auth_username: Some(TEST_BASIC_AUTH_USER.to_string()),
        basic_auth_password: Some(TEST_BASIC_AUTH_PASS.to_string()),
        google_oauth: None,
        session_signing_key: "test-session-signing-key".to_string(),
        session_ttl_hours: 12,
        oauth_state_ttl_seconds: 600,
        hmac_signing_key: TEST_HMAC_SIGNING_KEY.to_string(),
        intent_extraction_mode: IntentExtractionMode::Parser,
        llm_confidence_threshold: 0.65,
        response_mode: ResponseMode::Log,
        sender_email: None,
        calendar_mode: CalendarMode::Mock,
        calendar_refresh_token: None,
        calendar_oauth_client_id: None,
        calendar_oauth_client_secret: None,
        max_duration_minutes: 240,
        default_duration_minutes: 30,
        default_search_days: 14,
        default_max_suggestions: 3,
        link_ttl_minutes_min: 15,
        link_ttl_minutes_max: 14 * 24 * 60,
        link_ttl_minutes_default: 24 * 60,
        llm_timeout_ms: 4000,
        llm_intent_timeout_ms: 10_000,
        llm_api_base_url: "http://127.0.0.1:0".to_string(),
        llm_api_key: None,
        llm_model: "test-model".to_string(),
        trusted_proxy_ips: Vec::<IpAddr>::new(),
    }
}

/// Overrides applied on top of [`test_config`] so each test only names the
/// handful of fields that matter to its scenario.
pub struct TestAppBuilder {
    config: ApiConfig,
    calendar: Box<dyn CalendarProvider>,
    llm: Box<dyn LlmClient>,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            config: test_config(),
            calendar: Box::new(StubCalendarProvider::empty()),
            llm: Box::new(StubLlmClient::disabled()),
        }
    }

    pub fn with_config(mut self, configure: impl FnOnce(&mut ApiConfig)) -> Self {
        configure(&mut self.config);
        self
    }

    pub fn with_calendar(mut self, calendar: impl CalendarProvider + 'static) -> Self {
        self.calendar = Box::new(calendar);
        self
    }

    pub fn with_llm(mut self, llm: impl LlmClient + 'static) -> Self {
        self.llm = Box::new(llm);
        self
    }

    pub fn build(self, store: Store) -> axum::Router {
        let templates_dir = templates_glob();
        let mut templates = Tera::new(&templates_dir).expect("availability templates should parse");
        templates.autoescape_on(vec![".html"]);

        let collaborators = Arc::new(Collaborators {
            secrets: Box::new(secrets::EnvSecretStore::new()),
            kv_store: Box::new(InMemoryKeyValueStore::default()),
            calendar: self.calendar,
            mailer: Box::new(RecordingMailer::default()),
            llm: self.llm,
            raw_email: Box::new(raw_email::NullRawEmailObjectStore),
        });

        let app_state = AppState {
            store,
            collaborators,
            config: Arc::new(self.config),
            http_client: reqwest::Client::new(),
            templates: Arc::new(templates),
        };

        build_router(app_state)
    }
}

fn templates_glob() -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    format!("{manifest_dir}/../api-server/templates/**/*.html")
}
