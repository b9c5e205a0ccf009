//! Process entrypoint: loads config, opens the durable store and the
//! Redis-backed key-value store, wires the collaborator bag for the
//! configured modes, and serves the Portal Router.

use std::net::SocketAddr;
use std::sync::Arc;

use scheduler_api::http::{self, AppState};
use shared::collaborators::Collaborators;
use shared::config::{ApiConfig, CalendarMode, IntentExtractionMode};
use shared::providers::{
    google_calendar, llm_client, mailer, mock_calendar, raw_email, redis_kv, secrets,
};
use shared::repos::Store;
use tera::Tera;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "scheduler_api=info,axum=info".to_string()))
        .json()
        .init();

    let config = match ApiConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "failed to load api-server config");
            std::process::exit(1);
        }
    };

    let store = match Store::connect(&config.database_url, config.database_max_connections).await {
        Ok(store) => store,
        Err(err) => {
            error!(error = %err, "failed to connect to postgres");
            std::process::exit(1);
        }
    };

    if let Err(err) = sqlx::migrate!("../../db/migrations").run(store.pool()).await {
        error!(error = %err, "failed to run database migrations");
        std::process::exit(1);
    }

    let kv_store = match redis_kv::RedisKeyValueStore::connect(&config.redis_url).await {
        Ok(kv_store) => kv_store,
        Err(err) => {
            error!(error = %err, "failed to connect to redis");
            std::process::exit(1);
        }
    };

    let calendar: Box<dyn shared::collaborators::CalendarProvider> = match config.calendar_mode {
        CalendarMode::Mock => Box::new(mock_calendar::MockCalendarProvider),
        CalendarMode::DirectOauth | CalendarMode::PerAdvisorConnection => {
            let (Some(client_id), Some(client_secret), Some(refresh_token)) = (
                config.calendar_oauth_client_id.clone(),
                config.calendar_oauth_client_secret.clone(),
                config.calendar_refresh_token.clone(),
            ) else {
                error!("calendar oauth credentials are missing for the configured calendar mode");
                std::process::exit(1);
            };
            Box::new(google_calendar::GoogleCalendarProvider::new(
                client_id,
                client_secret,
                refresh_token,
            ))
        }
    };

    if config.intent_extraction_mode == IntentExtractionMode::LlmHybrid && config.llm_api_key.is_none() {
        error!("LLM_API_KEY is required when INTENT_EXTRACTION_MODE=llm_hybrid");
        std::process::exit(1);
    }

    let llm = match llm_client::ReqwestLlmClient::new(
        config.llm_api_base_url.clone(),
        config.llm_api_key.clone().unwrap_or_default(),
        config.llm_model.clone(),
    ) {
        Ok(llm) => llm,
        Err(err) => {
            error!(error = %err, "failed to build llm client");
            std::process::exit(1);
        }
    };

    let collaborators = Arc::new(Collaborators {
        secrets: Box::new(secrets::EnvSecretStore::new()),
        kv_store: Box::new(kv_store),
        calendar,
        mailer: Box::new(mailer::LoggingMailer),
        llm: Box::new(llm),
        raw_email: Box::new(raw_email::NullRawEmailObjectStore),
    });

    let mut templates = Tera::new("crates/api-server/templates/**/*.html")
        .or_else(|_| Tera::new("templates/**/*.html"))
        .expect("availability templates should parse");
    templates.autoescape_on(vec![".html"]);

    let http_client = reqwest::Client::builder()
        .build()
        .expect("http client should build");

    let bind_addr: SocketAddr = config
        .bind_addr
        .parse()
        .unwrap_or_else(|_| "127.0.0.1:8080".parse().expect("valid default bind addr"));

    let app_state = AppState {
        store,
        collaborators,
        config: Arc::new(config),
        http_client,
        templates: Arc::new(templates),
    };

    let router = http::build_router(app_state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .expect("bind should succeed");

    info!(%bind_addr, "scheduler-api listening");

    axum::serve(listener, router).await.expect("server should run");
}
