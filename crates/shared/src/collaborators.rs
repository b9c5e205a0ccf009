//! External collaborator contracts (§6). Each family is a narrow,
//! dyn-compatible trait whose methods return a boxed future, which keeps
//! these traits object-safe without pulling in `async-trait`.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{BusyInterval, ClientMeeting, IntentRecord};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Error, Clone)]
pub enum CollaboratorError {
    #[error("secret store failure: {0}")]
    SecretStore(String),
    #[error("key-value store failure: {0}")]
    KeyValueStore(String),
    #[error("calendar provider failure: {0}")]
    CalendarProvider(String),
    #[error("mailer failure: {0}")]
    Mailer(String),
    #[error("llm client failure: {0}")]
    LlmClient(String),
    #[error("raw email object store failure: {0}")]
    RawEmailObjectStore(String),
    #[error("collaborator call timed out after {0}ms")]
    Timeout(u64),
}

pub trait SecretStore: Send + Sync {
    /// Returns the raw JSON blob stored under `arn`. Results SHOULD be
    /// cached process-locally and keyed by `arn` (see §9's secret-parsing
    /// cache design note); this trait only describes the fetch contract.
    fn get_secret_string<'a>(&'a self, arn: &'a str) -> BoxFuture<'a, Result<String, CollaboratorError>>;
}

#[derive(Debug, Clone)]
pub struct ConditionalUpdate {
    pub partition_key: String,
    pub sort_key: String,
    pub expected_version: Option<i64>,
    pub patch: serde_json::Value,
}

pub trait KeyValueStore: Send + Sync {
    fn get<'a>(&'a self, partition_key: &'a str, sort_key: &'a str) -> BoxFuture<'a, Result<Option<serde_json::Value>, CollaboratorError>>;

    fn put<'a>(&'a self, partition_key: &'a str, sort_key: &'a str, value: serde_json::Value) -> BoxFuture<'a, Result<(), CollaboratorError>>;

    fn delete<'a>(&'a self, partition_key: &'a str, sort_key: &'a str) -> BoxFuture<'a, Result<(), CollaboratorError>>;

    fn query<'a>(&'a self, partition_key: &'a str) -> BoxFuture<'a, Result<Vec<serde_json::Value>, CollaboratorError>>;

    /// Create-if-absent with a TTL. Returns `Ok(true)` if this call created
    /// the record, `Ok(false)` if a record already existed under
    /// `(partition_key, sort_key)`. The §4.4/§5 uniqueness guarantee rests
    /// entirely on this primitive being atomic.
    fn put_if_absent<'a>(
        &'a self,
        partition_key: &'a str,
        sort_key: &'a str,
        value: serde_json::Value,
        ttl_seconds: u64,
    ) -> BoxFuture<'a, Result<bool, CollaboratorError>>;

    fn conditional_update<'a>(&'a self, update: ConditionalUpdate) -> BoxFuture<'a, Result<bool, CollaboratorError>>;
}

pub struct BusyIntervalLookup {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

pub struct ClientMeetingLookup {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub client_email: String,
    pub advisor_email_hint: Option<String>,
}

pub struct ClientMeetingLookupResult {
    pub client_meetings: Vec<ClientMeeting>,
    pub non_client_busy_intervals: Vec<BusyInterval>,
}

/// Calendar windows longer than 85 days MUST be chunked internally by the
/// implementation (§6) — callers may pass arbitrarily wide windows.
pub trait CalendarProvider: Send + Sync {
    fn lookup_busy_intervals<'a>(&'a self, lookup: BusyIntervalLookup) -> BoxFuture<'a, Result<Vec<BusyInterval>, CollaboratorError>>;

    fn lookup_client_meetings<'a>(&'a self, lookup: ClientMeetingLookup) -> BoxFuture<'a, Result<ClientMeetingLookupResult, CollaboratorError>>;
}

pub trait Mailer: Send + Sync {
    fn send<'a>(&'a self, to: &'a str, subject: &'a str, body: &'a str) -> BoxFuture<'a, Result<(), CollaboratorError>>;
}

pub struct LlmIntentResult {
    pub intent: IntentRecord,
    pub confidence: f64,
}

pub trait LlmClient: Send + Sync {
    fn draft_response<'a>(&'a self, prompt: &'a str, timeout_ms: u64) -> BoxFuture<'a, Result<String, CollaboratorError>>;

    fn extract_scheduling_intent<'a>(
        &'a self,
        subject: &'a str,
        body: &'a str,
        timeout_ms: u64,
    ) -> BoxFuture<'a, Result<LlmIntentResult, CollaboratorError>>;
}

pub trait RawEmailObjectStore: Send + Sync {
    fn fetch_raw_body<'a>(&'a self, message_id: &'a str) -> BoxFuture<'a, Result<String, CollaboratorError>>;

    /// Best-effort: callers treat any error as non-fatal (§7's
    /// best-effort-failures policy).
    fn delete_raw_body<'a>(&'a self, message_id: &'a str) -> BoxFuture<'a, Result<(), CollaboratorError>>;
}

/// The full collaborator bag the orchestrator is given. No field is
/// optional: a deployment that doesn't need a capability wires in a
/// no-op/mock implementation rather than making the orchestrator branch
/// on presence.
pub struct Collaborators {
    pub secrets: Box<dyn SecretStore>,
    pub kv_store: Box<dyn KeyValueStore>,
    pub calendar: Box<dyn CalendarProvider>,
    pub mailer: Box<dyn Mailer>,
    pub llm: Box<dyn LlmClient>,
    pub raw_email: Box<dyn RawEmailObjectStore>,
}
