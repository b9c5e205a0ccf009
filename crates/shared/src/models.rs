//! Wire and persisted-record types shared by the orchestrator, the
//! repositories and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingType {
    Online,
    InPerson,
}

/// A parsed `(startIso, endIso)` pair in UTC. Distinct from
/// [`crate::time::TimeInterval`] only in that it carries the original ISO
/// strings for wire round-tripping; `start`/`end` are always `end > start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedWindow {
    #[serde(rename = "startIso")]
    pub start_iso: String,
    #[serde(rename = "endIso")]
    pub end_iso: String,
}

/// Immutable result of the intent extractor (C2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentRecord {
    pub client_email: String,
    pub meeting_type: MeetingType,
    pub duration_minutes: u32,
    pub requested_windows: Vec<RequestedWindow>,
    pub client_timezone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentSource {
    Parser,
    Llm,
    LlmOverride,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusyInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub calendar_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Accepted,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMeeting {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub title: String,
    pub advisor_response_status: MeetingStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSlot {
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub start_host_local: String,
    pub end_host_local: String,
    pub host_timezone: String,
}

/// Persisted `C5` binding record. `expires_at_ms` is always greater than
/// `issued_at_ms`; `token_id` is unique within the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityLinkRecord {
    pub token_id: String,
    pub advisor_id: String,
    pub client_id: String,
    pub client_email: String,
    pub client_display_name: String,
    pub client_reference: String,
    #[serde(default)]
    pub client_timezone: Option<String>,
    pub duration_minutes: u32,
    pub issued_at_ms: i64,
    pub expires_at_ms: i64,
}

/// Signing payload for the legacy HMAC token (C6). Encoded as
/// `base64url(json) + "." + base64url(hmac)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyTokenPayload {
    pub advisor_id: String,
    pub issued_at_ms: i64,
    pub expires_at_ms: i64,
    #[serde(default)]
    pub client_timezone: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAccessState {
    Active,
    Blocked,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorRecord {
    pub advisor_id: String,
    pub display_name: String,
    pub email: String,
    pub advising_weekdays: Vec<String>,
    pub workday_start_hour: u8,
    pub workday_end_hour: u8,
    pub default_duration_minutes: u32,
    pub search_days: u32,
    pub max_suggestions: u32,
    pub time_zone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRecord {
    pub client_id: String,
    pub advisor_id: String,
    pub email: String,
    pub display_name: String,
    pub access_state: ClientAccessState,
    pub interaction_count: i64,
    /// Per-client advising-weekday override; outranks the advisor policy
    /// preset and the advisor default (§4.5 step 4's resolution ladder).
    #[serde(default)]
    pub advising_weekdays_override: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentExtractionMode {
    Parser,
    LlmHybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    Log,
    Send,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorPolicyRecord {
    pub policy_id: String,
    pub advisor_id: String,
    #[serde(default)]
    pub advising_weekdays_preset: Option<Vec<String>>,
    pub intent_extraction_mode: IntentExtractionMode,
    pub response_mode: ResponseMode,
    pub llm_confidence_threshold: f64,
    pub ttl_minutes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    Ok,
    Denied,
    Failed,
}

/// Metadata-only record. Never carries `fromEmail`, `subject`, or `body`
/// substrings (see spec §6/§8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    pub request_id: String,
    pub response_id: String,
    pub advisor_id: String,
    pub status: TraceStatus,
    pub stage: Option<String>,
    pub intent_source: Option<IntentSource>,
    pub llm_status: Option<String>,
    pub suggestion_count: u32,
    pub delivery_status: Option<String>,
    pub access_state: Option<ClientAccessState>,
    pub link_ttl_minutes: Option<u32>,
    pub latency_ms: i64,
    pub feedback_count: i64,
    pub created_at: DateTime<Utc>,
}

// --- HTTP wire types -------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SesEnvelope {
    #[serde(default)]
    pub mail: Option<SesMail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SesMail {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, rename = "commonHeaders")]
    pub common_headers: Option<SesCommonHeaders>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SesCommonHeaders {
    #[serde(default)]
    pub from: Vec<String>,
    #[serde(default)]
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingEmailRequest {
    #[serde(default)]
    pub from_email: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub mock_busy_intervals: Option<Vec<BusyInterval>>,
    #[serde(default)]
    pub ses: Option<SesEnvelope>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IncomingEmailResponse {
    pub request_id: String,
    pub response_id: String,
    pub delivery_status: String,
    pub llm_status: Option<String>,
    pub suggestion_count: u32,
    pub suggestions: Vec<CandidateSlot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_denied: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_state: Option<ClientAccessState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    Incorrect,
    Odd,
    Helpful,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackReason {
    AvailabilityMismatch,
    TimezoneIssue,
    ToneQuality,
    Latency,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackSource {
    Client,
    Advisor,
    System,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    pub request_id: String,
    pub response_id: String,
    pub feedback_type: FeedbackType,
    pub feedback_reason: FeedbackReason,
    pub feedback_source: FeedbackSource,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackResponse {
    pub request_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}
