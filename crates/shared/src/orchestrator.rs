//! C7: the end-to-end email→intent→busy→slots→draft→link→trace pipeline
//! (§4.5), plus the feedback path. This is the one module that touches
//! every collaborator family and both persistence layers (`Store` for
//! durable records, `KeyValueStore` for the availability link).

use std::sync::LazyLock;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use regex::Regex;
use thiserror::Error;
use tracing::{info, warn};

use crate::collaborators::{BusyIntervalLookup, Collaborators};
use crate::config::{ApiConfig, IntentExtractionMode, ResponseMode};
use crate::hmac_token;
use crate::intent;
use crate::link_store::{self, LinkStoreError};
use crate::models::{
    AdvisorPolicyRecord, AdvisorRecord, AvailabilityLinkRecord, CandidateSlot, ClientAccessState,
    ClientRecord, FeedbackRequest, FeedbackResponse, IncomingEmailRequest, IncomingEmailResponse,
    IntentRecord, IntentSource, LegacyTokenPayload, TraceRecord, TraceStatus,
};
use crate::repos::{Store, StoreError};
use crate::slots::{self, SlotGenerationParams};
use crate::time::parse_time_zone_or_default;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("calendar lookup failed: {0}")]
    CalendarLookupFailed(String),
    #[error("token allocation failed: {0}")]
    TokenAllocationFailed(String),
    #[error("persistence error: {0}")]
    Store(#[from] StoreError),
    #[error("feedback target not found")]
    FeedbackNotFound,
}

static FROM_HEADER_ADDR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^<>@\s]+@[^<>\s]+)>").unwrap());

static GREETING_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^(hi|hello)\b").unwrap());

static SIGNOFF_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(best regards|best|regards)[,!]?\s*$").unwrap());

/// Everything `process` needs that isn't part of the request body itself —
/// the advisor/client/policy records are loaded by the caller (the portal
/// router's handler), which is the only place that knows how to resolve an
/// advisor id from the inbound request.
pub struct ProcessContext<'a> {
    pub request: &'a IncomingEmailRequest,
    pub advisor: &'a AdvisorRecord,
    pub client: Option<&'a ClientRecord>,
    pub policy: Option<&'a AdvisorPolicyRecord>,
    pub config: &'a ApiConfig,
    pub collaborators: &'a Collaborators,
    pub store: &'a Store,
    pub now: DateTime<Utc>,
    pub request_id: String,
}

/// Exposed so the HTTP layer can resolve the client record (by
/// `(advisor_id, email)`) before building a [`ProcessContext`] — `process`
/// itself re-derives the same normalized address from `ctx.request`.
pub fn normalize_from_email(raw: &str) -> Option<String> {
    let candidate = FROM_HEADER_ADDR_RE
        .captures(raw)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| raw.trim().to_string());

    let normalized = candidate.trim().trim_matches(|c| c == '<' || c == '>');
    if normalized.is_empty() || !normalized.contains('@') {
        None
    } else {
        Some(normalized.to_ascii_lowercase())
    }
}

async fn resolve_body(ctx: &ProcessContext<'_>) -> String {
    if let Some(body) = ctx.request.body.as_ref().filter(|b| !b.is_empty()) {
        return body.clone();
    }

    let message_id = ctx
        .request
        .ses
        .as_ref()
        .and_then(|envelope| envelope.mail.as_ref())
        .and_then(|mail| mail.message_id.as_ref());

    let Some(message_id) = message_id else {
        return String::new();
    };

    match ctx.collaborators.raw_email.fetch_raw_body(message_id).await {
        Ok(body) => {
            if let Err(err) = ctx.collaborators.raw_email.delete_raw_body(message_id).await {
                warn!(error = %err, "raw email body delete failed, ignoring (best effort)");
            }
            body
        }
        Err(err) => {
            warn!(error = %err, body_source = "object_store", "raw email body fetch failed, falling back to empty body");
            String::new()
        }
    }
}

fn resolve_advising_weekdays<'a>(
    advisor: &'a AdvisorRecord,
    client: Option<&'a ClientRecord>,
    policy: Option<&'a AdvisorPolicyRecord>,
) -> &'a [String] {
    if let Some(client) = client
        && let Some(override_days) = client.advising_weekdays_override.as_ref()
        && !override_days.is_empty()
    {
        return override_days;
    }

    if let Some(policy) = policy
        && let Some(preset) = policy.advising_weekdays_preset.as_ref()
        && !preset.is_empty()
    {
        return preset;
    }

    &advisor.advising_weekdays
}

/// Merges the parser's result with an LLM extraction per §4.5 step 5:
/// the LLM wins iff it returned ≥1 window AND (parser returned 0 windows OR
/// LLM confidence ≥ threshold).
fn merge_intent(
    parser_intent: IntentRecord,
    llm_result: Option<(IntentRecord, f64)>,
    confidence_threshold: f64,
) -> (IntentRecord, IntentSource) {
    let Some((llm_intent, confidence)) = llm_result else {
        return (parser_intent, IntentSource::Parser);
    };

    if llm_intent.requested_windows.is_empty() {
        return (parser_intent, IntentSource::Parser);
    }

    let llm_wins = parser_intent.requested_windows.is_empty() || confidence >= confidence_threshold;
    if !llm_wins {
        return (parser_intent, IntentSource::Llm);
    }

    let client_timezone = parser_intent
        .client_timezone
        .clone()
        .or(llm_intent.client_timezone.clone());

    (
        IntentRecord {
            client_timezone,
            ..llm_intent
        },
        IntentSource::LlmOverride,
    )
}

fn format_host_local(slot: &CandidateSlot) -> String {
    format!("{} ({})", slot.start_host_local, slot.host_timezone)
}

fn format_client_annotation(slot: &CandidateSlot, client_timezone: Option<&str>) -> String {
    let Some(tz_name) = client_timezone else {
        return String::new();
    };

    let tz = parse_time_zone_or_default(tz_name);
    let start_local = slot.start_utc.with_timezone(&tz);
    let end_local = slot.end_utc.with_timezone(&tz);
    format!(
        " [client: {} - {} {}]",
        start_local.format("%-I:%M %p"),
        end_local.format("%-I:%M %p"),
        tz_name
    )
}

fn compose_template_draft(
    advisor: &AdvisorRecord,
    slots: &[CandidateSlot],
    client_timezone: Option<&str>,
) -> String {
    if slots.is_empty() {
        return "Thanks for reaching out — I don't have any open times matching your request in the next search window. Could you share a few alternate days or times?".to_string();
    }

    let mut lines = vec!["Thanks for reaching out! Here are a few times that work:".to_string()];
    for (index, slot) in slots.iter().enumerate() {
        lines.push(format!(
            "{}. {}{}",
            index + 1,
            format_host_local(slot),
            format_client_annotation(slot, client_timezone)
        ));
    }
    lines.push("Let me know which works best.".to_string());
    let _ = advisor;
    lines.join("\n")
}

fn inject_greeting_and_signoff(body: &str, client_display_name: &str, advisor_display_name: &str) -> String {
    let mut lines: Vec<String> = body.lines().map(str::to_string).collect();

    let greeting = format!("Hi {client_display_name},");
    if lines.first().map(|line| GREETING_LINE_RE.is_match(line)).unwrap_or(false) {
        lines[0] = greeting;
    } else {
        lines.insert(0, greeting);
        lines.insert(1, String::new());
    }

    let signoff_index = lines.iter().position(|line| SIGNOFF_LINE_RE.is_match(line));
    match signoff_index {
        Some(index) => {
            lines[index] = "Best regards,".to_string();
            let name_line = advisor_display_name.to_string();
            if index + 1 < lines.len() {
                lines[index + 1] = name_line;
            } else {
                lines.push(name_line);
            }
        }
        None => {
            lines.push(String::new());
            lines.push("Best regards,".to_string());
            lines.push(advisor_display_name.to_string());
        }
    }

    lines.join("\n")
}

fn append_link_block(draft: &str, link_url: &str) -> String {
    format!("{draft}\n\nView and choose a time: {link_url}")
}

async fn lookup_busy_intervals(
    ctx: &ProcessContext<'_>,
    search_start: DateTime<Utc>,
    search_end: DateTime<Utc>,
) -> Result<Vec<crate::models::BusyInterval>, OrchestratorError> {
    use crate::config::CalendarMode;

    match ctx.config.calendar_mode {
        CalendarMode::Mock => Ok(ctx.request.mock_busy_intervals.clone().unwrap_or_default()),
        CalendarMode::DirectOauth | CalendarMode::PerAdvisorConnection => ctx
            .collaborators
            .calendar
            .lookup_busy_intervals(BusyIntervalLookup {
                window_start: search_start,
                window_end: search_end,
            })
            .await
            .map_err(|err| OrchestratorError::CalendarLookupFailed(err.to_string())),
    }
}

pub async fn process(ctx: ProcessContext<'_>) -> Result<IncomingEmailResponse, OrchestratorError> {
    let started_at = ctx.now;
    let response_id = format!("resp_{}", uuid::Uuid::new_v4());

    // Step 1: normalise fromEmail.
    let Some(from_email) = ctx
        .request
        .from_email
        .as_deref()
        .and_then(normalize_from_email)
    else {
        return Err(OrchestratorError::Validation(
            "fromEmail is required and must contain an email address".to_string(),
        ));
    };

    // Step 2: resolve body text.
    let body = resolve_body(&ctx).await;
    let subject = ctx.request.subject.clone().unwrap_or_default();

    // Step 3: access-state denial branch.
    if let Some(client) = ctx.client
        && matches!(
            client.access_state,
            ClientAccessState::Blocked | ClientAccessState::Deleted
        )
    {
        let trace = TraceRecord {
            request_id: ctx.request_id.clone(),
            response_id: response_id.clone(),
            advisor_id: ctx.advisor.advisor_id.clone(),
            status: TraceStatus::Denied,
            stage: Some("access_check".to_string()),
            intent_source: None,
            llm_status: None,
            suggestion_count: 0,
            delivery_status: Some("denied".to_string()),
            access_state: Some(client.access_state),
            link_ttl_minutes: None,
            latency_ms: (Utc::now() - started_at).num_milliseconds(),
            feedback_count: 0,
            created_at: started_at,
        };
        ctx.store.insert_trace(&trace).await?;

        return Ok(IncomingEmailResponse {
            request_id: ctx.request_id,
            response_id,
            delivery_status: "logged".to_string(),
            llm_status: None,
            suggestion_count: 0,
            suggestions: Vec::new(),
            access_denied: Some(true),
            access_state: Some(client.access_state),
        });
    }

    // Step 4: advising-days resolution ladder.
    let advising_weekdays = resolve_advising_weekdays(ctx.advisor, ctx.client, ctx.policy).to_vec();

    // Step 5: intent extraction, optionally hybridised with an LLM call.
    let parser_intent = intent::extract(
        &subject,
        &body,
        &from_email,
        Some(&started_at.to_rfc3339()),
        &ctx.advisor.time_zone,
        ctx.advisor.default_duration_minutes,
    );

    let search_start = started_at;
    let search_end = started_at + ChronoDuration::days(ctx.advisor.search_days as i64);

    let llm_hybrid = ctx.config.intent_extraction_mode == IntentExtractionMode::LlmHybrid;

    let llm_future = async {
        if !llm_hybrid {
            return None;
        }
        match ctx
            .collaborators
            .llm
            .extract_scheduling_intent(&subject, &body, ctx.config.llm_intent_timeout_ms)
            .await
        {
            Ok(result) => Some((result.intent, result.confidence)),
            Err(err) => {
                warn!(error = %err, "llm intent extraction failed, using parser result only");
                None
            }
        }
    };

    let busy_future = lookup_busy_intervals(&ctx, search_start, search_end);

    let (llm_result, busy_result) = tokio::join!(llm_future, busy_future);
    let busy_intervals = busy_result.map_err(|err| {
        warn!(error = %err, stage = "calendar_lookup", "calendar lookup failed");
        err
    })?;

    let (intent, intent_source) = merge_intent(
        parser_intent,
        llm_result,
        ctx.config.llm_confidence_threshold,
    );

    // Step 6: enforce MAX_DURATION_MINUTES.
    if intent.duration_minutes == 0 || intent.duration_minutes > ctx.config.max_duration_minutes {
        return Err(OrchestratorError::Validation(format!(
            "durationMinutes {} exceeds configured maximum {}",
            intent.duration_minutes, ctx.config.max_duration_minutes
        )));
    }

    // Step 7/8: busy intervals already fetched above; generate slots.
    let requested_windows_utc: Vec<(DateTime<Utc>, DateTime<Utc>)> = intent
        .requested_windows
        .iter()
        .filter_map(|window| {
            Some((
                crate::time::iso_to_utc(&window.start_iso)?,
                crate::time::iso_to_utc(&window.end_iso)?,
            ))
        })
        .collect();

    let candidate_slots = slots::generate(SlotGenerationParams {
        busy_utc: &busy_intervals,
        requested_windows_utc: &requested_windows_utc,
        host_timezone: &ctx.advisor.time_zone,
        advising_weekdays: &advising_weekdays,
        search_start,
        search_end,
        workday_start_hour: ctx.advisor.workday_start_hour as u32,
        workday_end_hour: ctx.advisor.workday_end_hour as u32,
        duration_minutes: intent.duration_minutes,
        max_suggestions: ctx.advisor.max_suggestions,
    });

    // Step 9: compose a draft, template by default, LLM if hybrid mode allows.
    let client_display_name = ctx
        .client
        .map(|c| c.display_name.clone())
        .unwrap_or_else(|| "there".to_string());

    let (mut draft, mut llm_status) = if llm_hybrid {
        let prompt = format!(
            "Draft a short scheduling reply to {from_email} offering these times: {:?}",
            candidate_slots
                .iter()
                .map(|slot| format_host_local(slot))
                .collect::<Vec<_>>()
        );
        match ctx
            .collaborators
            .llm
            .draft_response(&prompt, ctx.config.llm_timeout_ms)
            .await
        {
            Ok(text) => (text, Some("ok".to_string())),
            Err(err) => {
                warn!(error = %err, "llm draft failed, falling back to template");
                (
                    compose_template_draft(ctx.advisor, &candidate_slots, intent.client_timezone.as_deref()),
                    Some("fallback".to_string()),
                )
            }
        }
    } else {
        (
            compose_template_draft(ctx.advisor, &candidate_slots, intent.client_timezone.as_deref()),
            None,
        )
    };

    // Step 10: allocate an availability link if we have any slots.
    let mut link_ttl_minutes = None;
    if !candidate_slots.is_empty() {
        let ttl_minutes = ctx.config.clamp_link_ttl_minutes(None);
        let ttl_seconds = (ttl_minutes as u64) * 60;
        let issued_at_ms = started_at.timestamp_millis();
        let expires_at_ms = issued_at_ms + (ttl_seconds as i64) * 1000;

        let advisor_id = ctx.advisor.advisor_id.clone();
        let client_id = ctx
            .client
            .map(|c| c.client_id.clone())
            .unwrap_or_else(|| from_email.clone());
        let client_email = from_email.clone();
        let client_display_name_for_link = client_display_name.clone();
        let client_timezone = intent.client_timezone.clone();
        let duration_minutes = intent.duration_minutes;

        let record = link_store::allocate(
            ctx.collaborators.kv_store.as_ref(),
            move |token_id| AvailabilityLinkRecord {
                token_id,
                advisor_id: advisor_id.clone(),
                client_id: client_id.clone(),
                client_email: client_email.clone(),
                client_display_name: client_display_name_for_link.clone(),
                client_reference: client_email.clone(),
                client_timezone: client_timezone.clone(),
                duration_minutes,
                issued_at_ms,
                expires_at_ms,
            },
            ttl_seconds,
        )
        .await
        .map_err(|err| match err {
            LinkStoreError::AllocationExhausted(attempts) => OrchestratorError::TokenAllocationFailed(
                format!("exhausted {attempts} collision retries"),
            ),
            LinkStoreError::Collaborator(inner) => {
                OrchestratorError::TokenAllocationFailed(inner.to_string())
            }
        })?;

        let link_url = format!(
            "{}/availability?t={}",
            ctx.config.public_base_url.trim_end_matches('/'),
            record.token_id
        );
        draft = append_link_block(&draft, &link_url);
        link_ttl_minutes = Some(ttl_minutes);
    }

    // Step 11: inject greeting/sign-off.
    draft = inject_greeting_and_signoff(&draft, &client_display_name, &ctx.advisor.display_name);

    // Step 12: dispatch if RESPONSE_MODE=send.
    let delivery_status = if ctx.config.response_mode == ResponseMode::Send {
        let sender_email = ctx.config.sender_email.as_deref().ok_or_else(|| {
            OrchestratorError::Validation("SENDER_EMAIL is required when RESPONSE_MODE=send".to_string())
        })?;
        let subject_line = format!("Re: {subject}");
        if let Err(err) = ctx
            .collaborators
            .mailer
            .send(&from_email, &subject_line, &draft)
            .await
        {
            warn!(error = %err, sender_email, "mailer dispatch failed");
        }
        "sent".to_string()
    } else {
        info!(draft_len = draft.len(), "response logged, not dispatched");
        "logged".to_string()
    };

    // Step 13: metadata-only trace.
    let trace = TraceRecord {
        request_id: ctx.request_id.clone(),
        response_id: response_id.clone(),
        advisor_id: ctx.advisor.advisor_id.clone(),
        status: TraceStatus::Ok,
        stage: Some("completed".to_string()),
        intent_source: Some(intent_source),
        llm_status: llm_status.take(),
        suggestion_count: candidate_slots.len() as u32,
        delivery_status: Some(delivery_status.clone()),
        access_state: ctx.client.map(|c| c.access_state),
        link_ttl_minutes,
        latency_ms: (Utc::now() - started_at).num_milliseconds(),
        feedback_count: 0,
        created_at: started_at,
    };
    ctx.store.insert_trace(&trace).await?;

    // Step 14: best-effort interaction counter update.
    if let Some(client) = ctx.client
        && let Err(err) = ctx.store.increment_client_interaction_count(&client.client_id).await
    {
        warn!(error = %err, "client interaction counter update failed, ignoring (best effort)");
    }

    Ok(IncomingEmailResponse {
        request_id: ctx.request_id,
        response_id,
        delivery_status,
        llm_status,
        suggestion_count: candidate_slots.len() as u32,
        suggestions: candidate_slots,
        access_denied: None,
        access_state: None,
    })
}

pub async fn process_feedback(
    store: &Store,
    payload: &FeedbackRequest,
) -> Result<FeedbackResponse, OrchestratorError> {
    let matched = store
        .record_feedback(&payload.request_id, &payload.response_id)
        .await?;

    if !matched {
        return Err(OrchestratorError::FeedbackNotFound);
    }

    Ok(FeedbackResponse {
        request_id: payload.request_id.clone(),
        status: "recorded".to_string(),
    })
}

/// Verifies a legacy HMAC token against the configured signing key — used
/// by the portal router's availability-view handler alongside the primary
/// short-token link store (§6's "Token format (HMAC)").
pub fn verify_legacy_token(token: &str, signing_key: &str) -> Option<LegacyTokenPayload> {
    hmac_token::verify(token, signing_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_from_email_extracts_angle_bracket_address() {
        assert_eq!(
            normalize_from_email("Jane Doe <Jane@Example.com>"),
            Some("jane@example.com".to_string())
        );
    }

    #[test]
    fn normalize_from_email_accepts_bare_address() {
        assert_eq!(
            normalize_from_email("jane@example.com"),
            Some("jane@example.com".to_string())
        );
    }

    #[test]
    fn normalize_from_email_rejects_addressless_header() {
        assert_eq!(normalize_from_email("not an email"), None);
        assert_eq!(normalize_from_email(""), None);
    }

    #[test]
    fn merge_intent_prefers_parser_when_llm_has_no_windows() {
        let parser = IntentRecord {
            client_email: "a@example.com".to_string(),
            meeting_type: crate::models::MeetingType::Online,
            duration_minutes: 30,
            requested_windows: vec![crate::models::RequestedWindow {
                start_iso: "2026-03-03T13:00:00Z".to_string(),
                end_iso: "2026-03-03T14:00:00Z".to_string(),
            }],
            client_timezone: None,
        };
        let (merged, source) = merge_intent(parser.clone(), None, 0.65);
        assert_eq!(merged.requested_windows.len(), 1);
        assert_eq!(source, IntentSource::Parser);
    }

    #[test]
    fn merge_intent_overrides_when_parser_empty_and_llm_confident() {
        let parser = IntentRecord {
            client_email: "a@example.com".to_string(),
            meeting_type: crate::models::MeetingType::Online,
            duration_minutes: 30,
            requested_windows: vec![],
            client_timezone: None,
        };
        let llm_intent = IntentRecord {
            client_email: "a@example.com".to_string(),
            meeting_type: crate::models::MeetingType::Online,
            duration_minutes: 45,
            requested_windows: vec![crate::models::RequestedWindow {
                start_iso: "2026-03-03T13:00:00Z".to_string(),
                end_iso: "2026-03-03T14:00:00Z".to_string(),
            }],
            client_timezone: Some("America/New_York".to_string()),
        };
        let (merged, source) = merge_intent(parser, Some((llm_intent, 0.9)), 0.65);
        assert_eq!(merged.duration_minutes, 45);
        assert_eq!(source, IntentSource::LlmOverride);
    }

    #[test]
    fn inject_greeting_and_signoff_replaces_existing_lines() {
        let body = "Hello there,\nHere are some times.\nBest,\nOld Name";
        let result = inject_greeting_and_signoff(body, "Client Name", "Advisor Name");
        assert!(result.starts_with("Hi Client Name,"));
        assert!(result.contains("Advisor Name"));
    }

    #[test]
    fn inject_greeting_and_signoff_adds_lines_when_absent() {
        let body = "Here are some times.";
        let result = inject_greeting_and_signoff(body, "Client Name", "Advisor Name");
        assert!(result.starts_with("Hi Client Name,"));
        assert!(result.ends_with("Advisor Name"));
    }
}
