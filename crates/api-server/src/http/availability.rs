//! C8's public availability view: resolves a token (primary short-token or
//! legacy HMAC token per §4.4/§6), fetches busy + client-meeting data, runs
//! C4 to build the grid, and renders it with Tera.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use chrono::{Duration as ChronoDuration, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use shared::calendar::{self, CalendarBuildParams, CellStatus};
use shared::collaborators::ClientMeetingLookup;
use shared::models::MeetingStatus;
use shared::orchestrator;

use super::AppState;
use super::errors::{access_denied_html, internal_error};

const SLOT_MINUTES: u32 = 30;
const MAX_AVAILABILITY_CELLS: u32 = 2000;
const MIN_WEEK_OFFSET: i32 = -8;
const MAX_WEEK_OFFSET: i32 = 52;

#[derive(Debug, Deserialize)]
pub(super) struct AvailabilityQuery {
    t: Option<String>,
    #[serde(rename = "for")]
    client_reference: Option<String>,
    #[serde(rename = "weekOffset", default)]
    week_offset: Option<i32>,
}

struct ResolvedBinding {
    advisor_id: String,
    client_email: String,
    client_display_name: String,
    client_reference: String,
    duration_minutes: u32,
}

async fn resolve_binding(state: &AppState, query: &AvailabilityQuery) -> Option<ResolvedBinding> {
    let token = query.t.as_deref()?;

    if let Ok(Some(record)) = shared::link_store::resolve(state.collaborators.kv_store.as_ref(), token).await {
        return Some(ResolvedBinding {
            advisor_id: record.advisor_id,
            client_email: record.client_email,
            client_display_name: record.client_display_name,
            client_reference: record.client_reference,
            duration_minutes: record.duration_minutes,
        });
    }

    let payload = orchestrator::verify_legacy_token(token, &state.config.hmac_signing_key)?;
    let client_reference = query.client_reference.clone().unwrap_or_default();
    Some(ResolvedBinding {
        advisor_id: payload.advisor_id,
        client_email: client_reference.clone(),
        client_display_name: client_reference.clone(),
        client_reference,
        duration_minutes: payload.duration_minutes.unwrap_or(30),
    })
}

fn format_row_label(workday_start_hour: u32, row: u32) -> String {
    let minutes_from_start = row * SLOT_MINUTES;
    let hour = workday_start_hour + minutes_from_start / 60;
    let minute = minutes_from_start % 60;
    NaiveTime::from_hms_opt(hour % 24, minute, 0)
        .map(|t| t.format("%-I:%M %p").to_string())
        .unwrap_or_default()
}

fn cell_css_class(cell: &shared::calendar::GridCell) -> &'static str {
    match (cell.status, cell.client_meeting_state, cell.has_overlap) {
        (_, Some(MeetingStatus::Accepted), true) => "accepted overlap",
        (_, Some(MeetingStatus::Accepted), false) => "accepted",
        (_, Some(MeetingStatus::Pending), true) => "pending overlap",
        (_, Some(MeetingStatus::Pending), false) => "pending",
        (CellStatus::Busy, None, true) => "busy overlap",
        (CellStatus::Busy, None, false) => "busy",
        (CellStatus::Open, None, true) => "open overlap",
        (CellStatus::Open, None, false) if cell.fits_requested_duration => "open fits",
        (CellStatus::Open, None, false) => "open",
    }
}

fn cell_label(cell: &shared::calendar::GridCell) -> String {
    if let Some(meeting) = cell.meetings.first() {
        return meeting.title.clone();
    }
    match cell.status {
        CellStatus::Open => "Open".to_string(),
        CellStatus::Busy => String::new(),
    }
}

pub(super) async fn render_availability(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> Response {
    let Some(binding) = resolve_binding(&state, &query).await else {
        return access_denied_html();
    };

    let advisor = match state.store.get_advisor(&binding.advisor_id).await {
        Ok(Some(advisor)) => advisor,
        Ok(None) => return access_denied_html(),
        Err(err) => {
            warn!(error = %err, "advisor lookup failed while rendering availability");
            return internal_error("Could not load availability", None);
        }
    };

    let week_offset = query
        .week_offset
        .unwrap_or(0)
        .clamp(MIN_WEEK_OFFSET, MAX_WEEK_OFFSET);

    let now = Utc::now();
    let week_start = now + ChronoDuration::days(7 * week_offset as i64);
    let week_end = week_start + ChronoDuration::days(7);

    let lookup_result = state
        .collaborators
        .calendar
        .lookup_client_meetings(ClientMeetingLookup {
            window_start: week_start,
            window_end: week_end,
            client_email: binding.client_email.clone(),
            advisor_email_hint: Some(advisor.email.clone()),
        })
        .await;

    let (client_meetings, non_client_busy) = match lookup_result {
        Ok(result) => (result.client_meetings, result.non_client_busy_intervals),
        Err(err) => {
            warn!(error = %err, "client meeting lookup failed while rendering availability");
            return internal_error("Could not load availability", None);
        }
    };

    let busy_intervals = match state
        .collaborators
        .calendar
        .lookup_busy_intervals(shared::collaborators::BusyIntervalLookup {
            window_start: week_start,
            window_end: week_end,
        })
        .await
    {
        Ok(busy) => busy,
        Err(err) => {
            warn!(error = %err, "busy interval lookup failed while rendering availability");
            return internal_error("Could not load availability", None);
        }
    };

    let grid = calendar::build(CalendarBuildParams {
        busy_utc: &busy_intervals,
        client_meetings_utc: &client_meetings,
        non_client_busy_utc: &non_client_busy,
        host_timezone: &advisor.time_zone,
        advising_days: &advisor.advising_weekdays,
        search_start: week_start,
        search_end: week_end,
        workday_start_hour: advisor.workday_start_hour as u32,
        workday_end_hour: advisor.workday_end_hour as u32,
        slot_minutes: SLOT_MINUTES,
        requested_duration_minutes: binding.duration_minutes,
        max_cells: MAX_AVAILABILITY_CELLS,
    });

    let row_labels: Vec<String> = (0..grid.rows)
        .map(|row| format_row_label(advisor.workday_start_hour as u32, row))
        .collect();

    let day_columns: Vec<_> = grid
        .cells
        .iter()
        .map(|column| {
            let rows: Vec<_> = column
                .iter()
                .map(|cell| {
                    json!({
                        "render": cell.render,
                        "rowspan": cell.rowspan,
                        "css_class": cell_css_class(cell),
                        "label": cell_label(cell),
                    })
                })
                .collect();
            json!({ "rows": rows })
        })
        .collect();

    let mut context = tera::Context::new();
    context.insert("advisor_display_name", &advisor.display_name);
    context.insert("client_display_name", &binding.client_display_name);
    context.insert("duration_minutes", &binding.duration_minutes);
    context.insert("meeting_type", "online");
    context.insert("token", &query.t.clone().unwrap_or_default());
    context.insert("client_reference", &binding.client_reference);
    context.insert("days", &grid.days);
    context.insert("row_labels", &row_labels);
    context.insert("day_columns", &day_columns);
    context.insert("prev_week_offset", &(week_offset - 1).max(MIN_WEEK_OFFSET));
    context.insert("next_week_offset", &(week_offset + 1).min(MAX_WEEK_OFFSET));

    match state.templates.render("availability.html", &context) {
        Ok(html) => (StatusCode::OK, Html(html)).into_response(),
        Err(err) => {
            warn!(error = %err, "availability template render failed");
            internal_error("Could not render availability", None)
        }
    }
}
