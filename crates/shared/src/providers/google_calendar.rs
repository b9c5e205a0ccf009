//! Google Calendar-backed [`CalendarProvider`]. The OAuth refresh-token
//! exchange follows the standard `grant_type=refresh_token` form POST,
//! then a bearer-authenticated follow-up call; this crate has no
//! connector-encryption layer, so the refresh token is handed in directly
//! by the caller (sourced from env or a secret, per the deployment's
//! `CALENDAR_MODE`).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::collaborators::{
    BusyIntervalLookup, CalendarProvider, ClientMeetingLookup, ClientMeetingLookupResult,
    CollaboratorError,
};
use crate::models::{BusyInterval, ClientMeeting, MeetingStatus};

use super::BoxFuture;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const FREEBUSY_URL: &str = "https://www.googleapis.com/calendar/v3/freeBusy";
const EVENTS_URL: &str = "https://www.googleapis.com/calendar/v3/calendars/primary/events";

/// Calendar windows wider than this are split into consecutive chunks
/// before being sent to Google, which caps `freeBusy` queries at ~90 days.
const MAX_WINDOW_DAYS: i64 = 85;

pub struct GoogleCalendarProvider {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

impl GoogleCalendarProvider {
    pub fn new(client_id: String, client_secret: String, refresh_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id,
            client_secret,
            refresh_token,
        }
    }

    async fn access_token(&self) -> Result<String, CollaboratorError> {
        let response = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|err| CollaboratorError::CalendarProvider(err.to_string()))?;

        if !response.status().is_success() {
            return Err(CollaboratorError::CalendarProvider(format!(
                "google token refresh failed with status {}",
                response.status()
            )));
        }

        let payload: TokenResponse = response
            .json()
            .await
            .map_err(|err| CollaboratorError::CalendarProvider(err.to_string()))?;

        Ok(payload.access_token)
    }

    fn chunk_window(window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        let mut chunks = Vec::new();
        let mut cursor = window_start;
        let max_span = ChronoDuration::days(MAX_WINDOW_DAYS);

        while cursor < window_end {
            let chunk_end = (cursor + max_span).min(window_end);
            chunks.push((cursor, chunk_end));
            cursor = chunk_end;
        }

        if chunks.is_empty() {
            chunks.push((window_start, window_end));
        }

        chunks
    }

    async fn freebusy_chunk(
        &self,
        access_token: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, CollaboratorError> {
        let body = json!({
            "timeMin": start.to_rfc3339(),
            "timeMax": end.to_rfc3339(),
            "items": [{ "id": "primary" }],
        });

        let response = self
            .client
            .post(FREEBUSY_URL)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|err| CollaboratorError::CalendarProvider(err.to_string()))?;

        if !response.status().is_success() {
            return Err(CollaboratorError::CalendarProvider(format!(
                "google freeBusy query failed with status {}",
                response.status()
            )));
        }

        let parsed: FreeBusyResponse = response
            .json()
            .await
            .map_err(|err| CollaboratorError::CalendarProvider(err.to_string()))?;

        let busy = parsed
            .calendars
            .get("primary")
            .map(|calendar| calendar.busy.clone())
            .unwrap_or_default();

        Ok(busy
            .into_iter()
            .map(|period| BusyInterval {
                start: period.start,
                end: period.end,
                calendar_id: Some("primary".to_string()),
            })
            .collect())
    }
}

impl CalendarProvider for GoogleCalendarProvider {
    fn lookup_busy_intervals<'a>(
        &'a self,
        lookup: BusyIntervalLookup,
    ) -> BoxFuture<'a, Result<Vec<BusyInterval>, CollaboratorError>> {
        Box::pin(async move {
            let access_token = self.access_token().await?;
            let mut all_busy = Vec::new();

            for (chunk_start, chunk_end) in
                Self::chunk_window(lookup.window_start, lookup.window_end)
            {
                let mut chunk_busy = self
                    .freebusy_chunk(&access_token, chunk_start, chunk_end)
                    .await?;
                all_busy.append(&mut chunk_busy);
            }

            Ok(all_busy)
        })
    }

    fn lookup_client_meetings<'a>(
        &'a self,
        lookup: ClientMeetingLookup,
    ) -> BoxFuture<'a, Result<ClientMeetingLookupResult, CollaboratorError>> {
        Box::pin(async move {
            let access_token = self.access_token().await?;
            let mut client_meetings = Vec::new();
            let mut non_client_busy_intervals = Vec::new();

            for (chunk_start, chunk_end) in
                Self::chunk_window(lookup.window_start, lookup.window_end)
            {
                let response = self
                    .client
                    .get(EVENTS_URL)
                    .bearer_auth(&access_token)
                    .query(&[
                        ("timeMin", chunk_start.to_rfc3339()),
                        ("timeMax", chunk_end.to_rfc3339()),
                        ("singleEvents", "true".to_string()),
                    ])
                    .send()
                    .await
                    .map_err(|err| CollaboratorError::CalendarProvider(err.to_string()))?;

                if !response.status().is_success() {
                    return Err(CollaboratorError::CalendarProvider(format!(
                        "google events.list failed with status {}",
                        response.status()
                    )));
                }

                let parsed: EventsListResponse = response
                    .json()
                    .await
                    .map_err(|err| CollaboratorError::CalendarProvider(err.to_string()))?;

                for event in parsed.items {
                    let (Some(start), Some(end)) = (event.start.date_time, event.end.date_time)
                    else {
                        continue;
                    };

                    let attendee_emails: Vec<String> = event
                        .attendees
                        .unwrap_or_default()
                        .into_iter()
                        .map(|attendee| attendee.email)
                        .collect();

                    let is_client_meeting = attendee_emails
                        .iter()
                        .any(|email| email.eq_ignore_ascii_case(&lookup.client_email));

                    if is_client_meeting {
                        let status = match event.status.as_deref() {
                            Some("confirmed") => MeetingStatus::Accepted,
                            _ => MeetingStatus::Pending,
                        };

                        client_meetings.push(ClientMeeting {
                            start,
                            end,
                            title: event.summary.unwrap_or_default(),
                            advisor_response_status: status,
                        });
                    } else {
                        non_client_busy_intervals.push(BusyInterval {
                            start,
                            end,
                            calendar_id: Some("primary".to_string()),
                        });
                    }
                }
            }

            Ok(ClientMeetingLookupResult {
                client_meetings,
                non_client_busy_intervals,
            })
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct FreeBusyResponse {
    calendars: std::collections::HashMap<String, FreeBusyCalendar>,
}

#[derive(Debug, Deserialize, Clone)]
struct FreeBusyCalendar {
    busy: Vec<FreeBusyPeriod>,
}

#[derive(Debug, Deserialize, Clone)]
struct FreeBusyPeriod {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct EventsListResponse {
    #[serde(default)]
    items: Vec<GoogleEvent>,
}

#[derive(Debug, Deserialize)]
struct GoogleEvent {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    status: Option<String>,
    start: GoogleEventTime,
    end: GoogleEventTime,
    #[serde(default)]
    attendees: Option<Vec<GoogleEventAttendee>>,
}

#[derive(Debug, Deserialize)]
struct GoogleEventTime {
    #[serde(default, rename = "dateTime")]
    date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct GoogleEventAttendee {
    email: String,
}
