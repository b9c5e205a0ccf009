#![allow(dead_code)]

//! Collaborator doubles for the Portal Router integration tests. These
//! mirror the in-memory `KeyValueStore` fake already used by
//! `shared::link_store`'s unit tests, generalized into standalone types
//! shared across test files instead of one inline test struct.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use shared::collaborators::{
    BoxFuture, BusyIntervalLookup, CalendarProvider, ClientMeetingLookup, ClientMeetingLookupResult,
    CollaboratorError, ConditionalUpdate, KeyValueStore, LlmClient, LlmIntentResult, Mailer,
};
use shared::models::{BusyInterval, ClientMeeting, IntentRecord};

#[derive(Default)]
pub struct InMemoryKeyValueStore {
    data: Mutex<HashMap<(String, String), serde_json::Value>>,
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get<'a>(
        &'a self,
        partition_key: &'a str,
        sort_key: &'a str,
    ) -> BoxFuture<'a, Result<Option<serde_json::Value>, CollaboratorError>> {
        Box::pin(async move {
            Ok(self
                .data
                .lock()
                .unwrap()
                .get(&(partition_key.to_string(), sort_key.to_string()))
                .cloned())
        })
    }

    fn put<'a>(
        &'a self,
        partition_key: &'a str,
        sort_key: &'a str,
        value: serde_json::Value,
    ) -> BoxFuture<'a, Result<(), CollaboratorError>> {
        Box::pin(async move {
            self.data
                .lock()
                .unwrap()
                .insert((partition_key.to_string(), sort_key.to_string()), value);
            Ok(())
        })
    }

    fn delete<'a>(
        &'a self,
        partition_key: &'a str,
        sort_key: &'a str,
    ) -> BoxFuture<'a, Result<(), CollaboratorError>> {
        Box::pin(async move {
            self.data
                .lock()
                .unwrap()
                .remove(&(partition_key.to_string(), sort_key.to_string()));
            Ok(())
        })
    }

    fn query<'a>(&'a self, partition_key: &'a str) -> BoxFuture<'a, Result<Vec<serde_json::Value>, CollaboratorError>> {
        let partition_key = partition_key.to_string();
        Box::pin(async move {
            Ok(self
                .data
                .lock()
                .unwrap()
                .iter()
                .filter(|((p, _), _)| *p == partition_key)
                .map(|(_, v)| v.clone())
                .collect())
        })
    }

    fn put_if_absent<'a>(
        &'a self,
        partition_key: &'a str,
        sort_key: &'a str,
        value: serde_json::Value,
        _ttl_seconds: u64,
    ) -> BoxFuture<'a, Result<bool, CollaboratorError>> {
        Box::pin(async move {
            let mut data = self.data.lock().unwrap();
            let key = (partition_key.to_string(), sort_key.to_string());
            if data.contains_key(&key) {
                Ok(false)
            } else {
                data.insert(key, value);
                Ok(true)
            }
        })
    }

    fn conditional_update<'a>(&'a self, _update: ConditionalUpdate) -> BoxFuture<'a, Result<bool, CollaboratorError>> {
        Box::pin(async move { Ok(true) })
    }
}

/// A calendar double whose busy intervals and client meetings are fixed at
/// construction — the orchestrator's own Mock-mode path never calls this
/// (it reads `mockBusyIntervals` off the request instead), so this only
/// backs tests that exercise `DirectOauth`/`PerAdvisorConnection` mode or
/// the always-live `/availability` view.
pub struct StubCalendarProvider {
    busy_intervals: Vec<BusyInterval>,
    client_meetings: Vec<ClientMeeting>,
    non_client_busy_intervals: Vec<BusyInterval>,
}

impl StubCalendarProvider {
    pub fn empty() -> Self {
        Self {
            busy_intervals: Vec::new(),
            client_meetings: Vec::new(),
            non_client_busy_intervals: Vec::new(),
        }
    }

    pub fn with_busy_intervals(busy_intervals: Vec<BusyInterval>) -> Self {
        Self {
            busy_intervals,
            client_meetings: Vec::new(),
            non_client_busy_intervals: Vec::new(),
        }
    }

    pub fn with_client_meetings(client_meetings: Vec<ClientMeeting>, non_client_busy_intervals: Vec<BusyInterval>) -> Self {
        Self {
            busy_intervals: Vec::new(),
            client_meetings,
            non_client_busy_intervals,
        }
    }
}

impl CalendarProvider for StubCalendarProvider {
    fn lookup_busy_intervals<'a>(
        &'a self,
        _lookup: BusyIntervalLookup,
    ) -> BoxFuture<'a, Result<Vec<BusyInterval>, CollaboratorError>> {
        Box::pin(async move { Ok(self.busy_intervals.clone()) })
    }

    fn lookup_client_meetings<'a>(
        &'a self,
        _lookup: ClientMeetingLookup,
    ) -> BoxFuture<'a, Result<ClientMeetingLookupResult, CollaboratorError>> {
        Box::pin(async move {
            Ok(ClientMeetingLookupResult {
                client_meetings: self.client_meetings.clone(),
                non_client_busy_intervals: self.non_client_busy_intervals.clone(),
            })
        })
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(String, String, String)>>,
}

impl Mailer for RecordingMailer {
    fn send<'a>(
        &'a self,
        to: &'a str,
        subject: &'a str,
        body: &'a str,
    ) -> BoxFuture<'a, Result<(), CollaboratorError>> {
        Box::pin(async move {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string(), body.to_string()));
            Ok(())
        })
    }
}

/// An [`LlmClient`] double that never actually gets called in tests that
/// leave `INTENT_EXTRACTION_MODE=parser` (the default); kept around so
/// tests exercising `llm_hybrid` mode have something deterministic to wire
/// in without a live network call.
pub struct StubLlmClient {
    pub intent: Option<(IntentRecord, f64)>,
    pub draft: Option<String>,
}

impl StubLlmClient {
    pub fn disabled() -> Self {
        Self {
            intent: None,
            draft: None,
        }
    }
}

impl LlmClient for StubLlmClient {
    fn draft_response<'a>(&'a self, _prompt: &'a str, _timeout_ms: u64) -> BoxFuture<'a, Result<String, CollaboratorError>> {
        Box::pin(async move {
            match &self.draft {
                Some(draft) => Ok(draft.clone()),
                None => Err(CollaboratorError::LlmClient("no stubbed draft".to_string())),
            }
        })
    }

    fn extract_scheduling_intent<'a>(
        &'a self,
        _subject: &'a str,
        _body: &'a str,
        _timeout_ms: u64,
    ) -> BoxFuture<'a, Result<LlmIntentResult, CollaboratorError>> {
        Box::pin(async move {
            match &self.intent {
                Some((intent, confidence)) => Ok(LlmIntentResult {
                    intent: intent.clone(),
                    confidence: *confidence,
                }),
                None => Err(CollaboratorError::LlmClient("no stubbed intent".to_string())),
            }
        })
    }
}

pub fn busy_interval(start: DateTime<Utc>, end: DateTime<Utc>) -> BusyInterval {
    BusyInterval {
        start,
        end,
        calendar_id: None,
    }
}
