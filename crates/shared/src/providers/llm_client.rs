//! Reqwest-backed [`LlmClient`] using an OpenRouter-style chat-completions
//! request shape (bearer auth, `response_format: json_object`). Retries,
//! circuit breaking, and budget caps are a hybrid-mode collaborator policy
//! layered above this trait, not part of its contract — bounding by
//! `timeout_ms` is the caller's job via [`tokio::time::timeout`].

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::time::timeout;

use crate::collaborators::{CollaboratorError, LlmClient, LlmIntentResult};
use crate::models::{IntentRecord, MeetingType, RequestedWindow};

use super::BoxFuture;

pub struct ReqwestLlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ReqwestLlmClient {
    pub fn new(base_url: String, api_key: String, model: String) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| CollaboratorError::LlmClient(err.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key,
            model,
        })
    }

    async fn chat_completion(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        json_mode: bool,
        timeout_ms: u64,
    ) -> Result<Value, CollaboratorError> {
        let mut body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_prompt }
            ],
            "temperature": 0,
        });

        if json_mode && let Some(object) = body.as_object_mut() {
            object.insert("response_format".to_string(), json!({ "type": "json_object" }));
        }

        let send = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send();

        let response = timeout(Duration::from_millis(timeout_ms), send)
            .await
            .map_err(|_| CollaboratorError::Timeout(timeout_ms))?
            .map_err(|err| CollaboratorError::LlmClient(err.to_string()))?;

        if !response.status().is_success() {
            return Err(CollaboratorError::LlmClient(format!(
                "llm provider returned status {}",
                response.status()
            )));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| CollaboratorError::LlmClient(err.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CollaboratorError::LlmClient("llm response had no choices".to_string()))?
            .message
            .content;

        Ok(content)
    }
}

impl LlmClient for ReqwestLlmClient {
    fn draft_response<'a>(
        &'a self,
        prompt: &'a str,
        timeout_ms: u64,
    ) -> BoxFuture<'a, Result<String, CollaboratorError>> {
        Box::pin(async move {
            let content = self
                .chat_completion(
                    "You draft concise, professional scheduling reply emails.",
                    prompt,
                    false,
                    timeout_ms,
                )
                .await?;

            match content {
                Value::String(text) => Ok(text),
                other => Ok(other.to_string()),
            }
        })
    }

    fn extract_scheduling_intent<'a>(
        &'a self,
        subject: &'a str,
        body: &'a str,
        timeout_ms: u64,
    ) -> BoxFuture<'a, Result<LlmIntentResult, CollaboratorError>> {
        Box::pin(async move {
            let user_prompt = json!({
                "subject": subject,
                "body": body,
                "instruction": "Extract scheduling intent as JSON: {clientEmail, meetingType (online|in_person), durationMinutes, requestedWindows: [{startIso, endIso}], clientTimezone, confidence (0-1)}",
            })
            .to_string();

            let content = self
                .chat_completion(
                    "You extract structured scheduling intent from client emails and reply with JSON only.",
                    &user_prompt,
                    true,
                    timeout_ms,
                )
                .await?;

            let parsed: LlmExtractedIntent = match content {
                Value::String(raw) => serde_json::from_str(&raw).map_err(|err| {
                    CollaboratorError::LlmClient(format!("llm content was not valid json: {err}"))
                })?,
                value @ Value::Object(_) => serde_json::from_value(value).map_err(|err| {
                    CollaboratorError::LlmClient(format!("llm content did not match schema: {err}"))
                })?,
                _ => {
                    return Err(CollaboratorError::LlmClient(
                        "llm content had an unsupported shape".to_string(),
                    ));
                }
            };

            let meeting_type = match parsed.meeting_type.as_deref() {
                Some("in_person") => MeetingType::InPerson,
                _ => MeetingType::Online,
            };

            Ok(LlmIntentResult {
                intent: IntentRecord {
                    client_email: parsed.client_email.unwrap_or_default(),
                    meeting_type,
                    duration_minutes: parsed.duration_minutes.unwrap_or(30),
                    requested_windows: parsed
                        .requested_windows
                        .unwrap_or_default()
                        .into_iter()
                        .map(|window| RequestedWindow {
                            start_iso: window.start_iso,
                            end_iso: window.end_iso,
                        })
                        .collect(),
                    client_timezone: parsed.client_timezone,
                },
                confidence: parsed.confidence.unwrap_or(0.0),
            })
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: Value,
}

#[derive(Debug, Deserialize)]
struct LlmExtractedWindow {
    #[serde(rename = "startIso")]
    start_iso: String,
    #[serde(rename = "endIso")]
    end_iso: String,
}

#[derive(Debug, Deserialize)]
struct LlmExtractedIntent {
    #[serde(rename = "clientEmail")]
    client_email: Option<String>,
    #[serde(rename = "meetingType")]
    meeting_type: Option<String>,
    #[serde(rename = "durationMinutes")]
    duration_minutes: Option<u32>,
    #[serde(rename = "requestedWindows")]
    requested_windows: Option<Vec<LlmExtractedWindow>>,
    #[serde(rename = "clientTimezone")]
    client_timezone: Option<String>,
    confidence: Option<f64>,
}
