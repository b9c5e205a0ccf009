use sqlx::Row;

use crate::models::{ClientAccessState, IntentSource, TraceRecord, TraceStatus};

use super::{Store, StoreError};

fn trace_status_str(status: TraceStatus) -> &'static str {
    match status {
        TraceStatus::Ok => "ok",
        TraceStatus::Denied => "denied",
        TraceStatus::Failed => "failed",
    }
}

fn trace_status_from_str(value: &str) -> Result<TraceStatus, StoreError> {
    match value {
        "ok" => Ok(TraceStatus::Ok),
        "denied" => Ok(TraceStatus::Denied),
        "failed" => Ok(TraceStatus::Failed),
        other => Err(StoreError::InvalidData(format!(
            "unknown trace status persisted: {other}"
        ))),
    }
}

fn intent_source_str(source: IntentSource) -> &'static str {
    match source {
        IntentSource::Parser => "parser",
        IntentSource::Llm => "llm",
        IntentSource::LlmOverride => "llm_override",
    }
}

fn intent_source_from_str(value: &str) -> Result<IntentSource, StoreError> {
    match value {
        "parser" => Ok(IntentSource::Parser),
        "llm" => Ok(IntentSource::Llm),
        "llm_override" => Ok(IntentSource::LlmOverride),
        other => Err(StoreError::InvalidData(format!(
            "unknown intent source persisted: {other}"
        ))),
    }
}

fn access_state_str(state: ClientAccessState) -> &'static str {
    match state {
        ClientAccessState::Active => "active",
        ClientAccessState::Blocked => "blocked",
        ClientAccessState::Deleted => "deleted",
    }
}

fn access_state_from_str(value: &str) -> Result<ClientAccessState, StoreError> {
    match value {
        "active" => Ok(ClientAccessState::Active),
        "blocked" => Ok(ClientAccessState::Blocked),
        "deleted" => Ok(ClientAccessState::Deleted),
        other => Err(StoreError::InvalidData(format!(
            "unknown access_state persisted: {other}"
        ))),
    }
}

fn row_to_trace(row: sqlx::postgres::PgRow) -> Result<TraceRecord, StoreError> {
    let intent_source: Option<String> = row.try_get("intent_source")?;
    let access_state: Option<String> = row.try_get("access_state")?;

    Ok(TraceRecord {
        request_id: row.try_get("request_id")?,
        response_id: row.try_get("response_id")?,
        advisor_id: row.try_get("advisor_id")?,
        status: trace_status_from_str(row.try_get("status")?)?,
        stage: row.try_get("stage")?,
        intent_source: intent_source.map(|v| intent_source_from_str(&v)).transpose()?,
        llm_status: row.try_get("llm_status")?,
        suggestion_count: row.try_get::<i32, _>("suggestion_count")? as u32,
        delivery_status: row.try_get("delivery_status")?,
        access_state: access_state.map(|v| access_state_from_str(&v)).transpose()?,
        link_ttl_minutes: row
            .try_get::<Option<i32>, _>("link_ttl_minutes")?
            .map(|v| v as u32),
        latency_ms: row.try_get("latency_ms")?,
        feedback_count: row.try_get("feedback_count")?,
        created_at: row.try_get("created_at")?,
    })
}

impl Store {
    /// Writes the metadata-only trace record (§4.5 step 13 / §6). Callers
    /// must never pass `fromEmail`, `subject` or `body` substrings into any
    /// field here.
    pub async fn insert_trace(&self, trace: &TraceRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO traces (
                request_id, response_id, advisor_id, status, stage, intent_source,
                llm_status, suggestion_count, delivery_status, access_state,
                link_ttl_minutes, latency_ms, feedback_count, created_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(&trace.request_id)
        .bind(&trace.response_id)
        .bind(&trace.advisor_id)
        .bind(trace_status_str(trace.status))
        .bind(&trace.stage)
        .bind(trace.intent_source.map(intent_source_str))
        .bind(&trace.llm_status)
        .bind(trace.suggestion_count as i32)
        .bind(&trace.delivery_status)
        .bind(trace.access_state.map(access_state_str))
        .bind(trace.link_ttl_minutes.map(|v| v as i32))
        .bind(trace.latency_ms)
        .bind(trace.feedback_count)
        .bind(trace.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_trace(&self, request_id: &str) -> Result<Option<TraceRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT request_id, response_id, advisor_id, status, stage, intent_source,
                    llm_status, suggestion_count, delivery_status, access_state,
                    link_ttl_minutes, latency_ms, feedback_count, created_at
             FROM traces WHERE request_id = $1",
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_trace).transpose()
    }

    /// Conditionally increments `feedback_count` on the trace matching
    /// `(request_id, response_id)`, per the feedback path's match
    /// requirement (§4.5). Returns `true` iff a row matched.
    pub async fn record_feedback(
        &self,
        request_id: &str,
        response_id: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE traces SET feedback_count = feedback_count + 1
             WHERE request_id = $1 AND response_id = $2",
        )
        .bind(request_id)
        .bind(response_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
