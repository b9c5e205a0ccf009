use sqlx::Row;

use crate::models::{AdvisorPolicyRecord, IntentExtractionMode, ResponseMode};

use super::{Store, StoreError};

fn intent_mode_str(mode: IntentExtractionMode) -> &'static str {
    match mode {
        IntentExtractionMode::Parser => "parser",
        IntentExtractionMode::LlmHybrid => "llm_hybrid",
    }
}

fn intent_mode_from_str(value: &str) -> Result<IntentExtractionMode, StoreError> {
    match value {
        "parser" => Ok(IntentExtractionMode::Parser),
        "llm_hybrid" => Ok(IntentExtractionMode::LlmHybrid),
        other => Err(StoreError::InvalidData(format!(
            "unknown intent_extraction_mode persisted: {other}"
        ))),
    }
}

fn response_mode_str(mode: ResponseMode) -> &'static str {
    match mode {
        ResponseMode::Log => "log",
        ResponseMode::Send => "send",
    }
}

fn response_mode_from_str(value: &str) -> Result<ResponseMode, StoreError> {
    match value {
        "log" => Ok(ResponseMode::Log),
        "send" => Ok(ResponseMode::Send),
        other => Err(StoreError::InvalidData(format!(
            "unknown response_mode persisted: {other}"
        ))),
    }
}

impl Store {
    pub async fn upsert_advisor_policy(&self, policy: &AdvisorPolicyRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO advisor_policies (
                policy_id, advisor_id, advising_weekdays_preset,
                intent_extraction_mode, response_mode, llm_confidence_threshold, ttl_minutes
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (advisor_id) DO UPDATE SET
               advising_weekdays_preset = EXCLUDED.advising_weekdays_preset,
               intent_extraction_mode = EXCLUDED.intent_extraction_mode,
               response_mode = EXCLUDED.response_mode,
               llm_confidence_threshold = EXCLUDED.llm_confidence_threshold,
               ttl_minutes = EXCLUDED.ttl_minutes,
               updated_at = NOW()",
        )
        .bind(&policy.policy_id)
        .bind(&policy.advisor_id)
        .bind(&policy.advising_weekdays_preset)
        .bind(intent_mode_str(policy.intent_extraction_mode))
        .bind(response_mode_str(policy.response_mode))
        .bind(policy.llm_confidence_threshold)
        .bind(policy.ttl_minutes as i32)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_advisor_policy(
        &self,
        advisor_id: &str,
    ) -> Result<Option<AdvisorPolicyRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT policy_id, advisor_id, advising_weekdays_preset,
                    intent_extraction_mode, response_mode, llm_confidence_threshold, ttl_minutes
             FROM advisor_policies WHERE advisor_id = $1",
        )
        .bind(advisor_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };

        Ok(Some(AdvisorPolicyRecord {
            policy_id: row.try_get("policy_id")?,
            advisor_id: row.try_get("advisor_id")?,
            advising_weekdays_preset: row.try_get("advising_weekdays_preset")?,
            intent_extraction_mode: intent_mode_from_str(row.try_get("intent_extraction_mode")?)?,
            response_mode: response_mode_from_str(row.try_get("response_mode")?)?,
            llm_confidence_threshold: row.try_get("llm_confidence_threshold")?,
            ttl_minutes: row.try_get::<i32, _>("ttl_minutes")? as u32,
        }))
    }
}
