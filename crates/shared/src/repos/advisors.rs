use sqlx::Row;

use crate::models::AdvisorRecord;

use super::{Store, StoreError};

impl Store {
    pub async fn upsert_advisor(&self, advisor: &AdvisorRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO advisors (
                advisor_id, display_name, email, advising_weekdays,
                workday_start_hour, workday_end_hour, default_duration_minutes,
                search_days, max_suggestions, time_zone
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (advisor_id) DO UPDATE SET
               display_name = EXCLUDED.display_name,
               email = EXCLUDED.email,
               advising_weekdays = EXCLUDED.advising_weekdays,
               workday_start_hour = EXCLUDED.workday_start_hour,
               workday_end_hour = EXCLUDED.workday_end_hour,
               default_duration_minutes = EXCLUDED.default_duration_minutes,
               search_days = EXCLUDED.search_days,
               max_suggestions = EXCLUDED.max_suggestions,
               time_zone = EXCLUDED.time_zone,
               updated_at = NOW()",
        )
        .bind(&advisor.advisor_id)
        .bind(&advisor.display_name)
        .bind(&advisor.email)
        .bind(&advisor.advising_weekdays)
        .bind(advisor.workday_start_hour as i16)
        .bind(advisor.workday_end_hour as i16)
        .bind(advisor.default_duration_minutes as i32)
        .bind(advisor.search_days as i32)
        .bind(advisor.max_suggestions as i32)
        .bind(&advisor.time_zone)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_advisor(&self, advisor_id: &str) -> Result<Option<AdvisorRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT advisor_id, display_name, email, advising_weekdays,
                    workday_start_hour, workday_end_hour, default_duration_minutes,
                    search_days, max_suggestions, time_zone
             FROM advisors WHERE advisor_id = $1",
        )
        .bind(advisor_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };

        Ok(Some(AdvisorRecord {
            advisor_id: row.try_get("advisor_id")?,
            display_name: row.try_get("display_name")?,
            email: row.try_get("email")?,
            advising_weekdays: row.try_get("advising_weekdays")?,
            workday_start_hour: row.try_get::<i16, _>("workday_start_hour")? as u8,
            workday_end_hour: row.try_get::<i16, _>("workday_end_hour")? as u8,
            default_duration_minutes: row.try_get::<i32, _>("default_duration_minutes")? as u32,
            search_days: row.try_get::<i32, _>("search_days")? as u32,
            max_suggestions: row.try_get::<i32, _>("max_suggestions")? as u32,
            time_zone: row.try_get("time_zone")?,
        }))
    }
}
