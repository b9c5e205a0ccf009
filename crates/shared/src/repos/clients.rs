use sqlx::Row;

use crate::models::{ClientAccessState, ClientRecord};

use super::{Store, StoreError};

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
            "unknown client access_state persisted: {other}"
        ))),
    }
}

fn row_to_client(row: sqlx::postgres::PgRow) -> Result<ClientRecord, StoreError> {
    Ok(ClientRecord {
        client_id: row.try_get("client_id")?,
        advisor_id: row.try_get("advisor_id")?,
        email: row.try_get("email")?,
        display_name: row.try_get("display_name")?,
        access_state: access_state_from_str(row.try_get("access_state")?)?,
        interaction_count: row.try_get("interaction_count")?,
        advising_weekdays_override: row.try_get("advising_weekdays_override")?,
    })
}

impl Store {
    pub async fn upsert_client(&self, client: &ClientRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO clients (
                client_id, advisor_id, email, display_name, access_state,
                interaction_count, advising_weekdays_override
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (client_id) DO UPDATE SET
               email = EXCLUDED.email,
               display_name = EXCLUDED.display_name,
               access_state = EXCLUDED.access_state,
               advising_weekdays_override = EXCLUDED.advising_weekdays_override,
               updated_at = NOW()",
        )
        .bind(&client.client_id)
        .bind(&client.advisor_id)
        .bind(&client.email)
        .bind(&client.display_name)
        .bind(access_state_str(client.access_state))
        .bind(client.interaction_count)
        .bind(&client.advising_weekdays_override)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_client(&self, client_id: &str) -> Result<Option<ClientRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT client_id, advisor_id, email, display_name, access_state,
                    interaction_count, advising_weekdays_override
             FROM clients WHERE client_id = $1",
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_client).transpose()
    }

    /// Looks a client up by the advisor-scoped `(advisor_id, email)` pair —
    /// the shape the orchestrator has on hand when an email arrives.
    pub async fn find_client_by_email(
        &self,
        advisor_id: &str,
        email: &str,
    ) -> Result<Option<ClientRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT client_id, advisor_id, email, display_name, access_state,
                    interaction_count, advising_weekdays_override
             FROM clients WHERE advisor_id = $1 AND email = $2",
        )
        .bind(advisor_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_client).transpose()
    }

    pub async fn list_clients(&self, advisor_id: &str) -> Result<Vec<ClientRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT client_id, advisor_id, email, display_name, access_state,
                    interaction_count, advising_weekdays_override
             FROM clients WHERE advisor_id = $1 ORDER BY client_id",
        )
        .bind(advisor_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_client).collect()
    }

    pub async fn set_client_access_state(
        &self,
        client_id: &str,
        access_state: ClientAccessState,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE clients SET access_state = $2, updated_at = NOW() WHERE client_id = $1",
        )
        .bind(client_id)
        .bind(access_state_str(access_state))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Additive, commutative counter update — concurrent callers on the
    /// same client never need coordination (§5).
    pub async fn increment_client_interaction_count(&self, client_id: &str) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE clients SET interaction_count = interaction_count + 1, updated_at = NOW()
             WHERE client_id = $1",
        )
        .bind(client_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
