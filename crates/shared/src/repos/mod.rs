//! Durable persistence for advisor/client/policy/trace records (§3, §6).
//!
//! Availability links and OAuth nonces are *not* stored here — those go
//! through the `KeyValueStore` collaborator (backed by Redis, see
//! [`crate::providers::redis_kv`]) because they need the "create if
//! absent" primitive and implicit TTL expiry. This module owns the
//! relational records that the Portal Router CRUDs and that the
//! orchestrator reads/writes across the lifetime of a trace.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

mod advisors;
mod clients;
mod policies;
mod traces;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
}

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let _: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
