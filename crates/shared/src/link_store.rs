//! C5: short-token allocation and lookup for availability links, built on
//! the `KeyValueStore` "create if absent" primitive.

use rand::Rng;
use rand::distributions::Alphanumeric;
use thiserror::Error;

use crate::collaborators::{CollaboratorError, KeyValueStore};
use crate::models::AvailabilityLinkRecord;

const TOKEN_ID_LENGTH: usize = 16;
const PARTITION_KEY: &str = "availability-link";
const MAX_ALLOCATION_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum LinkStoreError {
    #[error("token allocation failed after {0} collisions")]
    AllocationExhausted(u32),
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

/// A random 16-character base62-ish id — alphanumeric, not cryptographically
/// reviewed for bias, matching the "base62-ish" wording in §4.4.
fn random_token_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_ID_LENGTH)
        .map(char::from)
        .collect()
}

/// Allocates a new availability link, retrying on id collision up to
/// [`MAX_ALLOCATION_ATTEMPTS`] times. §9's open question: this cap gives a
/// vanishing but non-zero collision probability; it is intentionally left
/// as-is rather than "fixed".
pub async fn allocate(
    kv_store: &dyn KeyValueStore,
    mut build_record: impl FnMut(String) -> AvailabilityLinkRecord,
    ttl_seconds: u64,
) -> Result<AvailabilityLinkRecord, LinkStoreError> {
    for _ in 0..MAX_ALLOCATION_ATTEMPTS {
        let token_id = random_token_id();
        let record = build_record(token_id.clone());
        let value = serde_json::to_value(&record).map_err(|err| {
            LinkStoreError::Collaborator(CollaboratorError::KeyValueStore(err.to_string()))
        })?;

        let created = kv_store
            .put_if_absent(PARTITION_KEY, &token_id, value, ttl_seconds)
            .await?;

        if created {
            return Ok(record);
        }
    }

    Err(LinkStoreError::AllocationExhausted(MAX_ALLOCATION_ATTEMPTS))
}

pub async fn resolve(
    kv_store: &dyn KeyValueStore,
    token_id: &str,
) -> Result<Option<AvailabilityLinkRecord>, LinkStoreError> {
    let Some(value) = kv_store.get(PARTITION_KEY, token_id).await? else {
        return Ok(None);
    };

    let record: AvailabilityLinkRecord = serde_json::from_value(value).map_err(|err| {
        LinkStoreError::Collaborator(CollaboratorError::KeyValueStore(err.to_string()))
    })?;

    if record.expires_at_ms <= chrono::Utc::now().timestamp_millis() {
        return Ok(None);
    }

    Ok(Some(record))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::collaborators::{BoxFuture, ConditionalUpdate};

    #[derive(Default)]
    struct InMemoryKeyValueStore {
        data: Mutex<HashMap<(String, String), serde_json::Value>>,
        collisions_before_success: Mutex<u32>,
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
                let mut collisions = self.collisions_before_success.lock().unwrap();
                if *collisions > 0 {
                    *collisions -= 1;
                    return Ok(false);
                }
                drop(collisions);

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

    fn sample_record(token_id: String) -> AvailabilityLinkRecord {
        AvailabilityLinkRecord {
            token_id,
            advisor_id: "advisor-1".to_string(),
            client_id: "client-1".to_string(),
            client_email: "client@example.com".to_string(),
            client_display_name: "Client One".to_string(),
            client_reference: "ref-1".to_string(),
            client_timezone: None,
            duration_minutes: 30,
            issued_at_ms: 0,
            expires_at_ms: 60_000,
        }
    }

    #[tokio::test]
    async fn allocate_succeeds_on_first_try_when_no_collision() {
        let store = InMemoryKeyValueStore::default();
        let record = allocate(&store, sample_record, 3600).await.expect("allocates");
        assert_eq!(record.token_id.len(), TOKEN_ID_LENGTH);
    }

    #[tokio::test]
    async fn allocate_retries_through_collisions_then_succeeds() {
        let store = InMemoryKeyValueStore::default();
        *store.collisions_before_success.lock().unwrap() = 2;
        let record = allocate(&store, sample_record, 3600).await.expect("allocates");
        assert_eq!(record.token_id.len(), TOKEN_ID_LENGTH);
    }

    #[tokio::test]
    async fn allocate_fails_fatally_after_three_collisions() {
        let store = InMemoryKeyValueStore::default();
        *store.collisions_before_success.lock().unwrap() = 3;
        let result = allocate(&store, sample_record, 3600).await;
        assert!(matches!(result, Err(LinkStoreError::AllocationExhausted(3))));
    }
}
