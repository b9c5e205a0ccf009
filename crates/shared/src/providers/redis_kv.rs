//! Redis-backed [`KeyValueStore`] — the production implementation for
//! availability links and OAuth nonces, using `redis::AsyncCommands` with
//! `SET ... NX ... EX` as the atomic primitive.

use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::collaborators::{CollaboratorError, ConditionalUpdate, KeyValueStore};

use super::BoxFuture;

#[derive(Clone)]
pub struct RedisKeyValueStore {
    connection: ConnectionManager,
}

impl RedisKeyValueStore {
    pub async fn connect(redis_url: &str) -> Result<Self, CollaboratorError> {
        let client = redis::Client::open(redis_url)
            .map_err(|err| CollaboratorError::KeyValueStore(err.to_string()))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|err| CollaboratorError::KeyValueStore(err.to_string()))?;

        Ok(Self { connection })
    }

    fn compose_key(partition_key: &str, sort_key: &str) -> String {
        format!("kv:{partition_key}:{sort_key}")
    }

    fn partition_prefix(partition_key: &str) -> String {
        format!("kv:{partition_key}:")
    }
}

impl KeyValueStore for RedisKeyValueStore {
    fn get<'a>(
        &'a self,
        partition_key: &'a str,
        sort_key: &'a str,
    ) -> BoxFuture<'a, Result<Option<serde_json::Value>, CollaboratorError>> {
        Box::pin(async move {
            let mut connection = self.connection.clone();
            let raw: Option<String> = connection
                .get(Self::compose_key(partition_key, sort_key))
                .await
                .map_err(|err| CollaboratorError::KeyValueStore(err.to_string()))?;

            raw.map(|value| {
                serde_json::from_str(&value)
                    .map_err(|err| CollaboratorError::KeyValueStore(err.to_string()))
            })
            .transpose()
        })
    }

    fn put<'a>(
        &'a self,
        partition_key: &'a str,
        sort_key: &'a str,
        value: serde_json::Value,
    ) -> BoxFuture<'a, Result<(), CollaboratorError>> {
        Box::pin(async move {
            let serialized = value.to_string();
            let mut connection = self.connection.clone();
            let _: () = connection
                .set(Self::compose_key(partition_key, sort_key), serialized)
                .await
                .map_err(|err| CollaboratorError::KeyValueStore(err.to_string()))?;
            Ok(())
        })
    }

    fn delete<'a>(
        &'a self,
        partition_key: &'a str,
        sort_key: &'a str,
    ) -> BoxFuture<'a, Result<(), CollaboratorError>> {
        Box::pin(async move {
            let mut connection = self.connection.clone();
            let _: i64 = connection
                .del(Self::compose_key(partition_key, sort_key))
                .await
                .map_err(|err| CollaboratorError::KeyValueStore(err.to_string()))?;
            Ok(())
        })
    }

    fn query<'a>(
        &'a self,
        partition_key: &'a str,
    ) -> BoxFuture<'a, Result<Vec<serde_json::Value>, CollaboratorError>> {
        Box::pin(async move {
            let mut connection = self.connection.clone();
            let pattern = format!("{}*", Self::partition_prefix(partition_key));
            let keys: Vec<String> = connection
                .keys(pattern)
                .await
                .map_err(|err| CollaboratorError::KeyValueStore(err.to_string()))?;

            if keys.is_empty() {
                return Ok(Vec::new());
            }

            let raw_values: Vec<Option<String>> = connection
                .get(keys)
                .await
                .map_err(|err| CollaboratorError::KeyValueStore(err.to_string()))?;

            raw_values
                .into_iter()
                .flatten()
                .map(|raw| {
                    serde_json::from_str(&raw)
                        .map_err(|err| CollaboratorError::KeyValueStore(err.to_string()))
                })
                .collect()
        })
    }

    /// Backed by `SET key value NX EX ttl_seconds` — the single atomic
    /// round trip the §4.4/§5 uniqueness guarantee depends on.
    fn put_if_absent<'a>(
        &'a self,
        partition_key: &'a str,
        sort_key: &'a str,
        value: serde_json::Value,
        ttl_seconds: u64,
    ) -> BoxFuture<'a, Result<bool, CollaboratorError>> {
        Box::pin(async move {
            let serialized = value.to_string();
            let mut connection = self.connection.clone();
            let options = redis::SetOptions::default()
                .conditional_set(redis::ExistenceCheck::NX)
                .with_expiration(redis::SetExpiry::EX(ttl_seconds.max(1) as i64 as u64));

            let result: Option<String> = connection
                .set_options(
                    Self::compose_key(partition_key, sort_key),
                    serialized,
                    options,
                )
                .await
                .map_err(|err| CollaboratorError::KeyValueStore(err.to_string()))?;

            Ok(result.is_some())
        })
    }

    fn conditional_update<'a>(
        &'a self,
        update: ConditionalUpdate,
    ) -> BoxFuture<'a, Result<bool, CollaboratorError>> {
        Box::pin(async move {
            let key = Self::compose_key(&update.partition_key, &update.sort_key);
            let mut connection = self.connection.clone();
            let existing: Option<String> = connection
                .get(&key)
                .await
                .map_err(|err| CollaboratorError::KeyValueStore(err.to_string()))?;

            let Some(existing) = existing else {
                return Ok(false);
            };

            let mut current: serde_json::Value = serde_json::from_str(&existing)
                .map_err(|err| CollaboratorError::KeyValueStore(err.to_string()))?;

            if let Some(expected_version) = update.expected_version {
                let actual_version = current.get("version").and_then(|v| v.as_i64());
                if actual_version != Some(expected_version) {
                    return Ok(false);
                }
            }

            if let (Some(current_object), Some(patch_object)) =
                (current.as_object_mut(), update.patch.as_object())
            {
                for (field, patch_value) in patch_object {
                    current_object.insert(field.clone(), patch_value.clone());
                }
            }

            let _: () = connection
                .set(&key, current.to_string())
                .await
                .map_err(|err| CollaboratorError::KeyValueStore(err.to_string()))?;

            Ok(true)
        })
    }
}
