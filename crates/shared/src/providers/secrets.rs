//! Environment-backed [`SecretStore`]. There is no secrets-manager client
//! in this workspace's dependency stack, so this reads the secret body
//! from an env var named after the ARN's last path segment, which is
//! sufficient for a single-process deployment.

use std::collections::HashMap;
use std::env;
use std::sync::Mutex;

use crate::collaborators::{CollaboratorError, SecretStore};

use super::BoxFuture;

/// Caches fetched secret bodies process-locally, keyed by ARN — per §9's
/// secret-parsing cache design note.
pub struct EnvSecretStore {
    cache: Mutex<HashMap<String, String>>,
}

impl EnvSecretStore {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn env_var_name(arn: &str) -> String {
        arn.rsplit(':').next().unwrap_or(arn).to_string()
    }
}

impl Default for EnvSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStore for EnvSecretStore {
    fn get_secret_string<'a>(
        &'a self,
        arn: &'a str,
    ) -> BoxFuture<'a, Result<String, CollaboratorError>> {
        Box::pin(async move {
            if let Some(cached) = self.cache.lock().expect("secret cache poisoned").get(arn) {
                return Ok(cached.clone());
            }

            let var_name = Self::env_var_name(arn);
            let value = env::var(&var_name).map_err(|_| {
                CollaboratorError::SecretStore(format!("no secret found for arn {arn}"))
            })?;

            self.cache
                .lock()
                .expect("secret cache poisoned")
                .insert(arn.to_string(), value.clone());

            Ok(value)
        })
    }
}
