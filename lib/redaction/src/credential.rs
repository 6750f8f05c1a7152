//! Credential types and secret extraction.
//!
//! The engine never stores credential bodies alongside execution data; it
//! asks a [`SecretsProvider`] for the scalar values of a credential when a
//! dataclip is viewed, and masks those values in the display text.

use amber_relay_core::CredentialId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::Mutex;

/// Secrets shorter than this are left untouched: masking two-character
/// fragments would riddle ordinary payloads with false positives.
pub const MIN_SECRET_LEN: usize = 3;

/// A stored credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// Unique identifier.
    pub id: CredentialId,
    /// Credential name/label.
    pub name: String,
    /// The credential body. Every scalar leaf is treated as a secret.
    pub body: JsonValue,
}

impl Credential {
    /// Creates a new credential.
    #[must_use]
    pub fn new(name: impl Into<String>, body: JsonValue) -> Self {
        Self {
            id: CredentialId::new(),
            name: name.into(),
            body,
        }
    }

    /// Returns the maskable scalar leaf values of this credential's body.
    #[must_use]
    pub fn secret_values(&self) -> Vec<String> {
        secret_values(&self.body)
    }
}

/// Collects the maskable scalar leaf values of a JSON body.
///
/// Strings and numbers are collected in document order; booleans, nulls,
/// and values shorter than [`MIN_SECRET_LEN`] are skipped. Object keys are
/// structure, not secrets.
#[must_use]
pub fn secret_values(body: &JsonValue) -> Vec<String> {
    let mut values = Vec::new();
    collect_leaves(body, &mut values);
    values
}

fn collect_leaves(value: &JsonValue, out: &mut Vec<String>) {
    match value {
        JsonValue::String(text) => {
            if text.len() >= MIN_SECRET_LEN {
                out.push(text.clone());
            }
        }
        JsonValue::Number(number) => {
            let rendered = number.to_string();
            if rendered.len() >= MIN_SECRET_LEN {
                out.push(rendered);
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                collect_leaves(item, out);
            }
        }
        JsonValue::Object(entries) => {
            for entry in entries.values() {
                collect_leaves(entry, out);
            }
        }
        JsonValue::Bool(_) | JsonValue::Null => {}
    }
}

/// Errors from secret lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretsError {
    /// Credential not found.
    NotFound { credential_id: CredentialId },
    /// The credential backend could not be reached.
    Unavailable { message: String },
}

impl fmt::Display for SecretsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { credential_id } => {
                write!(f, "credential not found: {credential_id}")
            }
            Self::Unavailable { message } => {
                write!(f, "credential backend unavailable: {message}")
            }
        }
    }
}

impl std::error::Error for SecretsError {}

/// Trait for credential secret lookups.
///
/// The credential store itself is an external collaborator; the engine only
/// needs the scalar values to build a redaction set.
#[async_trait]
pub trait SecretsProvider: Send + Sync {
    /// Returns the maskable scalar values of the given credential.
    async fn secrets_for(&self, credential_id: CredentialId) -> Result<Vec<String>, SecretsError>;
}

/// In-memory secrets provider for tests and dev mode.
#[derive(Default)]
pub struct InMemorySecretsProvider {
    credentials: Mutex<HashMap<CredentialId, Credential>>,
}

impl InMemorySecretsProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a credential.
    pub async fn insert(&self, credential: Credential) {
        let mut credentials = self.credentials.lock().await;
        credentials.insert(credential.id, credential);
    }
}

#[async_trait]
impl SecretsProvider for InMemorySecretsProvider {
    async fn secrets_for(&self, credential_id: CredentialId) -> Result<Vec<String>, SecretsError> {
        let credentials = self.credentials.lock().await;
        credentials
            .get(&credential_id)
            .map(Credential::secret_values)
            .ok_or(SecretsError::NotFound { credential_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collects_strings_and_numbers() {
        let body = json!({
            "username": "admin",
            "password": "hunter2",
            "pin": 123456,
        });

        let values = secret_values(&body);
        assert!(values.contains(&"admin".to_string()));
        assert!(values.contains(&"hunter2".to_string()));
        assert!(values.contains(&"123456".to_string()));
    }

    #[test]
    fn skips_booleans_nulls_and_short_values() {
        let body = json!({
            "active": true,
            "expired": null,
            "region": "eu",
            "port": 55,
        });

        assert!(secret_values(&body).is_empty());
    }

    #[test]
    fn recurses_into_nested_structures() {
        let body = json!({
            "oauth": {
                "access_token": "tok_abc123",
                "scopes": ["read:all", "write:all"],
            },
        });

        let values = secret_values(&body);
        assert_eq!(
            values,
            vec!["tok_abc123", "read:all", "write:all"]
        );
    }

    #[test]
    fn object_keys_are_not_secrets() {
        let body = json!({"looks_like_a_number": "789"});
        let values = secret_values(&body);
        assert_eq!(values, vec!["789"]);
    }

    #[tokio::test]
    async fn in_memory_provider_round_trip() {
        let provider = InMemorySecretsProvider::new();
        let credential = Credential::new("dhis2 login", json!({"password": "district"}));
        let credential_id = credential.id;
        provider.insert(credential).await;

        let secrets = provider.secrets_for(credential_id).await.expect("found");
        assert_eq!(secrets, vec!["district"]);

        let err = provider
            .secrets_for(CredentialId::new())
            .await
            .expect_err("missing");
        assert!(matches!(err, SecretsError::NotFound { .. }));
    }
}
