//! Durable key-value storage used by the security store.
//!
//! The security store keeps three JSON documents under fixed keys. Backends only need to
//! store strings; versioning and (de)serialization live in this module.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{Error, error::StorageError};

/// Failed login attempts: `email -> [iso timestamp]`.
pub const LOGIN_ATTEMPTS_KEY: &str = "loginAttempts";
/// Lockout expiry: `email -> iso timestamp`.
pub const ACCOUNT_LOCKOUTS_KEY: &str = "accountLockouts";
/// Password history: `email -> [representation]`, newest first.
pub const PASSWORD_HISTORY_KEY: &str = "passwordHistory";

/// Version written by this build.
pub const SCHEMA_VERSION: u64 = 1;

/// A string-valued key-value store.
///
/// Implementations must be safe to share between tasks. Writes are last-writer-wins; there is
/// no cross-process coordination.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;
    async fn set(&self, key: &str, value: &str) -> Result<(), Error>;
    async fn remove(&self, key: &str) -> Result<(), Error>;
}

/// In-memory store, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: DashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Serialize `data` wrapped in the current version envelope.
pub fn encode_document<T: Serialize>(data: &T) -> Result<String, StorageError> {
    let envelope = serde_json::json!({
        "version": SCHEMA_VERSION,
        "data": data,
    });
    Ok(serde_json::to_string(&envelope)?)
}

/// Parse a stored document, migrating older versions forward.
///
/// A document without the `{"version", "data"}` envelope is version 0: the bare map written by
/// earlier clients.
pub fn decode_document<T: DeserializeOwned>(raw: &str) -> Result<T, StorageError> {
    let value: Value = serde_json::from_str(raw)?;
    let (version, data) = split_envelope(value);
    let data = migrate(version, data)?;
    Ok(serde_json::from_value(data)?)
}

fn split_envelope(value: Value) -> (u64, Value) {
    if let Value::Object(mut map) = value {
        let is_envelope = map.len() == 2
            && map.get("version").is_some_and(Value::is_u64)
            && map.contains_key("data");
        if is_envelope {
            let version = map.get("version").and_then(Value::as_u64).unwrap_or(0);
            let data = map.remove("data").unwrap_or(Value::Null);
            return (version, data);
        }
        return (0, Value::Object(map));
    }
    (0, value)
}

fn migrate(version: u64, data: Value) -> Result<Value, StorageError> {
    match version {
        // v0 -> v1: the payload shape is unchanged, only the envelope is new
        0 | SCHEMA_VERSION => Ok(data),
        found => Err(StorageError::UnsupportedVersion {
            found,
            supported: SCHEMA_VERSION,
        }),
    }
}
