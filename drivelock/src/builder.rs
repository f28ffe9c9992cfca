//! Builder pattern for constructing [`DriveLock`] instances
//!
//! Storage has to be chosen before anything can be built; the type parameter of
//! [`DriveLockBuilder`] tracks whether that has happened.
//!
//! # Example
//!
//! ```rust,no_run
//! use drivelock::DriveLockBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let drivelock = DriveLockBuilder::new()
//!         .with_sqlite("sqlite://drivelock.db")
//!         .await?
//!         .with_api_base_url("https://api.rentals.example")
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use drivelock_client::{ApiClient, ApiConfig};
use drivelock_core::{
    AuthState, Clock, KeyValueStore, MemoryStorage, PasswordPolicy, RouteConfig, RouteGuard,
    SecurityConfig, SecurityStore, SystemClock,
};

use crate::DriveLock;

/// Errors that can occur when building a DriveLock instance.
#[derive(Debug, thiserror::Error)]
pub enum DriveLockBuilderError {
    /// Failed to connect to storage backend
    #[error("Storage connection failed: {0}")]
    StorageConnection(String),

    /// Failed to prepare the storage schema
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Marker type indicating no storage has been configured yet.
pub struct NoStorage;

/// Marker type indicating storage has been configured.
pub struct WithStorage<S: KeyValueStore> {
    storage: Arc<S>,
}

/// A type-safe builder for [`DriveLock`].
///
/// # Defaults
///
/// - Password policy: [`PasswordPolicy::default`] (5 attempts, 15 minute lockout)
/// - API base URL: `http://localhost:5000`
/// - Routes: `/login`, `/forgot-password`, `/change-password`
/// - Clock: system clock
pub struct DriveLockBuilder<Storage> {
    storage: Storage,
    security_config: SecurityConfig,
    api_config: ApiConfig,
    routes: RouteConfig,
    clock: Arc<dyn Clock>,
}

impl Default for DriveLockBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl DriveLockBuilder<NoStorage> {
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            security_config: SecurityConfig::default(),
            api_config: ApiConfig::default(),
            routes: RouteConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Use an existing [`KeyValueStore`].
    pub fn with_storage<S: KeyValueStore>(self, storage: Arc<S>) -> DriveLockBuilder<WithStorage<S>> {
        DriveLockBuilder {
            storage: WithStorage { storage },
            security_config: self.security_config,
            api_config: self.api_config,
            routes: self.routes,
            clock: self.clock,
        }
    }

    /// Keep all security state in memory. Nothing survives a restart.
    pub fn with_memory_storage(self) -> DriveLockBuilder<WithStorage<MemoryStorage>> {
        self.with_storage(Arc::new(MemoryStorage::new()))
    }
}

#[cfg(feature = "sqlite")]
impl DriveLockBuilder<NoStorage> {
    /// Connect to SQLite at `url` and create the key-value table if needed.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL (e.g. "sqlite::memory:" or "sqlite://path/to/db.sqlite")
    pub async fn with_sqlite(
        self,
        url: &str,
    ) -> Result<DriveLockBuilder<WithStorage<crate::SqliteStorage>>, DriveLockBuilderError> {
        let storage = crate::SqliteStorage::connect(url)
            .await
            .map_err(|e| DriveLockBuilderError::StorageConnection(e.to_string()))?;

        storage
            .migrate()
            .await
            .map_err(|e| DriveLockBuilderError::Migration(e.to_string()))?;

        Ok(self.with_storage(Arc::new(storage)))
    }
}

impl<Storage> DriveLockBuilder<Storage> {
    pub fn with_policy(mut self, policy: PasswordPolicy) -> Self {
        self.security_config.policy = policy;
        self
    }

    pub fn with_security_config(mut self, config: SecurityConfig) -> Self {
        self.security_config = config;
        self
    }

    pub fn with_api_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api_config.base_url = base_url.into();
        self
    }

    pub fn with_api_config(mut self, config: ApiConfig) -> Self {
        self.api_config = config;
        self
    }

    pub fn with_routes(mut self, routes: RouteConfig) -> Self {
        self.routes = routes;
        self
    }

    /// Replace the clock, e.g. with a [`ManualClock`](drivelock_core::ManualClock) in tests.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl<S: KeyValueStore> DriveLockBuilder<WithStorage<S>> {
    /// Validate the configuration, load persisted security state and return the instance.
    pub async fn build(self) -> Result<DriveLock<S>, DriveLockBuilderError> {
        self.security_config
            .policy
            .check()
            .map_err(|e| DriveLockBuilderError::InvalidConfiguration(e.to_string()))?;

        let client = ApiClient::new(self.api_config)
            .map_err(|e| DriveLockBuilderError::InvalidConfiguration(e.to_string()))?;

        let tick_period = self.security_config.tick_period;
        let store = Arc::new(SecurityStore::with_clock(
            self.storage.storage,
            self.security_config,
            self.clock,
        ));
        store.load().await;

        tracing::debug!(api = %client.config().base_url, "DriveLock ready");

        Ok(DriveLock {
            store,
            client,
            auth: Arc::new(AuthState::new()),
            guard: RouteGuard::new(self.routes),
            tick_period,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drivelock_core::AccountSecurity;

    #[tokio::test]
    async fn test_build_with_memory_storage() {
        let drivelock = DriveLockBuilder::new()
            .with_memory_storage()
            .with_api_base_url("http://127.0.0.1:9")
            .build()
            .await
            .unwrap();

        assert!(drivelock.store().is_ready());
        assert_eq!(drivelock.client().config().base_url, "http://127.0.0.1:9");
        assert_eq!(drivelock.guard().routes().login, "/login");
    }

    #[tokio::test]
    async fn test_build_rejects_impossible_policy() {
        let result = DriveLockBuilder::new()
            .with_memory_storage()
            .with_policy(PasswordPolicy {
                min_length: 20,
                max_length: 10,
                ..PasswordPolicy::default()
            })
            .build()
            .await;

        assert!(matches!(
            result,
            Err(DriveLockBuilderError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_configuration_order_does_not_matter() {
        let drivelock = DriveLockBuilder::new()
            .with_policy(PasswordPolicy {
                lockout_threshold: 3,
                ..PasswordPolicy::default()
            })
            .with_memory_storage()
            .build()
            .await
            .unwrap();

        assert_eq!(drivelock.store().policy().await.lockout_threshold, 3);
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_build_with_sqlite() {
        let drivelock = DriveLockBuilder::new()
            .with_sqlite("sqlite::memory:")
            .await
            .unwrap()
            .build()
            .await
            .unwrap();

        drivelock.store().storage().health_check().await.unwrap();
        assert_eq!(
            drivelock.store().remaining_attempts("renter@example.com").await,
            5
        );
    }
}
