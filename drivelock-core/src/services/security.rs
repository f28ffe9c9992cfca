//! Security state store for login-attempt tracking and account lockout.
//!
//! This module is the single authority for the client's account-security bookkeeping:
//! failed login attempts, lockouts, password history, session activity and the security
//! event log. The first three are persisted as JSON documents through a [`KeyValueStore`];
//! session activity and events live in memory only.
//!
//! # Lifecycle
//!
//! A store starts "not ready". [`SecurityStore::load`] reads the three documents and marks it
//! ready. Until then nothing is written back, so defaults can never overwrite state that has
//! not been loaded yet. If any document fails to parse, all three are dropped and the store
//! starts empty.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use drivelock_core::{AccountSecurity, MemoryStorage, SecurityConfig, SecurityStore};
//!
//! let store = SecurityStore::new(Arc::new(MemoryStorage::new()), SecurityConfig::default());
//! store.load().await;
//!
//! if store.is_account_locked("renter@example.com").await.locked {
//!     // Show the lockout banner instead of submitting
//! }
//!
//! let locked = store.record_failed_login("renter@example.com").await;
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{
    Error,
    clock::{Clock, SystemClock, parse_iso_string, to_iso_string},
    crypto::{constant_time_compare, hash_for_log},
    events::{DEFAULT_EVENT_LOG_CAPACITY, SecurityEvent, SecurityEventKind, SecurityEventLog},
    policy::PasswordPolicy,
    session::{
        DEFAULT_SESSION_TIMEOUT_MS, DEFAULT_WARNING_WINDOW_MS, SessionActivity, SessionStatus,
        ceil_div,
    },
    storage::{
        ACCOUNT_LOCKOUTS_KEY, KeyValueStore, LOGIN_ATTEMPTS_KEY, PASSWORD_HISTORY_KEY,
        decode_document, encode_document,
    },
};

/// Configuration for the security store.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub policy: PasswordPolicy,
    /// Failed attempts older than this are ignored and pruned.
    pub attempt_window: Duration,
    pub session_timeout_ms: i64,
    pub warning_window_ms: i64,
    pub event_log_capacity: usize,
    /// Recorded on every security event.
    pub user_agent: String,
    /// How often countdown consumers are asked to re-render.
    pub tick_period: std::time::Duration,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            policy: PasswordPolicy::default(),
            attempt_window: Duration::hours(24),
            session_timeout_ms: DEFAULT_SESSION_TIMEOUT_MS,
            warning_window_ms: DEFAULT_WARNING_WINDOW_MS,
            event_log_capacity: DEFAULT_EVENT_LOG_CAPACITY,
            user_agent: format!("drivelock/{}", env!("CARGO_PKG_VERSION")),
            tick_period: std::time::Duration::from_secs(30),
        }
    }
}

impl SecurityConfig {
    pub fn with_policy(mut self, policy: PasswordPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Result of [`AccountSecurity::is_account_locked`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockStatus {
    pub locked: bool,
    /// Whole minutes left, rounded up and never below 1. Only set when locked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_time: Option<i64>,
}

impl LockStatus {
    pub fn unlocked() -> Self {
        Self {
            locked: false,
            remaining_time: None,
        }
    }

    pub fn locked(remaining_minutes: i64) -> Self {
        Self {
            locked: true,
            remaining_time: Some(remaining_minutes.max(1)),
        }
    }
}

/// The operation set of the security store.
///
/// Consumers (login page, change-password form, route guard) depend on this trait rather
/// than on [`SecurityStore`] so they can be exercised against a mock.
#[async_trait]
pub trait AccountSecurity: Send + Sync + 'static {
    /// Whether the persisted state has been loaded.
    fn is_ready(&self) -> bool;

    /// Record a failed login. Returns `true` if the account is now locked.
    async fn record_failed_login(&self, email: &str) -> bool;

    /// Lock the account for the policy's lockout duration, replacing any prior lockout.
    async fn lock_account(&self, email: &str);

    /// Current lockout state. Expired or unreadable lockouts are removed as a side effect.
    async fn is_account_locked(&self, email: &str) -> LockStatus;

    /// Forget failed attempts and any lockout, e.g. after a successful login.
    async fn clear_failed_attempts(&self, email: &str);

    /// Unlock an account (e.g. after a password reset). Returns whether it was locked.
    async fn unlock_account(&self, email: &str) -> bool;

    /// Attempts left before lockout.
    async fn remaining_attempts(&self, email: &str) -> u32;

    async fn add_password_to_history(&self, email: &str, representation: &str);

    async fn is_password_in_history(&self, email: &str, representation: &str) -> bool;

    async fn update_activity(&self);

    async fn session_status(&self) -> SessionStatus;

    async fn log_security_event(&self, kind: SecurityEventKind, details: Value) -> SecurityEvent;

    /// Security events of this session, newest first.
    async fn security_events(&self) -> Vec<SecurityEvent>;

    async fn policy(&self) -> PasswordPolicy;

    /// Replace the policy for the rest of this process. Not persisted.
    async fn set_policy(&self, policy: PasswordPolicy);
}

#[derive(Debug)]
struct SecurityState {
    login_attempts: HashMap<String, Vec<String>>,
    lockouts: HashMap<String, String>,
    password_history: HashMap<String, Vec<String>>,
    activity: SessionActivity,
    events: SecurityEventLog,
    policy: PasswordPolicy,
}

/// Security store backed by a [`KeyValueStore`].
///
/// # Thread Safety
///
/// All state sits behind one async mutex, which is also held while the affected document
/// is written back, so writes reach storage in the order the mutations happened. Several
/// processes sharing one storage backend are not coordinated: the last writer wins.
pub struct SecurityStore<S: KeyValueStore> {
    storage: Arc<S>,
    clock: Arc<dyn Clock>,
    attempt_window: Duration,
    state: Mutex<SecurityState>,
    ready: AtomicBool,
}

impl<S: KeyValueStore> SecurityStore<S> {
    /// Create a store using the system clock. Call [`SecurityStore::load`] before use.
    pub fn new(storage: Arc<S>, config: SecurityConfig) -> Self {
        Self::with_clock(storage, config, Arc::new(SystemClock))
    }

    pub fn with_clock(storage: Arc<S>, config: SecurityConfig, clock: Arc<dyn Clock>) -> Self {
        let state = SecurityState {
            login_attempts: HashMap::new(),
            lockouts: HashMap::new(),
            password_history: HashMap::new(),
            activity: SessionActivity::new(config.session_timeout_ms, config.warning_window_ms),
            events: SecurityEventLog::new(config.event_log_capacity, config.user_agent),
            policy: config.policy,
        };

        Self {
            storage,
            clock,
            attempt_window: config.attempt_window,
            state: Mutex::new(state),
            ready: AtomicBool::new(false),
        }
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Load the persisted documents and mark the store ready.
    ///
    /// Never fails: unreadable state is logged and replaced by empty state.
    pub async fn load(&self) {
        let mut state = self.state.lock().await;

        match self.read_documents().await {
            Ok((login_attempts, lockouts, password_history)) => {
                tracing::debug!(
                    accounts_with_attempts = login_attempts.len(),
                    lockouts = lockouts.len(),
                    "Loaded security state"
                );
                state.login_attempts = login_attempts;
                state.lockouts = lockouts;
                state.password_history = password_history;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Stored security state is unreadable, starting empty");
                state.login_attempts.clear();
                state.lockouts.clear();
                state.password_history.clear();
                self.discard_documents().await;
            }
        }

        self.ready.store(true, Ordering::Release);
    }

    async fn read_documents(
        &self,
    ) -> Result<
        (
            HashMap<String, Vec<String>>,
            HashMap<String, String>,
            HashMap<String, Vec<String>>,
        ),
        Error,
    > {
        let login_attempts = self.read_document(LOGIN_ATTEMPTS_KEY).await?;
        let lockouts = self.read_document(ACCOUNT_LOCKOUTS_KEY).await?;
        let password_history = self.read_document(PASSWORD_HISTORY_KEY).await?;
        Ok((login_attempts, lockouts, password_history))
    }

    async fn read_document<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, Error> {
        match self.storage.get(key).await? {
            Some(raw) => decode_document(&raw).map_err(|e| {
                tracing::warn!(key, error = %e, "Failed to parse stored security document");
                Error::Storage(e)
            }),
            None => Ok(T::default()),
        }
    }

    async fn discard_documents(&self) {
        for key in [LOGIN_ATTEMPTS_KEY, ACCOUNT_LOCKOUTS_KEY, PASSWORD_HISTORY_KEY] {
            if let Err(e) = self.storage.remove(key).await {
                tracing::error!(key, error = %e, "Failed to remove stored security document");
            }
        }
    }

    /// Write one document back. Suppressed until the store is ready; failures are logged.
    async fn persist<T: Serialize>(&self, key: &str, data: &T) {
        if !self.is_ready() {
            tracing::debug!(key, "Security store not ready, skipping write-back");
            return;
        }

        let result = match encode_document(data) {
            Ok(raw) => self.storage.set(key, &raw).await,
            Err(e) => Err(Error::Storage(e)),
        };

        if let Err(e) = result {
            tracing::error!(key, error = %e, "Failed to persist security document");
        }
    }

    fn prune_attempts(attempts: &mut Vec<String>, window_start: DateTime<Utc>) -> bool {
        let before = attempts.len();
        attempts.retain(|raw| parse_iso_string(raw).is_some_and(|at| at >= window_start));
        attempts.len() != before
    }

    fn apply_lock(state: &mut SecurityState, email: &str, now: DateTime<Utc>) -> DateTime<Utc> {
        let locked_until = now + Duration::minutes(i64::from(state.policy.lockout_duration));
        state
            .lockouts
            .insert(email.to_string(), to_iso_string(locked_until));
        locked_until
    }
}

#[async_trait]
impl<S: KeyValueStore> AccountSecurity for SecurityStore<S> {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    async fn record_failed_login(&self, email: &str) -> bool {
        if email.is_empty() {
            return false;
        }

        let mut state = self.state.lock().await;
        let now = self.clock.now();
        let window_start = now - self.attempt_window;

        let attempts = state.login_attempts.entry(email.to_string()).or_default();
        Self::prune_attempts(attempts, window_start);
        attempts.push(to_iso_string(now));
        let count = attempts.len();

        self.persist(LOGIN_ATTEMPTS_KEY, &state.login_attempts).await;

        if count < state.policy.lockout_threshold as usize {
            tracing::debug!(
                account = %hash_for_log(email),
                failed_attempts = count,
                "Recorded failed login"
            );
            return false;
        }

        let locked_until = Self::apply_lock(&mut state, email, now);
        self.persist(ACCOUNT_LOCKOUTS_KEY, &state.lockouts).await;
        tracing::warn!(
            account = %hash_for_log(email),
            failed_attempts = count,
            locked_until = %locked_until,
            "Account locked after repeated failed logins"
        );
        true
    }

    async fn lock_account(&self, email: &str) {
        if email.is_empty() {
            return;
        }

        let mut state = self.state.lock().await;
        let now = self.clock.now();
        Self::apply_lock(&mut state, email, now);
        self.persist(ACCOUNT_LOCKOUTS_KEY, &state.lockouts).await;
    }

    async fn is_account_locked(&self, email: &str) -> LockStatus {
        if !self.is_ready() || email.is_empty() {
            return LockStatus::unlocked();
        }

        let mut state = self.state.lock().await;
        let Some(raw) = state.lockouts.get(email).cloned() else {
            return LockStatus::unlocked();
        };

        let Some(locked_until) = parse_iso_string(&raw) else {
            tracing::warn!(
                account = %hash_for_log(email),
                value = %raw,
                "Discarding unreadable lockout entry"
            );
            state.lockouts.remove(email);
            self.persist(ACCOUNT_LOCKOUTS_KEY, &state.lockouts).await;
            return LockStatus::unlocked();
        };

        let now = self.clock.now();
        if locked_until <= now {
            tracing::info!(account = %hash_for_log(email), "Lockout expired");
            state.lockouts.remove(email);
            state.login_attempts.remove(email);
            self.persist(ACCOUNT_LOCKOUTS_KEY, &state.lockouts).await;
            self.persist(LOGIN_ATTEMPTS_KEY, &state.login_attempts).await;
            return LockStatus::unlocked();
        }

        let remaining_ms = (locked_until - now).num_milliseconds();
        LockStatus::locked(ceil_div(remaining_ms, 60_000))
    }

    async fn clear_failed_attempts(&self, email: &str) {
        let mut state = self.state.lock().await;
        let had_attempts = state.login_attempts.remove(email).is_some();
        let had_lockout = state.lockouts.remove(email).is_some();

        if had_attempts {
            self.persist(LOGIN_ATTEMPTS_KEY, &state.login_attempts).await;
        }
        if had_lockout {
            self.persist(ACCOUNT_LOCKOUTS_KEY, &state.lockouts).await;
        }
    }

    async fn unlock_account(&self, email: &str) -> bool {
        let was_locked = self.is_account_locked(email).await.locked;
        self.clear_failed_attempts(email).await;
        if was_locked {
            tracing::info!(account = %hash_for_log(email), "Account unlocked");
        }
        was_locked
    }

    async fn remaining_attempts(&self, email: &str) -> u32 {
        let mut state = self.state.lock().await;
        let threshold = state.policy.lockout_threshold;
        if !self.is_ready() || email.is_empty() {
            return threshold;
        }

        let window_start = self.clock.now() - self.attempt_window;
        let Some(attempts) = state.login_attempts.get_mut(email) else {
            return threshold;
        };

        let pruned = Self::prune_attempts(attempts, window_start);
        let count = attempts.len();
        if attempts.is_empty() {
            state.login_attempts.remove(email);
        }
        if pruned {
            self.persist(LOGIN_ATTEMPTS_KEY, &state.login_attempts).await;
        }

        threshold.saturating_sub(count as u32)
    }

    async fn add_password_to_history(&self, email: &str, representation: &str) {
        let mut state = self.state.lock().await;
        let limit = state.policy.password_history_count;

        let history = state
            .password_history
            .entry(email.to_string())
            .or_default();
        history.insert(0, representation.to_string());
        history.truncate(limit);

        self.persist(PASSWORD_HISTORY_KEY, &state.password_history)
            .await;
    }

    async fn is_password_in_history(&self, email: &str, representation: &str) -> bool {
        let state = self.state.lock().await;
        state.password_history.get(email).is_some_and(|history| {
            history
                .iter()
                .any(|entry| constant_time_compare(entry.as_bytes(), representation.as_bytes()))
        })
    }

    async fn update_activity(&self) {
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        state.activity.touch(now);
    }

    async fn session_status(&self) -> SessionStatus {
        let state = self.state.lock().await;
        state.activity.status(self.clock.now())
    }

    async fn log_security_event(&self, kind: SecurityEventKind, details: Value) -> SecurityEvent {
        let mut state = self.state.lock().await;
        let event = state.events.record(kind, details, self.clock.now());
        tracing::debug!(id = %event.id, kind = ?event.event_kind, "Security event");
        event
    }

    async fn security_events(&self) -> Vec<SecurityEvent> {
        self.state.lock().await.events.events()
    }

    async fn policy(&self) -> PasswordPolicy {
        self.state.lock().await.policy.clone()
    }

    async fn set_policy(&self, policy: PasswordPolicy) {
        self.state.lock().await.policy = policy;
    }
}
