//! Session activity tracking and the in-memory auth state.
//!
//! Session status is advisory: nothing here logs a user out. Callers poll
//! [`SessionActivity::status`] and decide what to show.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default idle timeout, 30 minutes.
pub const DEFAULT_SESSION_TIMEOUT_MS: i64 = 1_800_000;
/// Default warning window before the timeout, 5 minutes.
pub const DEFAULT_WARNING_WINDOW_MS: i64 = 300_000;

/// Last-activity bookkeeping for the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionActivity {
    pub last_activity: Option<DateTime<Utc>>,
    pub session_timeout_ms: i64,
    pub warning_window_ms: i64,
}

impl Default for SessionActivity {
    fn default() -> Self {
        Self {
            last_activity: None,
            session_timeout_ms: DEFAULT_SESSION_TIMEOUT_MS,
            warning_window_ms: DEFAULT_WARNING_WINDOW_MS,
        }
    }
}

/// Derived session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SessionStatus {
    /// No activity has been recorded yet.
    Inactive,
    Active,
    /// Active, but the timeout is close.
    Warning {
        #[serde(rename = "remainingMinutes")]
        remaining_minutes: i64,
    },
    Expired,
}

impl SessionStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active | Self::Warning { .. })
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired)
    }
}

impl SessionActivity {
    pub fn new(session_timeout_ms: i64, warning_window_ms: i64) -> Self {
        Self {
            last_activity: None,
            session_timeout_ms,
            warning_window_ms,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = Some(now);
    }

    pub fn status(&self, now: DateTime<Utc>) -> SessionStatus {
        let Some(last_activity) = self.last_activity else {
            return SessionStatus::Inactive;
        };

        let elapsed = (now - last_activity).num_milliseconds();
        if elapsed > self.session_timeout_ms {
            return SessionStatus::Expired;
        }

        if elapsed > self.session_timeout_ms - self.warning_window_ms {
            let remaining = self.session_timeout_ms - elapsed;
            return SessionStatus::Warning {
                remaining_minutes: ceil_div(remaining, 60_000),
            };
        }

        SessionStatus::Active
    }
}

pub(crate) fn ceil_div(value: i64, divisor: i64) -> i64 {
    (value + divisor - 1).div_euclid(divisor)
}

/// The signed-in principal as the client sees it: a bearer token and the account email.
///
/// Shared between the login flow, the password-status query and the route guard.
#[derive(Debug, Default)]
pub struct AuthState {
    inner: RwLock<Option<Credentials>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub email: String,
}

impl AuthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, token: impl Into<String>, email: impl Into<String>) {
        let credentials = Credentials {
            token: token.into(),
            email: email.into(),
        };
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = Some(credentials);
    }

    pub fn sign_out(&self) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn token(&self) -> Option<String> {
        self.credentials().map(|c| c.token)
    }

    pub fn email(&self) -> Option<String> {
        self.credentials().map(|c| c.email)
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials().is_some()
    }
}
