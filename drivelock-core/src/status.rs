//! Password status records.
//!
//! [`PasswordStatus`] is what the account API reports about the current password. The
//! client trusts the fields it sends. When a response carries `lastPasswordChange` but no
//! expiry fields, [`PasswordStatus::with_derived_expiry`] fills them in from the policy's
//! expiry period.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Days before expiry at which the warning banner appears.
pub const DEFAULT_WARNING_DAYS: i64 = 7;

/// Server-computed summary of the current password's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PasswordStatus {
    pub last_password_change: Option<DateTime<Utc>>,
    pub password_expires_at: Option<DateTime<Utc>>,
    pub days_until_expiry: Option<i64>,
    pub is_expired: bool,
    pub show_warning: bool,
    pub must_change_password: bool,
}

impl PasswordStatus {
    /// Compute a status from raw metadata.
    ///
    /// `days_until_expiry` is rounded up, so a password expiring in 30 hours has 2 days left.
    /// An expiry beyond the representable calendar means the password never expires.
    pub fn derive(
        last_password_change: DateTime<Utc>,
        expiry_days: u32,
        must_change_password: bool,
        warning_days: i64,
        now: DateTime<Utc>,
    ) -> Self {
        let expires_at = Duration::try_days(i64::from(expiry_days))
            .and_then(|period| last_password_change.checked_add_signed(period));
        let Some(expires_at) = expires_at else {
            return Self {
                last_password_change: Some(last_password_change),
                must_change_password,
                ..Self::default()
            };
        };

        let remaining_ms = (expires_at - now).num_milliseconds();
        let days_until_expiry = crate::session::ceil_div(remaining_ms, 86_400_000).max(0);
        let is_expired = now >= expires_at;

        Self {
            last_password_change: Some(last_password_change),
            password_expires_at: Some(expires_at),
            days_until_expiry: Some(days_until_expiry),
            is_expired,
            show_warning: !is_expired && days_until_expiry <= warning_days,
            must_change_password,
        }
    }

    /// Fill in the expiry fields when the server sent `lastPasswordChange` without
    /// `daysUntilExpiry` or `passwordExpiresAt`. Flags the server did set are kept.
    pub fn with_derived_expiry(
        self,
        expiry_days: u32,
        warning_days: i64,
        now: DateTime<Utc>,
    ) -> Self {
        let Some(last_change) = self.last_password_change else {
            return self;
        };
        if self.days_until_expiry.is_some() || self.password_expires_at.is_some() {
            return self;
        }

        let derived = Self::derive(
            last_change,
            expiry_days,
            self.must_change_password,
            warning_days,
            now,
        );
        Self {
            is_expired: self.is_expired || derived.is_expired,
            show_warning: self.show_warning || derived.show_warning,
            ..derived
        }
    }

    /// Expired or flagged by the server: the user has to act before continuing.
    pub fn requires_action(&self) -> bool {
        self.is_expired || self.must_change_password
    }
}

/// What a password-status consumer currently knows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasswordStatusSnapshot {
    pub status: Option<PasswordStatus>,
    pub loading: bool,
    pub error: Option<String>,
}

impl PasswordStatusSnapshot {
    pub fn loading() -> Self {
        Self {
            status: None,
            loading: true,
            error: None,
        }
    }

    pub fn loaded(status: PasswordStatus) -> Self {
        Self {
            status: Some(status),
            loading: false,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: None,
            loading: false,
            error: Some(error.into()),
        }
    }

    /// Settled with nothing to report, e.g. no one is signed in.
    pub fn empty() -> Self {
        Self::default()
    }
}
