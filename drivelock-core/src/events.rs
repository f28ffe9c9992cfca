//! In-memory security event log.
//!
//! Events are diagnostics for the current session only. The log is capped and newest-first,
//! and it is never persisted.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default number of events kept.
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 100;

/// Placeholder origin recorded on every event; the client cannot see its own address.
pub const CLIENT_ORIGIN: &str = "client-side";

/// Kinds of security-relevant actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    LoginFailed,
    LoginSucceeded,
    AccountLocked,
    AccountUnlocked,
    PasswordChanged,
    PasswordResetRequested,
    PasswordReuseRejected,
    SessionExpired,
    Logout,
    /// Anything else the UI wants to record.
    Other(String),
}

/// One entry in the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub event_kind: SecurityEventKind,
    pub details: Value,
    pub user_agent: String,
    pub ip_address: String,
}

/// Capped, newest-first list of [`SecurityEvent`]s.
#[derive(Debug)]
pub struct SecurityEventLog {
    events: VecDeque<SecurityEvent>,
    capacity: usize,
    user_agent: String,
    sequence: u64,
}

impl SecurityEventLog {
    pub fn new(capacity: usize, user_agent: impl Into<String>) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            user_agent: user_agent.into(),
            sequence: 0,
        }
    }

    /// Record an event at `now` and return it.
    pub fn record(
        &mut self,
        kind: SecurityEventKind,
        details: Value,
        now: DateTime<Utc>,
    ) -> SecurityEvent {
        let sequence = self.sequence;
        self.sequence += 1;
        let event = SecurityEvent {
            id: format!("evt_{}_{sequence}", now.timestamp_millis()),
            timestamp: now,
            event_kind: kind,
            details,
            user_agent: self.user_agent.clone(),
            ip_address: CLIENT_ORIGIN.to_string(),
        };

        self.events.push_front(event.clone());
        self.events.truncate(self.capacity);
        event
    }

    /// Events, newest first.
    pub fn events(&self) -> Vec<SecurityEvent> {
        self.events.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Default for SecurityEventLog {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_LOG_CAPACITY, "drivelock")
    }
}
