//! Password-status query for the signed-in user.
//!
//! The query fetches `GET /api/users/password-status` and publishes a
//! [`PasswordStatusSnapshot`] on a `watch` channel. Server fields are used as sent; with
//! [`PasswordStatusQuery::with_expiry_fallback`] a response that only carries
//! `lastPasswordChange` gets its expiry fields derived locally.
//!
//! A response is applied only if the query is still mounted and no newer fetch has started
//! since. Anything else is dropped, so a slow response can never overwrite a newer one or
//! update a page the user already left.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use drivelock_core::{
    AuthState, Clock, PasswordStatus, PasswordStatusSnapshot, status::DEFAULT_WARNING_DAYS,
};
use tokio::sync::watch;

use crate::api::ApiClient;

pub struct PasswordStatusQuery {
    client: ApiClient,
    auth: Arc<AuthState>,
    snapshot: watch::Sender<PasswordStatusSnapshot>,
    generation: AtomicU64,
    mounted: AtomicBool,
    expiry_fallback: Option<ExpiryFallback>,
}

struct ExpiryFallback {
    expiry_days: u32,
    clock: Arc<dyn Clock>,
}

impl PasswordStatusQuery {
    /// Create a mounted query. Nothing is fetched until [`refetch`](Self::refetch).
    pub fn new(client: ApiClient, auth: Arc<AuthState>) -> Self {
        let initial = if auth.is_authenticated() {
            PasswordStatusSnapshot::loading()
        } else {
            PasswordStatusSnapshot::empty()
        };
        let (snapshot, _) = watch::channel(initial);

        Self {
            client,
            auth,
            snapshot,
            generation: AtomicU64::new(0),
            mounted: AtomicBool::new(true),
            expiry_fallback: None,
        }
    }

    /// Derive `daysUntilExpiry`, `passwordExpiresAt` and the warning flag from
    /// `lastPasswordChange` when the server omits them.
    pub fn with_expiry_fallback(mut self, expiry_days: u32, clock: Arc<dyn Clock>) -> Self {
        self.expiry_fallback = Some(ExpiryFallback { expiry_days, clock });
        self
    }

    pub fn snapshot(&self) -> PasswordStatusSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PasswordStatusSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    /// Stop applying results. In-flight fetches finish but are discarded.
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::Release);
    }

    /// Fetch the status for the current token and return the snapshot it produced.
    ///
    /// Without a token this settles immediately with no status and no error, and makes no
    /// network call. Failures end up in `error`; nothing is returned as `Err`.
    pub async fn refetch(&self) -> PasswordStatusSnapshot {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        let Some(token) = self.auth.token() else {
            let snapshot = PasswordStatusSnapshot::empty();
            self.publish(generation, snapshot.clone());
            return snapshot;
        };

        self.publish(generation, PasswordStatusSnapshot::loading());

        let snapshot = match self.client.password_status(&token).await {
            Ok(status) => PasswordStatusSnapshot::loaded(self.complete(status)),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch password status");
                PasswordStatusSnapshot::failed(e.to_string())
            }
        };

        self.publish(generation, snapshot.clone());
        snapshot
    }

    fn complete(&self, status: PasswordStatus) -> PasswordStatus {
        match &self.expiry_fallback {
            Some(fallback) => status.with_derived_expiry(
                fallback.expiry_days,
                DEFAULT_WARNING_DAYS,
                fallback.clock.now(),
            ),
            None => status,
        }
    }

    /// Apply `snapshot` unless it is stale. Returns whether it was applied.
    fn publish(&self, generation: u64, snapshot: PasswordStatusSnapshot) -> bool {
        self.snapshot.send_if_modified(|current| {
            if !self.is_mounted() {
                tracing::debug!(generation, "Query unmounted, discarding password status");
                return false;
            }
            if self.generation.load(Ordering::Acquire) != generation {
                tracing::debug!(generation, "Discarding stale password status");
                return false;
            }
            *current = snapshot;
            true
        })
    }
}

impl std::fmt::Debug for PasswordStatusQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordStatusQuery")
            .field("snapshot", &*self.snapshot.borrow())
            .field("mounted", &self.is_mounted())
            .field(
                "expiry_days",
                &self.expiry_fallback.as_ref().map(|f| f.expiry_days),
            )
            .finish()
    }
}
