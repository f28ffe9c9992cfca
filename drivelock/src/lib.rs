//! Client-side account security for the drivelock rental marketplace.
//!
//! [`DriveLock`] ties the pieces of [`drivelock_core`] to the account API: it tracks failed
//! logins and lockouts around the remote login call, enforces the password policy and reuse
//! history before a password change, keeps the bearer token for the signed-in user, and hands
//! out the route guard, the password-status query and the countdown ticker the UI needs.
//!
//! None of this is a security boundary. The API enforces its own rules; the client-side
//! bookkeeping exists to give users early, consistent feedback.
//!
//! # Example
//!
//! ```rust,no_run
//! use drivelock::{DriveLockBuilder, DriveLockError};
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
//!     match drivelock.login("renter@example.com", "Rental#2024x").await {
//!         Ok(response) => println!("Welcome back, {:?}", response.user.name),
//!         Err(DriveLockError::AccountLocked { remaining_minutes }) => {
//!             println!("Locked for {remaining_minutes} more minutes")
//!         }
//!         Err(e) => println!("{e}"),
//!     }
//!
//!     Ok(())
//! }
//! ```
use std::{sync::Arc, time::Duration};

use serde_json::json;

pub mod builder;

pub use builder::{DriveLockBuilder, DriveLockBuilderError, NoStorage, WithStorage};

pub use drivelock_client::{
    ApiClient, ApiConfig, ClientError, LoginResponse, MessageResponse, PasswordStatusQuery,
    RegisterRequest, UserSummary,
};
pub use drivelock_core::{
    AccountSecurity, AuthState, Clock, CountdownTicker, GuardDecision, GuardState, KeyValueStore,
    LockStatus, ManualClock, MemoryStorage, NavigationState, PasswordPolicy, PasswordStatus,
    PasswordStatusSnapshot, RouteConfig, RouteGuard, SecurityConfig, SecurityContext,
    SecurityEvent, SecurityEventKind, SecurityStore, SessionStatus, StrengthLevel,
    error::ValidationError,
    presentation::{Banner, Severity, StrengthMeter},
};

#[cfg(feature = "sqlite")]
pub use drivelock_storage_sqlite::SqliteStorage;

use drivelock_core::{
    crypto::password_fingerprint,
    presentation,
    validation::{validate_email, validate_otp},
};

/// Errors surfaced by the account-security flows.
///
/// Every variant's `Display` is meant to be shown to the user as is.
#[derive(Debug, thiserror::Error)]
pub enum DriveLockError {
    #[error(
        "Account temporarily locked. Please try again in {}.",
        presentation::plural(*.remaining_minutes, "minute")
    )]
    AccountLocked { remaining_minutes: i64 },

    /// The API rejected the credentials and the attempt was counted.
    #[error("{message}")]
    InvalidCredentials {
        message: String,
        remaining_attempts: u32,
    },

    #[error("You must be logged in to do that")]
    NotAuthenticated,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl DriveLockError {
    /// Policy violation messages, if the new password was rejected by the policy.
    pub fn violations(&self) -> Option<&[String]> {
        match self {
            DriveLockError::Validation(ValidationError::PolicyViolation(messages)) => {
                Some(messages.as_slice())
            }
            _ => None,
        }
    }
}

/// The account-security facade.
pub struct DriveLock<S: KeyValueStore> {
    store: Arc<SecurityStore<S>>,
    client: ApiClient,
    auth: Arc<AuthState>,
    guard: RouteGuard,
    tick_period: Duration,
}

impl<S: KeyValueStore> DriveLock<S> {
    pub fn store(&self) -> &Arc<SecurityStore<S>> {
        &self.store
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn auth(&self) -> &Arc<AuthState> {
        &self.auth
    }

    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }

    /// A context handle for pages that only need the security store.
    pub fn security_context(&self) -> SecurityContext {
        SecurityContext::provided(self.store.clone())
    }

    /// Log in against the API.
    ///
    /// A locked account is rejected without calling the API. A credential rejection (HTTP 400
    /// or 401) counts as a failed attempt and may lock the account; transport and server
    /// errors do not count.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, DriveLockError> {
        validate_email(email)?;

        let lock = self.store.is_account_locked(email).await;
        if lock.locked {
            let remaining_minutes = lock.remaining_time.unwrap_or(1);
            self.store
                .log_security_event(
                    SecurityEventKind::LoginFailed,
                    json!({ "email": email, "reason": "account_locked" }),
                )
                .await;
            return Err(DriveLockError::AccountLocked { remaining_minutes });
        }

        let response = match self.client.login(email, password).await {
            Ok(response) => response,
            Err(ClientError::Api { status, message }) if status == 400 || status == 401 => {
                return Err(self.reject_credentials(email, message).await);
            }
            Err(e) => return Err(e.into()),
        };

        self.store.clear_failed_attempts(email).await;
        self.store.update_activity().await;
        self.auth.sign_in(response.token.clone(), email);
        self.store
            .log_security_event(
                SecurityEventKind::LoginSucceeded,
                json!({
                    "email": email,
                    "passwordExpired": response.password_expired,
                    "mustChangePassword": response.must_change_password,
                }),
            )
            .await;

        if response.password_expired || response.must_change_password {
            tracing::info!("Signed in with a password that must be changed");
        }

        Ok(response)
    }

    async fn reject_credentials(&self, email: &str, message: String) -> DriveLockError {
        let locked = self.store.record_failed_login(email).await;
        self.store
            .log_security_event(
                SecurityEventKind::LoginFailed,
                json!({ "email": email, "reason": &message }),
            )
            .await;

        if locked {
            self.store
                .log_security_event(SecurityEventKind::AccountLocked, json!({ "email": email }))
                .await;
            let lock = self.store.is_account_locked(email).await;
            return DriveLockError::AccountLocked {
                remaining_minutes: lock.remaining_time.unwrap_or(1),
            };
        }

        DriveLockError::InvalidCredentials {
            message,
            remaining_attempts: self.store.remaining_attempts(email).await,
        }
    }

    pub async fn logout(&self) {
        let email = self.auth.email();
        self.auth.sign_out();
        self.store
            .log_security_event(SecurityEventKind::Logout, json!({ "email": email }))
            .await;
    }

    /// Change the signed-in user's password.
    ///
    /// The new password must satisfy the policy, match its confirmation and not be one of
    /// the last `passwordHistoryCount` passwords set through this client.
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<MessageResponse, DriveLockError> {
        let credentials = self
            .auth
            .credentials()
            .ok_or(DriveLockError::NotAuthenticated)?;

        self.check_new_password(&credentials.email, new_password, confirm_password)
            .await?;
        if current_password == new_password {
            return Err(ValidationError::PasswordReused.into());
        }

        let response = self
            .client
            .change_password(&credentials.token, current_password, new_password)
            .await?;

        self.store
            .add_password_to_history(
                &credentials.email,
                &password_fingerprint(&credentials.email, new_password),
            )
            .await;
        self.store.update_activity().await;
        self.store
            .log_security_event(
                SecurityEventKind::PasswordChanged,
                json!({ "email": credentials.email, "method": "change" }),
            )
            .await;

        Ok(response)
    }

    /// Start the forgot-password flow; the API emails a one-time passcode.
    pub async fn forgot_password(&self, email: &str) -> Result<MessageResponse, DriveLockError> {
        validate_email(email)?;
        let response = self.client.forgot_password(email).await?;
        self.store
            .log_security_event(
                SecurityEventKind::PasswordResetRequested,
                json!({ "email": email }),
            )
            .await;
        Ok(response)
    }

    pub async fn verify_reset_otp(
        &self,
        email: &str,
        otp: &str,
    ) -> Result<MessageResponse, DriveLockError> {
        validate_email(email)?;
        validate_otp(otp)?;
        Ok(self.client.verify_reset_otp(email, otp).await?)
    }

    /// Finish the forgot-password flow. A successful reset also lifts any local lockout.
    pub async fn reset_password(
        &self,
        email: &str,
        otp: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<MessageResponse, DriveLockError> {
        validate_email(email)?;
        validate_otp(otp)?;
        self.check_new_password(email, new_password, confirm_password)
            .await?;

        let response = self.client.reset_password(email, otp, new_password).await?;

        self.store
            .add_password_to_history(email, &password_fingerprint(email, new_password))
            .await;
        if self.store.unlock_account(email).await {
            self.store
                .log_security_event(SecurityEventKind::AccountUnlocked, json!({ "email": email }))
                .await;
        }
        self.store
            .log_security_event(
                SecurityEventKind::PasswordChanged,
                json!({ "email": email, "method": "reset" }),
            )
            .await;

        Ok(response)
    }

    pub async fn register(
        &self,
        request: &RegisterRequest,
        confirm_password: &str,
    ) -> Result<MessageResponse, DriveLockError> {
        validate_email(&request.email)?;
        self.store.policy().await.ensure_valid(&request.password)?;
        if request.password != confirm_password {
            return Err(ValidationError::PasswordMismatch.into());
        }

        let response = self.client.register(request).await?;
        self.store
            .add_password_to_history(
                &request.email,
                &password_fingerprint(&request.email, &request.password),
            )
            .await;
        Ok(response)
    }

    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<MessageResponse, DriveLockError> {
        validate_email(email)?;
        validate_otp(otp)?;
        Ok(self.client.verify_otp(email, otp).await?)
    }

    pub async fn resend_otp(&self, email: &str) -> Result<MessageResponse, DriveLockError> {
        validate_email(email)?;
        Ok(self.client.resend_otp(email).await?)
    }

    async fn check_new_password(
        &self,
        email: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<(), DriveLockError> {
        self.store.policy().await.ensure_valid(new_password)?;

        if new_password != confirm_password {
            return Err(ValidationError::PasswordMismatch.into());
        }

        let fingerprint = password_fingerprint(email, new_password);
        if self.store.is_password_in_history(email, &fingerprint).await {
            self.store
                .log_security_event(
                    SecurityEventKind::PasswordReuseRejected,
                    json!({ "email": email }),
                )
                .await;
            return Err(ValidationError::PasswordReused.into());
        }

        Ok(())
    }

    /// A mounted password-status query bound to this instance's auth state.
    ///
    /// Expiry fields the server leaves out are derived from the current policy's
    /// `passwordExpiryDays`.
    pub async fn password_status_query(&self) -> PasswordStatusQuery {
        let expiry_days = self.store.policy().await.password_expiry_days;
        PasswordStatusQuery::new(self.client.clone(), self.auth.clone())
            .with_expiry_fallback(expiry_days, self.store.clock().clone())
    }

    /// Route decision for `path` given the latest password-status snapshot.
    pub fn evaluate_route(&self, path: &str, snapshot: &PasswordStatusSnapshot) -> GuardDecision {
        let email = self.auth.email();
        self.guard
            .evaluate(path, self.auth.is_authenticated(), email.as_deref(), snapshot)
    }

    /// Start the countdown ticker at the configured period.
    pub fn start_ticker(&self) -> CountdownTicker {
        CountdownTicker::start(self.tick_period)
    }

    /// Strength meter for a candidate password under the current policy.
    pub async fn strength_meter(&self, password: &str) -> StrengthMeter {
        StrengthMeter::evaluate(&self.store.policy().await, password)
    }

    /// Banner for the login form: the lockout countdown, or the attempts left.
    pub async fn login_banner(&self, email: &str) -> Option<Banner> {
        let lock = self.store.is_account_locked(email).await;
        if lock.locked {
            return presentation::lockout_banner(&lock);
        }

        let threshold = self.store.policy().await.lockout_threshold;
        presentation::remaining_attempts_banner(self.store.remaining_attempts(email).await, threshold)
    }

    pub async fn session_banner(&self) -> Option<Banner> {
        presentation::session_banner(self.store.session_status().await, self.guard.routes())
    }

    pub fn password_status_banner(&self, status: &PasswordStatus) -> Option<Banner> {
        presentation::password_status_banner(status, self.guard.routes())
    }
}
