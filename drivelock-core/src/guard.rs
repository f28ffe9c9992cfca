//! Route guard for password-expiry enforcement.
//!
//! The guard decides what a protected page should do given the auth token, the current path
//! and the password-status snapshot. It is a navigation convenience only: it cannot stop
//! anyone from calling the API directly.
//!
//! # Example
//!
//! ```rust
//! use drivelock_core::guard::{GuardDecision, RouteGuard};
//! use drivelock_core::status::{PasswordStatus, PasswordStatusSnapshot};
//!
//! let guard = RouteGuard::default();
//! let expired = PasswordStatusSnapshot::loaded(PasswordStatus {
//!     is_expired: true,
//!     ..Default::default()
//! });
//!
//! let decision = guard.evaluate("/home", true, Some("renter@example.com"), &expired);
//! assert!(matches!(decision, GuardDecision::RedirectToForgotPassword(_)));
//!
//! let decision = guard.evaluate("/change-password", true, None, &expired);
//! assert_eq!(decision, GuardDecision::Render);
//! ```

use serde::{Deserialize, Serialize};

use crate::status::PasswordStatusSnapshot;

/// Routes the guard redirects to or exempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    pub login: String,
    pub forgot_password: String,
    pub change_password: String,
    /// Paths never held back by password-expiry enforcement.
    pub exempt: Vec<String>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            forgot_password: "/forgot-password".to_string(),
            change_password: "/change-password".to_string(),
            exempt: vec![
                "/change-password".to_string(),
                "/forgot-password".to_string(),
                "/reset-password".to_string(),
            ],
        }
    }
}

impl RouteConfig {
    /// True if `path` is an exempt route or below one (`/reset-password/abc`).
    pub fn is_exempt(&self, path: &str) -> bool {
        let path = normalize(path);
        self.exempt.iter().any(|route| {
            let route = normalize(route);
            path == route
                || path
                    .strip_prefix(route)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

/// Where the guard currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    Unauthenticated,
    CheckingPasswordStatus,
    PasswordActionRequired(NavigationState),
    Authorized,
}

/// State carried to the forgot-password page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationState {
    pub expired: bool,
    pub email: Option<String>,
    pub message: String,
}

/// What the protected page should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    RedirectToLogin { to: String },
    /// Show a loading placeholder.
    Loading,
    RedirectToForgotPassword(Redirect),
    Render,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub to: String,
    pub state: NavigationState,
}

pub const EXPIRED_MESSAGE: &str =
    "Your password has expired. Please reset your password to continue.";
pub const MUST_CHANGE_MESSAGE: &str =
    "You must change your password before continuing. Please reset your password.";

/// Pure routing policy over [`RouteConfig`].
#[derive(Debug, Clone, Default)]
pub struct RouteGuard {
    routes: RouteConfig,
}

impl RouteGuard {
    pub fn new(routes: RouteConfig) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &RouteConfig {
        &self.routes
    }

    /// Classify the current situation.
    ///
    /// Exemption is recomputed from `path` on every call, so a path change is all it takes
    /// to re-evaluate.
    pub fn state(
        &self,
        path: &str,
        has_token: bool,
        email: Option<&str>,
        snapshot: &PasswordStatusSnapshot,
    ) -> GuardState {
        if !has_token {
            return GuardState::Unauthenticated;
        }

        if self.routes.is_exempt(path) {
            return GuardState::Authorized;
        }

        if snapshot.loading {
            return GuardState::CheckingPasswordStatus;
        }

        match &snapshot.status {
            Some(status) if status.requires_action() => {
                let message = if status.is_expired {
                    EXPIRED_MESSAGE
                } else {
                    MUST_CHANGE_MESSAGE
                };
                GuardState::PasswordActionRequired(NavigationState {
                    expired: true,
                    email: email.map(str::to_string),
                    message: message.to_string(),
                })
            }
            // A failed status fetch does not block navigation
            _ => GuardState::Authorized,
        }
    }

    pub fn evaluate(
        &self,
        path: &str,
        has_token: bool,
        email: Option<&str>,
        snapshot: &PasswordStatusSnapshot,
    ) -> GuardDecision {
        match self.state(path, has_token, email, snapshot) {
            GuardState::Unauthenticated => GuardDecision::RedirectToLogin {
                to: self.routes.login.clone(),
            },
            GuardState::CheckingPasswordStatus => GuardDecision::Loading,
            GuardState::PasswordActionRequired(state) => {
                tracing::debug!(path, "Redirecting to password reset");
                GuardDecision::RedirectToForgotPassword(Redirect {
                    to: self.routes.forgot_password.clone(),
                    state,
                })
            }
            GuardState::Authorized => GuardDecision::Render,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::PasswordStatus;

    fn expired() -> PasswordStatusSnapshot {
        PasswordStatusSnapshot::loaded(PasswordStatus {
            is_expired: true,
            ..Default::default()
        })
    }

    #[test]
    fn test_no_token_redirects_to_login() {
        let guard = RouteGuard::default();
        assert_eq!(
            guard.evaluate("/home", false, None, &PasswordStatusSnapshot::empty()),
            GuardDecision::RedirectToLogin {
                to: "/login".to_string()
            }
        );
        // Exempt routes still need a token
        assert_eq!(
            guard.state("/change-password", false, None, &expired()),
            GuardState::Unauthenticated
        );
    }

    #[test]
    fn test_expired_password_redirects_with_state() {
        let guard = RouteGuard::default();
        let decision = guard.evaluate("/home", true, Some("renter@example.com"), &expired());

        let GuardDecision::RedirectToForgotPassword(redirect) = decision else {
            panic!("expected a redirect, got {decision:?}");
        };
        assert_eq!(redirect.to, "/forgot-password");
        assert!(redirect.state.expired);
        assert_eq!(redirect.state.email.as_deref(), Some("renter@example.com"));
        assert_eq!(redirect.state.message, EXPIRED_MESSAGE);
    }

    #[test]
    fn test_must_change_redirects() {
        let guard = RouteGuard::default();
        let snapshot = PasswordStatusSnapshot::loaded(PasswordStatus {
            must_change_password: true,
            ..Default::default()
        });
        let GuardState::PasswordActionRequired(state) =
            guard.state("/bookings", true, None, &snapshot)
        else {
            panic!("expected action required");
        };
        assert!(state.expired);
        assert_eq!(state.message, MUST_CHANGE_MESSAGE);
    }

    #[test]
    fn test_exempt_route_renders() {
        let guard = RouteGuard::default();
        assert_eq!(
            guard.evaluate("/change-password", true, None, &expired()),
            GuardDecision::Render
        );
        assert_eq!(
            guard.evaluate("/reset-password/token123", true, None, &expired()),
            GuardDecision::Render
        );
        assert_eq!(
            guard.evaluate("/forgot-password?step=otp", true, None, &expired()),
            GuardDecision::Render
        );
    }

    #[test]
    fn test_loading_shows_placeholder() {
        let guard = RouteGuard::default();
        assert_eq!(
            guard.evaluate("/home", true, None, &PasswordStatusSnapshot::loading()),
            GuardDecision::Loading
        );
        assert_eq!(
            guard.evaluate("/change-password", true, None, &PasswordStatusSnapshot::loading()),
            GuardDecision::Render
        );
    }

    #[test]
    fn test_healthy_status_and_failures_render() {
        let guard = RouteGuard::default();
        let healthy = PasswordStatusSnapshot::loaded(PasswordStatus::default());
        assert_eq!(guard.evaluate("/home", true, None, &healthy), GuardDecision::Render);

        let failed = PasswordStatusSnapshot::failed("Network error");
        assert_eq!(guard.evaluate("/home", true, None, &failed), GuardDecision::Render);

        assert_eq!(
            guard.evaluate("/home", true, None, &PasswordStatusSnapshot::empty()),
            GuardDecision::Render
        );
    }

    #[test]
    fn test_exemption_matching() {
        let routes = RouteConfig::default();
        assert!(routes.is_exempt("/change-password"));
        assert!(routes.is_exempt("/change-password/"));
        assert!(routes.is_exempt("/reset-password/abc"));
        assert!(!routes.is_exempt("/change-password-now"));
        assert!(!routes.is_exempt("/home"));
        assert!(!routes.is_exempt("/"));
    }

    #[test]
    fn test_path_change_reevaluates() {
        let guard = RouteGuard::default();
        let snapshot = expired();
        assert_eq!(
            guard.evaluate("/change-password", true, None, &snapshot),
            GuardDecision::Render
        );
        assert!(matches!(
            guard.evaluate("/vehicles", true, None, &snapshot),
            GuardDecision::RedirectToForgotPassword(_)
        ));
    }

    #[test]
    fn test_custom_routes() {
        let guard = RouteGuard::new(RouteConfig {
            login: "/signin".to_string(),
            forgot_password: "/recover".to_string(),
            change_password: "/account/password".to_string(),
            exempt: vec!["/recover".to_string()],
        });
        assert_eq!(
            guard.evaluate("/home", false, None, &PasswordStatusSnapshot::empty()),
            GuardDecision::RedirectToLogin {
                to: "/signin".to_string()
            }
        );
        assert_eq!(guard.routes().forgot_password, "/recover");
    }
}
