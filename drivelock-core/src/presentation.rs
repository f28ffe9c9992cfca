//! Presentation records for banners, toasts and the strength meter.
//!
//! These are plain data: a UI layer renders them however it likes. Every builder returns
//! `None` when there is nothing to show.

use serde::Serialize;

use crate::{
    guard::RouteConfig,
    policy::{PasswordPolicy, StrengthLevel, suggestions},
    services::LockStatus,
    session::SessionStatus,
    status::PasswordStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A navigation button on a banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BannerAction {
    pub label: String,
    pub route: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Banner {
    pub severity: Severity,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<BannerAction>,
}

impl Banner {
    fn new(severity: Severity, title: &str, message: String) -> Self {
        Self {
            severity,
            title: title.to_string(),
            message,
            action: None,
        }
    }

    fn with_action(mut self, label: &str, route: &str) -> Self {
        self.action = Some(BannerAction {
            label: label.to_string(),
            route: route.to_string(),
        });
        self
    }
}

/// `"1 minute"`, `"3 minutes"`.
pub fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("{n} {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

/// Expiry banner for the dashboard.
///
/// Expired and must-change statuses point at the forgot-password flow; an upcoming expiry points
/// at the change-password page.
pub fn password_status_banner(status: &PasswordStatus, routes: &RouteConfig) -> Option<Banner> {
    if status.is_expired {
        return Some(
            Banner::new(
                Severity::Error,
                "Password expired",
                "Your password has expired. Reset it to continue using your account.".to_string(),
            )
            .with_action("Reset password", &routes.forgot_password),
        );
    }

    if status.must_change_password {
        return Some(
            Banner::new(
                Severity::Error,
                "Password change required",
                "You must change your password before continuing.".to_string(),
            )
            .with_action("Reset password", &routes.forgot_password),
        );
    }

    if !status.show_warning {
        return None;
    }

    let message = match status.days_until_expiry {
        Some(0) => "Your password expires today.".to_string(),
        Some(days) => format!("Your password expires in {}.", plural(days, "day")),
        None => "Your password expires soon.".to_string(),
    };
    Some(
        Banner::new(Severity::Warning, "Password expiring soon", message)
            .with_action("Change password", &routes.change_password),
    )
}

/// Countdown shown on the login page while an account is locked.
pub fn lockout_banner(lock: &LockStatus) -> Option<Banner> {
    if !lock.locked {
        return None;
    }

    let minutes = lock.remaining_time.unwrap_or(1);
    Some(Banner::new(
        Severity::Error,
        "Account temporarily locked",
        format!(
            "Too many failed login attempts. Please try again in {}.",
            plural(minutes, "minute")
        ),
    ))
}

/// Warning once at least one attempt has failed and the account is not yet locked.
pub fn remaining_attempts_banner(remaining: u32, threshold: u32) -> Option<Banner> {
    if remaining == 0 || remaining >= threshold {
        return None;
    }

    let severity = if remaining == 1 {
        Severity::Error
    } else {
        Severity::Warning
    };
    Some(Banner::new(
        severity,
        "Login failed",
        format!(
            "{} remaining before your account is locked.",
            plural(i64::from(remaining), "attempt")
        ),
    ))
}

/// Idle-timeout notice. Nothing is shown for an active or inactive session.
pub fn session_banner(status: SessionStatus, routes: &RouteConfig) -> Option<Banner> {
    match status {
        SessionStatus::Warning { remaining_minutes } => Some(Banner::new(
            Severity::Warning,
            "Session expiring",
            format!(
                "Your session will expire in {} due to inactivity.",
                plural(remaining_minutes.max(1), "minute")
            ),
        )),
        SessionStatus::Expired => Some(
            Banner::new(
                Severity::Info,
                "Session expired",
                "Your session has expired. Please log in again.".to_string(),
            )
            .with_action("Log in", &routes.login),
        ),
        SessionStatus::Active | SessionStatus::Inactive => None,
    }
}

/// Everything a strength meter widget displays for one candidate password.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrengthMeter {
    pub score: u8,
    pub max_score: u8,
    /// Fill of the meter bar, 0..=100.
    pub percent: u8,
    pub level: StrengthLevel,
    pub label: String,
    pub entropy_bits: f64,
    pub time_to_crack: String,
    pub suggestions: Vec<String>,
    pub violations: Vec<String>,
}

impl StrengthMeter {
    pub const MAX_SCORE: u8 = 6;

    pub fn evaluate(policy: &PasswordPolicy, password: &str) -> Self {
        let assessment = policy.assess_strength(password);
        let percent = (u16::from(assessment.score) * 100 / u16::from(Self::MAX_SCORE)) as u8;

        Self {
            score: assessment.score,
            max_score: Self::MAX_SCORE,
            percent,
            level: assessment.strength_level,
            label: assessment.strength_level.label().to_string(),
            entropy_bits: policy.entropy(password),
            time_to_crack: policy.time_to_crack(password),
            suggestions: suggestions(policy, &assessment),
            violations: policy.validate(password),
        }
    }

    pub fn is_acceptable(&self) -> bool {
        self.violations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_warning_banner() {
        let status = PasswordStatus {
            days_until_expiry: Some(3),
            show_warning: true,
            ..Default::default()
        };
        let banner = password_status_banner(&status, &RouteConfig::default()).unwrap();
        assert_eq!(banner.severity, Severity::Warning);
        assert_eq!(banner.message, "Your password expires in 3 days.");
        assert_eq!(banner.action.unwrap().route, "/change-password");

        let status = PasswordStatus {
            days_until_expiry: Some(1),
            show_warning: true,
            ..Default::default()
        };
        let banner = password_status_banner(&status, &RouteConfig::default()).unwrap();
        assert_eq!(banner.message, "Your password expires in 1 day.");
    }

    #[test]
    fn test_expired_banner_points_to_reset() {
        let status = PasswordStatus {
            is_expired: true,
            show_warning: true,
            ..Default::default()
        };
        let banner = password_status_banner(&status, &RouteConfig::default()).unwrap();
        assert_eq!(banner.severity, Severity::Error);
        assert_eq!(banner.title, "Password expired");
        assert_eq!(banner.action.unwrap().route, "/forgot-password");
    }

    #[test]
    fn test_must_change_banner() {
        let status = PasswordStatus {
            must_change_password: true,
            ..Default::default()
        };
        let banner = password_status_banner(&status, &RouteConfig::default()).unwrap();
        assert_eq!(banner.title, "Password change required");
    }

    #[test]
    fn test_healthy_status_has_no_banner() {
        let status = PasswordStatus {
            days_until_expiry: Some(40),
            ..Default::default()
        };
        assert!(password_status_banner(&status, &RouteConfig::default()).is_none());
    }

    #[test]
    fn test_lockout_banner() {
        assert!(lockout_banner(&LockStatus::unlocked()).is_none());

        let banner = lockout_banner(&LockStatus::locked(12)).unwrap();
        assert_eq!(
            banner.message,
            "Too many failed login attempts. Please try again in 12 minutes."
        );
        let banner = lockout_banner(&LockStatus::locked(1)).unwrap();
        assert!(banner.message.ends_with("in 1 minute."));
    }

    #[test]
    fn test_remaining_attempts_banner() {
        assert!(remaining_attempts_banner(5, 5).is_none());
        assert!(remaining_attempts_banner(0, 5).is_none());

        let banner = remaining_attempts_banner(3, 5).unwrap();
        assert_eq!(banner.severity, Severity::Warning);
        assert_eq!(
            banner.message,
            "3 attempts remaining before your account is locked."
        );

        let banner = remaining_attempts_banner(1, 5).unwrap();
        assert_eq!(banner.severity, Severity::Error);
        assert!(banner.message.starts_with("1 attempt remaining"));
    }

    #[test]
    fn test_session_banner() {
        let routes = RouteConfig::default();
        assert!(session_banner(SessionStatus::Active, &routes).is_none());
        assert!(session_banner(SessionStatus::Inactive, &routes).is_none());

        let banner = session_banner(
            SessionStatus::Warning {
                remaining_minutes: 4,
            },
            &routes,
        )
        .unwrap();
        assert!(banner.message.contains("4 minutes"));

        let banner = session_banner(SessionStatus::Expired, &routes).unwrap();
        assert_eq!(banner.action.unwrap().route, "/login");
    }

    #[test]
    fn test_strength_meter() {
        let policy = PasswordPolicy::default();

        let meter = StrengthMeter::evaluate(&policy, "");
        assert_eq!(meter.score, 0);
        assert_eq!(meter.percent, 0);
        assert_eq!(meter.level, StrengthLevel::VeryWeak);
        assert_eq!(meter.entropy_bits, 0.0);
        assert_eq!(meter.suggestions.len(), 6);
        assert!(!meter.is_acceptable());

        let meter = StrengthMeter::evaluate(&policy, "Rental#2024x");
        assert_eq!(meter.score, 6);
        assert_eq!(meter.percent, 100);
        assert_eq!(meter.label, "Very Strong");
        assert!(meter.suggestions.is_empty());
        assert!(meter.is_acceptable());
    }

    #[test]
    fn test_banner_serialization() {
        let banner = lockout_banner(&LockStatus::locked(2)).unwrap();
        let value = serde_json::to_value(&banner).unwrap();
        assert_eq!(value["severity"], "error");
        assert!(value.get("action").is_none());
    }
}
