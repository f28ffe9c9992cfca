//! Password policy and strength assessment.
//!
//! [`PasswordPolicy`] holds the structural rules a password must satisfy. Everything in this
//! module is a pure function of its inputs and the policy; nothing here touches storage.
//!
//! # Example
//!
//! ```rust
//! use drivelock_core::policy::{PasswordPolicy, StrengthLevel};
//!
//! let policy = PasswordPolicy::default();
//! assert!(policy.validate("Rental#2024x").is_empty());
//!
//! let assessment = policy.assess_strength("Rental#2024x");
//! assert_eq!(assessment.strength_level, StrengthLevel::VeryStrong);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Guesses per second assumed by [`PasswordPolicy::time_to_crack`].
pub const GUESSES_PER_SECOND: f64 = 1e9;

const SECONDS_PER_MINUTE: f64 = 60.0;
const SECONDS_PER_HOUR: f64 = 3_600.0;
const SECONDS_PER_DAY: f64 = 86_400.0;
const SECONDS_PER_YEAR: f64 = 31_536_000.0;
const CENTURIES_THRESHOLD: f64 = 31_536_000_000.0;

/// Password policy configuration.
///
/// Loaded once at start-up; the security store may swap it at runtime through
/// [`SecurityStore::set_policy`](crate::SecurityStore::set_policy), but that override is
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_numbers: bool,
    pub require_special_chars: bool,
    /// Characters that count as "special".
    pub special_chars: String,
    /// Longest run of one repeated character that is still allowed.
    pub max_repeating_chars: usize,
    pub password_history_count: usize,
    pub password_expiry_days: u32,
    pub lockout_threshold: u32,
    /// Lockout length in minutes.
    pub lockout_duration: u32,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            require_uppercase: true,
            require_lowercase: true,
            require_numbers: true,
            require_special_chars: true,
            special_chars: "!@#$%^&*()_+-=[]{}|;:,.<>?".to_string(),
            max_repeating_chars: 2,
            password_history_count: 5,
            password_expiry_days: 90,
            lockout_threshold: 5,
            lockout_duration: 15,
        }
    }
}

/// Individual checks used by the strength assessment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrengthChecks {
    pub length: bool,
    pub uppercase: bool,
    pub lowercase: bool,
    pub number: bool,
    pub special: bool,
    pub no_repeating: bool,
}

impl StrengthChecks {
    /// Number of checks that passed.
    pub fn passed(&self) -> u8 {
        [
            self.length,
            self.uppercase,
            self.lowercase,
            self.number,
            self.special,
            self.no_repeating,
        ]
        .into_iter()
        .filter(|check| *check)
        .count() as u8
    }
}

/// Coarse strength bucket derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrengthLevel {
    VeryWeak,
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl StrengthLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=2 => Self::VeryWeak,
            3 => Self::Weak,
            4 => Self::Moderate,
            5 => Self::Strong,
            _ => Self::VeryStrong,
        }
    }

    /// Kebab-case identifier, e.g. `very-weak`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryWeak => "very-weak",
            Self::Weak => "weak",
            Self::Moderate => "moderate",
            Self::Strong => "strong",
            Self::VeryStrong => "very-strong",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::VeryWeak => "Very Weak",
            Self::Weak => "Weak",
            Self::Moderate => "Moderate",
            Self::Strong => "Strong",
            Self::VeryStrong => "Very Strong",
        }
    }
}

/// Result of [`PasswordPolicy::assess_strength`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrengthAssessment {
    /// Count of passed checks, 0..=6.
    pub score: u8,
    pub feedback: String,
    pub checks: StrengthChecks,
    pub strength_level: StrengthLevel,
}

impl PasswordPolicy {
    /// Parse a policy from JSON. Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        let policy: Self = serde_json::from_str(json)
            .map_err(|e| ValidationError::InvalidPolicy(e.to_string()))?;
        policy.check()?;
        Ok(policy)
    }

    /// Reject policies that no password could ever satisfy.
    pub fn check(&self) -> Result<(), ValidationError> {
        if self.min_length > self.max_length {
            return Err(ValidationError::InvalidPolicy(format!(
                "minLength {} exceeds maxLength {}",
                self.min_length, self.max_length
            )));
        }
        if self.require_special_chars && self.special_chars.is_empty() {
            return Err(ValidationError::InvalidPolicy(
                "special characters are required but none are configured".to_string(),
            ));
        }
        if self.max_repeating_chars == 0 {
            return Err(ValidationError::InvalidPolicy(
                "maxRepeatingChars must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate a candidate password.
    ///
    /// Returns one message per unmet rule, in a fixed order: minimum length, maximum length,
    /// uppercase, lowercase, number, special character, repeated characters. An empty list
    /// means the password is compliant.
    pub fn validate(&self, password: &str) -> Vec<String> {
        let mut violations = Vec::new();
        let length = password.chars().count();

        if length < self.min_length {
            violations.push(format!(
                "Password must be at least {} characters long",
                self.min_length
            ));
        }
        if length > self.max_length {
            violations.push(format!(
                "Password must be no more than {} characters long",
                self.max_length
            ));
        }
        if self.require_uppercase && !has_uppercase(password) {
            violations.push("Password must contain at least one uppercase letter".to_string());
        }
        if self.require_lowercase && !has_lowercase(password) {
            violations.push("Password must contain at least one lowercase letter".to_string());
        }
        if self.require_numbers && !has_number(password) {
            violations.push("Password must contain at least one number".to_string());
        }
        if self.require_special_chars && !self.has_special(password) {
            violations.push(format!(
                "Password must contain at least one special character ({})",
                self.special_chars
            ));
        }
        if has_repeating_characters(password, self.max_repeating_chars) {
            violations.push(format!(
                "Password cannot contain more than {} repeating characters in a row",
                self.max_repeating_chars
            ));
        }

        violations
    }

    /// Validate and turn violations into an error.
    pub fn ensure_valid(&self, password: &str) -> Result<(), ValidationError> {
        let violations = self.validate(password);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::PolicyViolation(violations))
        }
    }

    /// Score a password from 0 to 6, one point per passed check.
    pub fn assess_strength(&self, password: &str) -> StrengthAssessment {
        let length = password.chars().count();
        let checks = StrengthChecks {
            length: length >= self.min_length && length <= self.max_length,
            uppercase: has_uppercase(password),
            lowercase: has_lowercase(password),
            number: has_number(password),
            special: self.has_special(password),
            // An empty password has no runs, but it should not earn a point either
            no_repeating: !password.is_empty()
                && !has_repeating_characters(password, self.max_repeating_chars),
        };
        let score = checks.passed();
        let strength_level = StrengthLevel::from_score(score);

        StrengthAssessment {
            score,
            feedback: strength_level.label().to_string(),
            checks,
            strength_level,
        }
    }

    /// Entropy in bits, `length * log2(charset)`.
    ///
    /// The charset size only counts the classes present in the password, not the ones the
    /// policy requires.
    pub fn entropy(&self, password: &str) -> f64 {
        let mut charset_size = 0usize;
        if has_lowercase(password) {
            charset_size += 26;
        }
        if has_uppercase(password) {
            charset_size += 26;
        }
        if has_number(password) {
            charset_size += 10;
        }
        if self.has_special(password) {
            charset_size += self.special_chars.chars().count();
        }

        if charset_size == 0 {
            return 0.0;
        }

        password.chars().count() as f64 * (charset_size as f64).log2()
    }

    /// Rough time-to-crack for display, assuming [`GUESSES_PER_SECOND`].
    pub fn time_to_crack(&self, password: &str) -> String {
        let entropy = self.entropy(password);
        let seconds = 2f64.powf(entropy - 1.0) / GUESSES_PER_SECOND;
        crack_time_bucket(seconds)
    }

    fn has_special(&self, password: &str) -> bool {
        password.chars().any(|c| self.special_chars.contains(c))
    }
}

fn crack_time_bucket(seconds: f64) -> String {
    if seconds < SECONDS_PER_MINUTE {
        "Less than a minute".to_string()
    } else if seconds < SECONDS_PER_HOUR {
        plural((seconds / SECONDS_PER_MINUTE).floor(), "minute")
    } else if seconds < SECONDS_PER_DAY {
        plural((seconds / SECONDS_PER_HOUR).floor(), "hour")
    } else if seconds < SECONDS_PER_YEAR {
        plural((seconds / SECONDS_PER_DAY).floor(), "day")
    } else if seconds < CENTURIES_THRESHOLD {
        plural((seconds / SECONDS_PER_YEAR).floor(), "year")
    } else {
        "Centuries".to_string()
    }
}

fn plural(count: f64, unit: &str) -> String {
    if count == 1.0 {
        format!("1 {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

fn has_uppercase(password: &str) -> bool {
    password.chars().any(|c| c.is_ascii_uppercase())
}

fn has_lowercase(password: &str) -> bool {
    password.chars().any(|c| c.is_ascii_lowercase())
}

fn has_number(password: &str) -> bool {
    password.chars().any(|c| c.is_ascii_digit())
}

/// True iff some run of one repeated character is longer than `max_repeating`.
///
/// A run of exactly `max_repeating` characters is allowed.
pub fn has_repeating_characters(password: &str, max_repeating: usize) -> bool {
    let mut run = 0usize;
    let mut previous = None;

    for c in password.chars() {
        if previous == Some(c) {
            run += 1;
        } else {
            run = 1;
            previous = Some(c);
        }
        if run > max_repeating {
            return true;
        }
    }

    false
}

/// One suggestion per failed check, in the order length, uppercase, lowercase, number,
/// special, repeats.
pub fn suggestions(policy: &PasswordPolicy, assessment: &StrengthAssessment) -> Vec<String> {
    let checks = &assessment.checks;
    let mut suggestions = Vec::new();

    if !checks.length {
        suggestions.push(format!(
            "Use between {} and {} characters",
            policy.min_length, policy.max_length
        ));
    }
    if !checks.uppercase {
        suggestions.push("Add uppercase letters (A-Z)".to_string());
    }
    if !checks.lowercase {
        suggestions.push("Add lowercase letters (a-z)".to_string());
    }
    if !checks.number {
        suggestions.push("Add numbers (0-9)".to_string());
    }
    if !checks.special {
        suggestions.push(format!("Add special characters ({})", policy.special_chars));
    }
    if !checks.no_repeating {
        suggestions.push("Avoid repeating the same character several times in a row".to_string());
    }

    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PasswordPolicy {
        PasswordPolicy::default()
    }

    #[test]
    fn test_compliant_password_has_no_violations() {
        assert!(policy().validate("Rental#2024x").is_empty());
        assert!(policy().ensure_valid("Rental#2024x").is_ok());
    }

    #[test]
    fn test_length_boundaries() {
        let p = policy();
        // 7 and 8 characters
        assert_eq!(
            p.validate("Ab1!xyz"),
            vec!["Password must be at least 8 characters long".to_string()]
        );
        assert!(p.validate("Ab1!xyzw").is_empty());

        // 128 and 129 characters, built without long runs
        let base: String = "Ab1!".chars().cycle().take(128).collect();
        assert!(p.validate(&base).is_empty());
        let too_long = format!("{base}x");
        assert_eq!(
            p.validate(&too_long),
            vec!["Password must be no more than 128 characters long".to_string()]
        );
    }

    #[test]
    fn test_each_missing_class_is_reported() {
        let p = policy();
        assert_eq!(
            p.validate("rental#2024x"),
            vec!["Password must contain at least one uppercase letter".to_string()]
        );
        assert_eq!(
            p.validate("RENTAL#2024X"),
            vec!["Password must contain at least one lowercase letter".to_string()]
        );
        assert_eq!(
            p.validate("Rental#abcdx"),
            vec!["Password must contain at least one number".to_string()]
        );
        assert_eq!(
            p.validate("Rental12024x"),
            vec![format!(
                "Password must contain at least one special character ({})",
                p.special_chars
            )]
        );
    }

    #[test]
    fn test_violation_order_is_stable() {
        let violations = policy().validate("aaa");
        assert_eq!(
            violations,
            vec![
                "Password must be at least 8 characters long".to_string(),
                "Password must contain at least one uppercase letter".to_string(),
                "Password must contain at least one number".to_string(),
                format!(
                    "Password must contain at least one special character ({})",
                    policy().special_chars
                ),
                "Password cannot contain more than 2 repeating characters in a row".to_string(),
            ]
        );
    }

    #[test]
    fn test_repeat_run_boundaries() {
        let p = policy();
        assert!(p.validate("Rent#2024xx").is_empty());
        assert_eq!(
            p.validate("Rent#2024xxx"),
            vec!["Password cannot contain more than 2 repeating characters in a row".to_string()]
        );
    }

    #[test]
    fn test_disabled_requirements_are_skipped() {
        let p = PasswordPolicy {
            require_uppercase: false,
            require_special_chars: false,
            ..PasswordPolicy::default()
        };
        assert!(p.validate("rental2024").is_empty());
    }

    #[test]
    fn test_has_repeating_characters() {
        assert!(has_repeating_characters("aaa", 2));
        assert!(!has_repeating_characters("aa", 2));
        assert!(!has_repeating_characters("aabaa", 2));
        assert!(!has_repeating_characters("", 2));
        assert!(has_repeating_characters("xyzzzz", 3));
        assert!(!has_repeating_characters("xyzzz", 3));
    }

    #[test]
    fn test_empty_password_assessment() {
        let assessment = policy().assess_strength("");
        assert_eq!(assessment.score, 0);
        assert_eq!(assessment.checks, StrengthChecks::default());
        assert_eq!(assessment.strength_level, StrengthLevel::VeryWeak);
        assert_eq!(assessment.feedback, "Very Weak");
    }

    #[test]
    fn test_strength_thresholds() {
        assert_eq!(StrengthLevel::from_score(0), StrengthLevel::VeryWeak);
        assert_eq!(StrengthLevel::from_score(2), StrengthLevel::VeryWeak);
        assert_eq!(StrengthLevel::from_score(3), StrengthLevel::Weak);
        assert_eq!(StrengthLevel::from_score(4), StrengthLevel::Moderate);
        assert_eq!(StrengthLevel::from_score(5), StrengthLevel::Strong);
        assert_eq!(StrengthLevel::from_score(6), StrengthLevel::VeryStrong);
    }

    #[test]
    fn test_assessment_counts_checks() {
        let p = policy();

        // lowercase + no repeats
        let weak = p.assess_strength("abc");
        assert_eq!(weak.score, 2);
        assert!(weak.checks.lowercase);
        assert!(weak.checks.no_repeating);
        assert!(!weak.checks.length);

        let strong = p.assess_strength("Rental2024x");
        assert_eq!(strong.score, 5);
        assert_eq!(strong.strength_level, StrengthLevel::Strong);
        assert!(!strong.checks.special);

        let best = p.assess_strength("Rental#2024x");
        assert_eq!(best.score, 6);
        assert_eq!(best.feedback, "Very Strong");
    }

    #[test]
    fn test_strength_level_serializes_kebab_case() {
        let json = serde_json::to_string(&StrengthLevel::VeryWeak).unwrap();
        assert_eq!(json, "\"very-weak\"");
        assert_eq!(StrengthLevel::Moderate.as_str(), "moderate");
    }

    #[test]
    fn test_entropy_uses_classes_present() {
        let p = policy();
        assert_eq!(p.entropy(""), 0.0);

        let lower_only = p.entropy("aaaaaaaa");
        assert!((lower_only - 8.0 * 26f64.log2()).abs() < 1e-9);

        let mixed = p.entropy("aA");
        assert!((mixed - 2.0 * 52f64.log2()).abs() < 1e-9);

        let special_count = p.special_chars.chars().count() as f64;
        let with_special = p.entropy("a!");
        assert!((with_special - 2.0 * (26.0 + special_count).log2()).abs() < 1e-9);
    }

    #[test]
    fn test_entropy_ignores_unknown_symbols() {
        assert_eq!(policy().entropy("   "), 0.0);
    }

    #[test]
    fn test_time_to_crack_low_entropy_bucket() {
        let p = policy();
        // 8 lowercase chars: ~37.6 bits, 2^36.6 / 1e9 is roughly 104 seconds
        let estimate = p.time_to_crack("aaaaaaaa");
        assert!(estimate.ends_with("minute") || estimate.ends_with("minutes"));
    }

    #[test]
    fn test_time_to_crack_extremes() {
        let p = policy();
        assert_eq!(p.time_to_crack(""), "Less than a minute");
        assert_eq!(p.time_to_crack("abc"), "Less than a minute");
        assert_eq!(p.time_to_crack("Rental#2024x-Rental#2024x"), "Centuries");
    }

    #[test]
    fn test_crack_time_buckets() {
        assert_eq!(crack_time_bucket(59.0), "Less than a minute");
        assert_eq!(crack_time_bucket(60.0), "1 minute");
        assert_eq!(crack_time_bucket(150.0), "2 minutes");
        assert_eq!(crack_time_bucket(7_200.0), "2 hours");
        assert_eq!(crack_time_bucket(86_400.0 * 3.0), "3 days");
        assert_eq!(crack_time_bucket(31_536_000.0 * 10.0), "10 years");
        assert_eq!(crack_time_bucket(31_536_000_000.0), "Centuries");
    }

    #[test]
    fn test_suggestions_follow_failed_checks() {
        let p = policy();
        let assessment = p.assess_strength("");
        let all = suggestions(&p, &assessment);
        assert_eq!(all.len(), 6);
        assert_eq!(all[0], "Use between 8 and 128 characters");
        assert_eq!(all[1], "Add uppercase letters (A-Z)");
        assert_eq!(
            all[5],
            "Avoid repeating the same character several times in a row"
        );

        let assessment = p.assess_strength("Rental2024x");
        assert_eq!(
            suggestions(&p, &assessment),
            vec![format!("Add special characters ({})", p.special_chars)]
        );

        let assessment = p.assess_strength("Rental#2024x");
        assert!(suggestions(&p, &assessment).is_empty());
    }

    #[test]
    fn test_from_json_with_defaults() {
        let policy = PasswordPolicy::from_json(r#"{"minLength": 12, "lockoutThreshold": 3}"#)
            .unwrap();
        assert_eq!(policy.min_length, 12);
        assert_eq!(policy.lockout_threshold, 3);
        assert_eq!(policy.max_length, 128);
        assert_eq!(policy.password_history_count, 5);
    }

    #[test]
    fn test_from_json_rejects_impossible_policy() {
        let err = PasswordPolicy::from_json(r#"{"minLength": 200}"#).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidPolicy(_)));

        let err = PasswordPolicy::from_json(r#"{"specialChars": ""}"#).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidPolicy(_)));

        let err = PasswordPolicy::from_json("not json").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidPolicy(_)));
    }
}
