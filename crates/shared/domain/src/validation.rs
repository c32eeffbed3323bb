//! Payload validation and normalization.
//!
//! Runs before anything touches the store. Every offending field is reported,
//! not just the first one.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::constants::{MAX_NICKNAME_LENGTH, MIN_NICKNAME_LENGTH, MIN_PASSWORD_LENGTH};
use crate::error::{DomainError, DomainResult, FieldViolation};
use crate::user::{NewUser, Profile, UserRole, UserUpdate};

static NICKNAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("nickname pattern is valid"));

/// Minimum-strength rules a new password must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: MIN_PASSWORD_LENGTH,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
        }
    }
}

impl PasswordPolicy {
    /// Length-only policy
    pub fn lenient(min_length: usize) -> Self {
        Self {
            min_length,
            require_uppercase: false,
            require_lowercase: false,
            require_digit: false,
            require_special: false,
        }
    }

    /// Check a candidate password, describing every unmet rule.
    pub fn check(&self, password: &str) -> Result<(), FieldViolation> {
        let mut unmet = Vec::new();

        if password.chars().count() < self.min_length {
            unmet.push(format!("at least {} characters", self.min_length));
        }
        if self.require_uppercase && !password.chars().any(char::is_uppercase) {
            unmet.push("an uppercase letter".to_string());
        }
        if self.require_lowercase && !password.chars().any(char::is_lowercase) {
            unmet.push("a lowercase letter".to_string());
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            unmet.push("a digit".to_string());
        }
        if self.require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
            unmet.push("a special character".to_string());
        }

        if unmet.is_empty() {
            Ok(())
        } else {
            Err(FieldViolation::new(
                "password",
                format!("must contain {}", unmet.join(", ")),
            ))
        }
    }
}

/// Registration payload after validation; email is canonical.
#[derive(Clone)]
pub struct ValidNewUser {
    pub email: String,
    pub password: String,
    pub nickname: Option<String>,
    pub role: Option<UserRole>,
    pub profile: Profile,
}

impl std::fmt::Debug for ValidNewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidNewUser")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("nickname", &self.nickname)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Update payload after validation; email is canonical.
#[derive(Debug, Clone, Default)]
pub struct ValidUserUpdate {
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub role: Option<UserRole>,
    pub profile: Profile,
}

impl ValidUserUpdate {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.nickname.is_none()
            && self.role.is_none()
            && self.profile == Profile::default()
    }
}

/// Lower-cased, trimmed form used for storage and lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_nickname(nickname: &str) -> Result<(), FieldViolation> {
    let len = nickname.chars().count();
    if len == 0 {
        return Err(FieldViolation::new("nickname", "must not be empty"));
    }
    if !(MIN_NICKNAME_LENGTH..=MAX_NICKNAME_LENGTH).contains(&len) {
        return Err(FieldViolation::new(
            "nickname",
            format!(
                "must be between {} and {} characters",
                MIN_NICKNAME_LENGTH, MAX_NICKNAME_LENGTH
            ),
        ));
    }
    if !NICKNAME_PATTERN.is_match(nickname) {
        return Err(FieldViolation::new(
            "nickname",
            "may only contain letters, digits, underscores and hyphens",
        ));
    }
    Ok(())
}

fn validate_role(role: &str) -> Result<UserRole, FieldViolation> {
    UserRole::parse(role).ok_or_else(|| FieldViolation::new("role", "is not a known role"))
}

fn collect(result: Result<(), ValidationErrors>) -> Vec<FieldViolation> {
    let Err(errors) = result else {
        return Vec::new();
    };
    let mut violations = Vec::new();
    for (field, field_errors) in errors.field_errors() {
        for error in field_errors.iter() {
            let message = error
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| error.code.to_string());
            violations.push(FieldViolation::new(field.to_string(), message));
        }
    }
    violations
}

fn finish<T>(mut violations: Vec<FieldViolation>, value: T) -> DomainResult<T> {
    if violations.is_empty() {
        return Ok(value);
    }
    violations.sort_by(|a, b| a.field.cmp(&b.field));
    Err(DomainError::InvalidFields(violations))
}

/// Validate a registration payload against the given password policy.
pub fn validate_new_user(payload: &NewUser, policy: &PasswordPolicy) -> DomainResult<ValidNewUser> {
    let payload = NewUser {
        email: normalize_email(&payload.email),
        ..payload.clone()
    };
    let mut violations = collect(payload.validate());

    if let Err(v) = policy.check(&payload.password) {
        violations.push(v);
    }
    if let Some(nickname) = &payload.nickname {
        if let Err(v) = validate_nickname(nickname) {
            violations.push(v);
        }
    }
    let role = match payload.role.as_deref().map(validate_role).transpose() {
        Ok(role) => role,
        Err(v) => {
            violations.push(v);
            None
        }
    };

    finish(
        violations,
        ValidNewUser {
            email: payload.email,
            password: payload.password,
            nickname: payload.nickname,
            role,
            profile: Profile {
                first_name: payload.first_name,
                last_name: payload.last_name,
                bio: payload.bio,
                profile_picture_url: payload.profile_picture_url,
            },
        },
    )
}

/// Validate a partial update. Absent fields are not checked.
pub fn validate_update(payload: &UserUpdate) -> DomainResult<ValidUserUpdate> {
    let payload = UserUpdate {
        email: payload.email.as_deref().map(normalize_email),
        ..payload.clone()
    };
    let mut violations = collect(payload.validate());

    if let Some(nickname) = &payload.nickname {
        if let Err(v) = validate_nickname(nickname) {
            violations.push(v);
        }
    }
    let role = match payload.role.as_deref().map(validate_role).transpose() {
        Ok(role) => role,
        Err(v) => {
            violations.push(v);
            None
        }
    };

    finish(
        violations,
        ValidUserUpdate {
            email: payload.email,
            nickname: payload.nickname,
            role,
            profile: Profile {
                first_name: payload.first_name,
                last_name: payload.last_name,
                bio: payload.bio,
                profile_picture_url: payload.profile_picture_url,
            },
        },
    )
}

/// Validate a replacement password on its own.
pub fn validate_password(password: &str, policy: &PasswordPolicy) -> DomainResult<()> {
    policy
        .check(password)
        .map_err(|v| DomainError::InvalidFields(vec![v]))
}
