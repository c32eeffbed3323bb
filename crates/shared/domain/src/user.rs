//! User domain entity and related types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::constants::{ROLE_ADMIN, ROLE_ANONYMOUS, ROLE_AUTHENTICATED, ROLE_MANAGER};

/// User roles enumeration, ordered from least to most privileged.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Anonymous,
    Authenticated,
    Manager,
    Admin,
}

impl UserRole {
    /// Strict, case-insensitive parse. Unknown values yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            ROLE_ANONYMOUS => Some(UserRole::Anonymous),
            ROLE_AUTHENTICATED => Some(UserRole::Authenticated),
            ROLE_MANAGER => Some(UserRole::Manager),
            ROLE_ADMIN => Some(UserRole::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Anonymous => ROLE_ANONYMOUS,
            UserRole::Authenticated => ROLE_AUTHENTICATED,
            UserRole::Manager => ROLE_MANAGER,
            UserRole::Admin => ROLE_ADMIN,
        }
    }
}

/// Lenient conversion used for stored values; anything unknown is least privilege.
impl From<&str> for UserRole {
    fn from(s: &str) -> Self {
        UserRole::parse(s).unwrap_or_default()
    }
}

impl From<String> for UserRole {
    fn from(s: String) -> Self {
        UserRole::from(s.as_str())
    }
}

impl From<UserRole> for String {
    fn from(role: UserRole) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Optional profile details shown on a user's page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub profile_picture_url: Option<String>,
}

/// User domain entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub nickname: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    #[serde(flatten)]
    pub profile: Profile,
    pub email_verified: bool,
    #[serde(skip_serializing)]
    pub verification_token: Option<String>,
    pub failed_login_attempts: i32,
    pub is_locked: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new, unverified user awaiting confirmation of `verification_token`.
    pub fn new(
        nickname: String,
        email: String,
        password_hash: String,
        role: UserRole,
        verification_token: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            nickname,
            email,
            password_hash,
            role,
            profile: Profile::default(),
            email_verified: false,
            verification_token: Some(verification_token),
            failed_login_attempts: 0,
            is_locked: false,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }
}

/// Registration payload as received from a caller.
#[derive(Clone, Default, Deserialize, Validate)]
pub struct NewUser {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    pub password: String,
    /// Generated when absent
    pub nickname: Option<String>,
    /// Requested role name; ignored by self-service registration
    pub role: Option<String>,
    #[validate(length(max = 100, message = "is too long"))]
    pub first_name: Option<String>,
    #[validate(length(max = 100, message = "is too long"))]
    pub last_name: Option<String>,
    #[validate(length(max = 500, message = "is too long"))]
    pub bio: Option<String>,
    #[validate(url(message = "must be a valid URL"))]
    pub profile_picture_url: Option<String>,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("nickname", &self.nickname)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl NewUser {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    pub fn with_role(mut self, role: UserRole) -> Self {
        self.role = Some(role.to_string());
        self
    }
}

/// Partial update payload. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UserUpdate {
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub role: Option<String>,
    #[validate(length(max = 100, message = "is too long"))]
    pub first_name: Option<String>,
    #[validate(length(max = 100, message = "is too long"))]
    pub last_name: Option<String>,
    #[validate(length(max = 500, message = "is too long"))]
    pub bio: Option<String>,
    #[validate(url(message = "must be a valid URL"))]
    pub profile_picture_url: Option<String>,
}

impl UserUpdate {
    pub fn email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Default::default()
        }
    }

    pub fn nickname(nickname: impl Into<String>) -> Self {
        Self {
            nickname: Some(nickname.into()),
            ..Default::default()
        }
    }
}

/// Column-level partial update handed to the store.
///
/// Every `Some` is written in a single update; `None` leaves the column as is.
/// `verification_token: Some(None)` clears the token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserChanges {
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<UserRole>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub profile_picture_url: Option<String>,
    pub email_verified: Option<bool>,
    pub verification_token: Option<Option<String>>,
    pub failed_login_attempts: Option<i32>,
    pub is_locked: Option<bool>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        *self == UserChanges::default()
    }

    /// Clears the lock and the failed-attempt counter
    pub fn unlock() -> Self {
        Self {
            is_locked: Some(false),
            failed_login_attempts: Some(0),
            ..Default::default()
        }
    }

    /// Apply these changes to an in-memory copy
    pub fn apply_to(&self, user: &mut User) {
        if let Some(nickname) = &self.nickname {
            user.nickname = nickname.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(hash) = &self.password_hash {
            user.password_hash = hash.clone();
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(first_name) = &self.first_name {
            user.profile.first_name = Some(first_name.clone());
        }
        if let Some(last_name) = &self.last_name {
            user.profile.last_name = Some(last_name.clone());
        }
        if let Some(bio) = &self.bio {
            user.profile.bio = Some(bio.clone());
        }
        if let Some(url) = &self.profile_picture_url {
            user.profile.profile_picture_url = Some(url.clone());
        }
        if let Some(verified) = self.email_verified {
            user.email_verified = verified;
        }
        if let Some(token) = &self.verification_token {
            user.verification_token = token.clone();
        }
        if let Some(attempts) = self.failed_login_attempts {
            user.failed_login_attempts = attempts;
        }
        if let Some(locked) = self.is_locked {
            user.is_locked = locked;
        }
        if let Some(at) = self.last_login_at {
            user.last_login_at = Some(at);
        }
        user.updated_at = Utc::now();
    }
}
