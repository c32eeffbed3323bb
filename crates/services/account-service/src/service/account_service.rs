//! Account service - the account lifecycle and login state machine.
//!
//! Validation failures and missing rows are reported as `Ok(None)` / `Ok(false)`.
//! Login failures are typed errors (`InvalidCredentials`, `AccountLocked`,
//! `EmailUnverified`). Store failures always propagate as `Err`.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use common::{AccountSettings, AppError, AppResult, LockoutNotice};
use domain::validation::{
    normalize_email, validate_new_user, validate_password, validate_update, ValidNewUser,
};
use domain::{generate_nickname, Password, User, UserChanges, UserRole, VerificationToken};
use domain::{NewUser, UserUpdate, MAX_PAGE_SIZE};

use crate::notification::NotificationPort;
use crate::repository::UserRepository;

/// Attempts at finding an unused generated nickname
const NICKNAME_ATTEMPTS: usize = 5;

/// Account service trait for dependency injection.
#[async_trait]
pub trait AccountService: Send + Sync {
    /// Create an account with the requested role (administrative path)
    async fn create(&self, payload: NewUser) -> AppResult<Option<User>>;

    /// Self-service registration; always uses the default role
    async fn register_user(&self, payload: NewUser) -> AppResult<Option<User>>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn get_by_nickname(&self, nickname: &str) -> AppResult<Option<User>>;

    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Apply a partial update; `None` if invalid or the user does not exist
    async fn update(&self, id: Uuid, payload: UserUpdate) -> AppResult<Option<User>>;

    async fn delete(&self, id: Uuid) -> AppResult<bool>;

    /// Stable page of users; `limit` is clamped to `1..=MAX_PAGE_SIZE`
    async fn list_users(&self, skip: u64, limit: u64) -> AppResult<Vec<User>>;

    async fn count_users(&self) -> AppResult<u64>;

    /// Authenticate by email and password
    async fn login_user(&self, email: &str, password: &str) -> AppResult<User>;

    async fn is_account_locked(&self, email: &str) -> AppResult<bool>;

    async fn reset_password(&self, id: Uuid, new_password: &str) -> AppResult<bool>;

    async fn verify_email_with_token(&self, id: Uuid, token: &str) -> AppResult<bool>;

    async fn unlock_user_account(&self, id: Uuid) -> AppResult<bool>;
}

/// Concrete implementation of AccountService.
pub struct AccountManager {
    repo: Arc<dyn UserRepository>,
    notifier: Arc<dyn NotificationPort>,
    settings: AccountSettings,
}

impl AccountManager {
    pub fn new(
        repo: Arc<dyn UserRepository>,
        notifier: Arc<dyn NotificationPort>,
        settings: AccountSettings,
    ) -> Self {
        Self {
            repo,
            notifier,
            settings,
        }
    }

    /// Shared body of `create` and `register_user`.
    async fn create_account(&self, valid: ValidNewUser, role: UserRole) -> AppResult<Option<User>> {
        if self.repo.find_by_email(&valid.email).await?.is_some() {
            tracing::info!("Registration rejected: email already in use");
            return Ok(None);
        }

        let nickname = match valid.nickname {
            Some(nickname) => {
                if self.repo.find_by_nickname(&nickname).await?.is_some() {
                    tracing::info!(%nickname, "Registration rejected: nickname already in use");
                    return Ok(None);
                }
                nickname
            }
            None => match self.unused_nickname().await? {
                Some(nickname) => nickname,
                None => {
                    tracing::warn!("Could not generate an unused nickname");
                    return Ok(None);
                }
            },
        };

        let password_hash = Password::new(&valid.password)?.into_string();
        let token = VerificationToken::issue();
        let user = User::new(nickname, valid.email, password_hash, role, token.clone())
            .with_profile(valid.profile);

        let user = match self.repo.insert(user).await {
            Ok(user) => user,
            Err(AppError::Conflict(_)) => {
                tracing::info!("Registration rejected: concurrent duplicate");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        tracing::info!(user_id = %user.id, role = %user.role, "User created");

        if let Err(e) = self.notifier.send_verification_email(&user, &token).await {
            tracing::warn!(user_id = %user.id, error = %e, "Verification email failed");
        }

        Ok(Some(user))
    }

    async fn unused_nickname(&self) -> AppResult<Option<String>> {
        for _ in 0..NICKNAME_ATTEMPTS {
            let candidate = generate_nickname();
            if self.repo.find_by_nickname(&candidate).await?.is_none() {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// The bad-password branch of the login state machine.
    async fn reject_bad_password(&self, user: &User) -> AppError {
        let max = self.settings.max_login_attempts();
        match self.repo.record_failed_login(user.id, max).await {
            Ok(Some(outcome)) if outcome.locked_now() => {
                tracing::warn!(user_id = %user.id, attempts = outcome.user.failed_login_attempts, "Account locked after failed logins");
                match self.settings.lockout_notice {
                    LockoutNotice::OnTrigger => AppError::AccountLocked,
                    LockoutNotice::NextAttempt => AppError::InvalidCredentials,
                }
            }
            // Locked by a concurrent attempt in the meantime
            Ok(Some(outcome)) if !outcome.counted => AppError::AccountLocked,
            Ok(Some(outcome)) => {
                tracing::info!(user_id = %user.id, attempts = outcome.user.failed_login_attempts, "Failed login");
                AppError::InvalidCredentials
            }
            Ok(None) => AppError::InvalidCredentials,
            Err(e) => e,
        }
    }
}

#[async_trait]
impl AccountService for AccountManager {
    async fn create(&self, payload: NewUser) -> AppResult<Option<User>> {
        let valid = match validate_new_user(&payload, &self.settings.password_policy) {
            Ok(valid) => valid,
            Err(e) => {
                tracing::info!(fields = ?e.fields(), "Rejected invalid registration");
                return Ok(None);
            }
        };
        let role = valid.role.unwrap_or(self.settings.default_role);
        self.create_account(valid, role).await
    }

    async fn register_user(&self, payload: NewUser) -> AppResult<Option<User>> {
        let valid = match validate_new_user(&payload, &self.settings.password_policy) {
            Ok(valid) => valid,
            Err(e) => {
                tracing::info!(fields = ?e.fields(), "Rejected invalid registration");
                return Ok(None);
            }
        };
        self.create_account(valid, self.settings.default_role).await
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        self.repo.find_by_id(id).await
    }

    async fn get_by_nickname(&self, nickname: &str) -> AppResult<Option<User>> {
        self.repo.find_by_nickname(nickname).await
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.repo.find_by_email(&normalize_email(email)).await
    }

    async fn update(&self, id: Uuid, payload: UserUpdate) -> AppResult<Option<User>> {
        let valid = match validate_update(&payload) {
            Ok(valid) => valid,
            Err(e) => {
                tracing::info!(user_id = %id, fields = ?e.fields(), "Rejected invalid update");
                return Ok(None);
            }
        };

        let Some(current) = self.repo.find_by_id(id).await? else {
            return Ok(None);
        };

        let mut changes = UserChanges {
            role: valid.role,
            first_name: valid.profile.first_name,
            last_name: valid.profile.last_name,
            bio: valid.profile.bio,
            profile_picture_url: valid.profile.profile_picture_url,
            ..Default::default()
        };

        if let Some(nickname) = valid.nickname.filter(|n| *n != current.nickname) {
            if self.repo.find_by_nickname(&nickname).await?.is_some() {
                return Ok(None);
            }
            changes.nickname = Some(nickname);
        }

        // A new address must be verified again
        let mut new_token = None;
        if let Some(email) = valid.email.filter(|e| *e != current.email) {
            if self.repo.find_by_email(&email).await?.is_some() {
                return Ok(None);
            }
            let token = VerificationToken::issue();
            changes.email = Some(email);
            changes.email_verified = Some(false);
            changes.verification_token = Some(Some(token.clone()));
            new_token = Some(token);
        }

        let updated = match self.repo.update_fields(id, changes).await {
            Ok(updated) => updated,
            Err(AppError::Conflict(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        if let (Some(user), Some(token)) = (&updated, &new_token) {
            if let Err(e) = self.notifier.send_verification_email(user, token).await {
                tracing::warn!(user_id = %user.id, error = %e, "Verification email failed");
            }
        }

        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let deleted = self.repo.delete(id).await?;
        if deleted {
            tracing::info!(user_id = %id, "User deleted");
        }
        Ok(deleted)
    }

    async fn list_users(&self, skip: u64, limit: u64) -> AppResult<Vec<User>> {
        self.repo.page(skip, limit.clamp(1, MAX_PAGE_SIZE)).await
    }

    async fn count_users(&self) -> AppResult<u64> {
        self.repo.count().await
    }

    async fn login_user(&self, email: &str, password: &str) -> AppResult<User> {
        let Some(user) = self.repo.find_by_email(&normalize_email(email)).await? else {
            Password::verify_dummy(password);
            return Err(AppError::InvalidCredentials);
        };

        if user.is_locked {
            tracing::info!(user_id = %user.id, "Login refused: account locked");
            return Err(AppError::AccountLocked);
        }

        if !user.email_verified {
            tracing::info!(user_id = %user.id, "Login refused: email not verified");
            return Err(AppError::EmailUnverified);
        }

        if !Password::from_hash(user.password_hash.as_str()).verify(password) {
            return Err(self.reject_bad_password(&user).await);
        }

        let Some(updated) = self.repo.record_successful_login(user.id, Utc::now()).await? else {
            return Err(AppError::InvalidCredentials);
        };
        // Locked by a concurrent attempt after the lookup
        if updated.is_locked {
            tracing::info!(user_id = %updated.id, "Login refused: account locked");
            return Err(AppError::AccountLocked);
        }

        tracing::info!(user_id = %updated.id, "User logged in");
        Ok(updated)
    }

    async fn is_account_locked(&self, email: &str) -> AppResult<bool> {
        Ok(self
            .repo
            .find_by_email(&normalize_email(email))
            .await?
            .map(|user| user.is_locked)
            .unwrap_or(false))
    }

    async fn reset_password(&self, id: Uuid, new_password: &str) -> AppResult<bool> {
        if let Err(e) = validate_password(new_password, &self.settings.password_policy) {
            tracing::info!(user_id = %id, fields = ?e.fields(), "Rejected weak replacement password");
            return Ok(false);
        }

        let changes = UserChanges {
            password_hash: Some(Password::new(new_password)?.into_string()),
            ..Default::default()
        };
        let Some(user) = self.repo.update_fields(id, changes).await? else {
            return Ok(false);
        };
        tracing::info!(user_id = %id, "Password reset");

        if let Err(e) = self.notifier.send_password_reset_confirmation(&user).await {
            tracing::warn!(user_id = %id, error = %e, "Password reset confirmation failed");
        }

        Ok(true)
    }

    async fn verify_email_with_token(&self, id: Uuid, token: &str) -> AppResult<bool> {
        let Some(user) = self.repo.find_by_id(id).await? else {
            return Ok(false);
        };

        let Some(stored) = user
            .verification_token
            .as_deref()
            .filter(|stored| VerificationToken::matches(token, stored))
        else {
            tracing::info!(user_id = %id, "Email verification token mismatch");
            return Ok(false);
        };

        // The write only lands if the token was not replaced since the read
        let verified = self.repo.confirm_email(id, stored).await?.is_some();
        if verified {
            tracing::info!(user_id = %id, "Email verified");
        } else {
            tracing::info!(user_id = %id, "Verification token replaced concurrently");
        }
        Ok(verified)
    }

    async fn unlock_user_account(&self, id: Uuid) -> AppResult<bool> {
        let unlocked = self
            .repo
            .update_fields(id, UserChanges::unlock())
            .await?
            .is_some();
        if unlocked {
            tracing::info!(user_id = %id, "Account unlocked");
        }
        Ok(unlocked)
    }
}
