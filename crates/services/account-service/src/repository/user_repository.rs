//! User repository: the account store port and its SeaORM implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use super::entities::user::{self, ActiveModel, Entity as UserEntity};
use common::{AppError, AppResult};
use domain::{User, UserChanges, ROLE_ANONYMOUS, ROLE_AUTHENTICATED};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Result of recording one failed login.
#[derive(Debug, Clone)]
pub struct FailedLogin {
    /// Row state after the update
    pub user: User,
    /// False when the account was already locked and nothing was written
    pub counted: bool,
}

impl FailedLogin {
    /// This very attempt moved the account into the locked state.
    pub fn locked_now(&self) -> bool {
        self.counted && self.user.is_locked
    }
}

/// User repository trait for dependency injection.
///
/// Email and nickname uniqueness is enforced by the store; writes that would
/// break it fail with `AppError::Conflict`.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persist a new user row
    async fn insert(&self, user: User) -> AppResult<User>;

    /// Find user by ID
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Find user by nickname (exact match)
    async fn find_by_nickname(&self, nickname: &str) -> AppResult<Option<User>>;

    /// Find user by canonical (lower-cased) email
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Write the given columns in one update. `None` if the id does not exist.
    async fn update_fields(&self, id: Uuid, changes: UserChanges) -> AppResult<Option<User>>;

    /// Atomically increment the failed-login counter, locking the account in the
    /// same statement once it reaches `max_attempts`. Locked rows are left alone.
    async fn record_failed_login(&self, id: Uuid, max_attempts: u32)
        -> AppResult<Option<FailedLogin>>;

    /// Reset the counter and stamp `last_login_at`, unless the row is locked.
    /// Returns the row as stored afterwards; a locked row comes back unchanged.
    async fn record_successful_login(&self, id: Uuid, at: DateTime<Utc>)
        -> AppResult<Option<User>>;

    /// Mark the email verified and clear the token, only while the stored token
    /// still equals `token`. Anonymous users become authenticated.
    /// `None` if the token no longer matches or the id does not exist.
    async fn confirm_email(&self, id: Uuid, token: &str) -> AppResult<Option<User>>;

    /// Permanently delete user. `false` if nothing was deleted.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;

    /// Page of users ordered by creation time, then id
    async fn page(&self, skip: u64, limit: u64) -> AppResult<Vec<User>>;

    /// Total number of users
    async fn count(&self) -> AppResult<u64>;
}

/// Concrete implementation of UserRepository on SeaORM
pub struct UserStore {
    db: DatabaseConnection,
}

impl UserStore {
    /// Create new repository instance
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Unique-constraint violations surface as conflicts, everything else as database errors.
fn write_error(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            tracing::debug!(%detail, "Unique constraint violated");
            AppError::conflict("User")
        }
        _ => AppError::Database(err),
    }
}

fn to_active_changes(model: user::Model, changes: UserChanges) -> ActiveModel {
    let mut active: ActiveModel = model.into();

    if let Some(nickname) = changes.nickname {
        active.nickname = Set(nickname);
    }
    if let Some(email) = changes.email {
        active.email = Set(email);
    }
    if let Some(hash) = changes.password_hash {
        active.password_hash = Set(hash);
    }
    if let Some(role) = changes.role {
        active.role = Set(role.to_string());
    }
    if let Some(first_name) = changes.first_name {
        active.first_name = Set(Some(first_name));
    }
    if let Some(last_name) = changes.last_name {
        active.last_name = Set(Some(last_name));
    }
    if let Some(bio) = changes.bio {
        active.bio = Set(Some(bio));
    }
    if let Some(url) = changes.profile_picture_url {
        active.profile_picture_url = Set(Some(url));
    }
    if let Some(verified) = changes.email_verified {
        active.email_verified = Set(verified);
    }
    if let Some(token) = changes.verification_token {
        active.verification_token = Set(token);
    }
    if let Some(attempts) = changes.failed_login_attempts {
        active.failed_login_attempts = Set(attempts);
    }
    if let Some(locked) = changes.is_locked {
        active.is_locked = Set(locked);
    }
    if let Some(at) = changes.last_login_at {
        active.last_login_at = Set(Some(at));
    }
    active.updated_at = Set(Utc::now());

    active
}

#[async_trait]
impl UserRepository for UserStore {
    async fn insert(&self, user: User) -> AppResult<User> {
        let now = Utc::now();
        let mut active = ActiveModel::from(user);
        active.created_at = Set(now);
        active.updated_at = Set(now);

        let model = active.insert(&self.db).await.map_err(write_error)?;
        Ok(User::from(model))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let result = UserEntity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(result.map(User::from))
    }

    async fn find_by_nickname(&self, nickname: &str) -> AppResult<Option<User>> {
        let result = UserEntity::find()
            .filter(user::Column::Nickname.eq(nickname))
            .one(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(result.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let result = UserEntity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(result.map(User::from))
    }

    async fn update_fields(&self, id: Uuid, changes: UserChanges) -> AppResult<Option<User>> {
        let Some(model) = UserEntity::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };

        if changes.is_empty() {
            return Ok(Some(User::from(model)));
        }

        let model = to_active_changes(model, changes)
            .update(&self.db)
            .await
            .map_err(write_error)?;
        Ok(Some(User::from(model)))
    }

    async fn record_failed_login(
        &self,
        id: Uuid,
        max_attempts: u32,
    ) -> AppResult<Option<FailedLogin>> {
        let max_attempts = i32::try_from(max_attempts.max(1)).unwrap_or(i32::MAX);
        let txn = self.db.begin().await?;

        // Both SET expressions read the pre-update counter.
        let result = UserEntity::update_many()
            .col_expr(
                user::Column::FailedLoginAttempts,
                Expr::col(user::Column::FailedLoginAttempts).add(1),
            )
            .col_expr(
                user::Column::IsLocked,
                Expr::expr(Expr::col(user::Column::FailedLoginAttempts).add(1)).gte(max_attempts),
            )
            .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(user::Column::Id.eq(id))
            .filter(user::Column::IsLocked.eq(false))
            .exec(&txn)
            .await?;

        let model = UserEntity::find_by_id(id).one(&txn).await?;
        txn.commit().await?;

        Ok(model.map(|m| FailedLogin {
            user: User::from(m),
            counted: result.rows_affected > 0,
        }))
    }

    async fn record_successful_login(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<Option<User>> {
        let txn = self.db.begin().await?;

        UserEntity::update_many()
            .col_expr(user::Column::FailedLoginAttempts, Expr::value(0i32))
            .col_expr(user::Column::LastLoginAt, Expr::value(at))
            .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(user::Column::Id.eq(id))
            .filter(user::Column::IsLocked.eq(false))
            .exec(&txn)
            .await?;

        let model = UserEntity::find_by_id(id).one(&txn).await?;
        txn.commit().await?;

        Ok(model.map(User::from))
    }

    async fn confirm_email(&self, id: Uuid, token: &str) -> AppResult<Option<User>> {
        let txn = self.db.begin().await?;

        let promoted_role = Expr::case(
            Expr::col(user::Column::Role).eq(ROLE_ANONYMOUS),
            Expr::value(ROLE_AUTHENTICATED),
        )
        .finally(Expr::col(user::Column::Role));

        let result = UserEntity::update_many()
            .col_expr(user::Column::EmailVerified, Expr::value(true))
            .col_expr(user::Column::VerificationToken, Expr::value(Option::<String>::None))
            .col_expr(user::Column::Role, promoted_role.into())
            .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(user::Column::Id.eq(id))
            .filter(user::Column::VerificationToken.eq(token))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(None);
        }

        let model = UserEntity::find_by_id(id).one(&txn).await?;
        txn.commit().await?;

        Ok(model.map(User::from))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = UserEntity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(result.rows_affected > 0)
    }

    async fn page(&self, skip: u64, limit: u64) -> AppResult<Vec<User>> {
        let models = UserEntity::find()
            .order_by_asc(user::Column::CreatedAt)
            .order_by_asc(user::Column::Id)
            .offset(skip)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(models.into_iter().map(User::from).collect())
    }

    async fn count(&self) -> AppResult<u64> {
        UserEntity::find()
            .count(&self.db)
            .await
            .map_err(AppError::from)
    }
}
