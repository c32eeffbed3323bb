// Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use uuid::Uuid;

use account_service_lib::infra::Migrator;
use account_service_lib::notification::NotificationPort;
use account_service_lib::repository::{FailedLogin, UserRepository, UserStore};
use account_service_lib::service::AccountManager;
use common::{AccountSettings, AppError, AppResult};
use domain::{User, UserChanges};

pub const PASSWORD: &str = "MySuperPassword$1234";

/// Creates a test database with migrations applied
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

/// Notifier that keeps every email it was asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    verifications: Mutex<Vec<(Uuid, String)>>,
    resets: Mutex<Vec<Uuid>>,
    fail: bool,
}

impl RecordingNotifier {
    /// A notifier whose every send fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Most recent verification token sent to this user
    pub fn token_for(&self, id: Uuid) -> Option<String> {
        self.verifications
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(user_id, _)| *user_id == id)
            .map(|(_, token)| token.clone())
    }

    pub fn verification_count(&self) -> usize {
        self.verifications.lock().unwrap().len()
    }

    pub fn reset_count(&self, id: Uuid) -> usize {
        self.resets.lock().unwrap().iter().filter(|u| **u == id).count()
    }
}

#[async_trait]
impl NotificationPort for RecordingNotifier {
    async fn send_verification_email(&self, user: &User, token: &str) -> AppResult<()> {
        self.verifications
            .lock()
            .unwrap()
            .push((user.id, token.to_string()));
        if self.fail {
            return Err(AppError::notification("mail server unavailable"));
        }
        Ok(())
    }

    async fn send_password_reset_confirmation(&self, user: &User) -> AppResult<()> {
        self.resets.lock().unwrap().push(user.id);
        if self.fail {
            return Err(AppError::notification("mail server unavailable"));
        }
        Ok(())
    }
}

/// Everything a service-level test needs
pub struct TestContext {
    pub db: DatabaseConnection,
    pub store: Arc<UserStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub service: AccountManager,
}

pub async fn setup_with(settings: AccountSettings, notifier: RecordingNotifier) -> TestContext {
    let db = setup_test_db().await;
    let store = Arc::new(UserStore::new(db.clone()));
    let notifier = Arc::new(notifier);
    let service = AccountManager::new(store.clone(), notifier.clone(), settings);

    TestContext {
        db,
        store,
        notifier,
        service,
    }
}

/// Service with a small lockout limit so lockout tests stay quick
pub async fn setup() -> TestContext {
    setup_with(
        AccountSettings::default().with_max_login_attempts(3),
        RecordingNotifier::default(),
    )
    .await
}

/// A write from another request, slipped in right after a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interleave {
    /// Lock the account once it has been looked up by email
    LockAfterEmailLookup,
    /// Change the email and replace the token once the user has been looked up by id
    ReplaceTokenAfterIdLookup,
}

pub const REPLACEMENT_EMAIL: &str = "moved@example.com";
pub const REPLACEMENT_TOKEN: &str = "replacement-token";

/// Store that runs one competing write in the middle of a service call
pub struct InterleavingStore {
    inner: UserStore,
    interleave: Interleave,
    fired: AtomicBool,
}

impl InterleavingStore {
    pub fn new(db: DatabaseConnection, interleave: Interleave) -> Self {
        Self {
            inner: UserStore::new(db),
            interleave,
            fired: AtomicBool::new(false),
        }
    }

    fn fire(&self, wanted: Interleave) -> bool {
        self.interleave == wanted && !self.fired.swap(true, Ordering::SeqCst)
    }
}

#[async_trait]
impl UserRepository for InterleavingStore {
    async fn insert(&self, user: User) -> AppResult<User> {
        self.inner.insert(user).await
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let found = self.inner.find_by_id(id).await?;
        if found.is_some() && self.fire(Interleave::ReplaceTokenAfterIdLookup) {
            let changes = UserChanges {
                email: Some(REPLACEMENT_EMAIL.to_string()),
                email_verified: Some(false),
                verification_token: Some(Some(REPLACEMENT_TOKEN.to_string())),
                ..Default::default()
            };
            self.inner.update_fields(id, changes).await?;
        }
        Ok(found)
    }

    async fn find_by_nickname(&self, nickname: &str) -> AppResult<Option<User>> {
        self.inner.find_by_nickname(nickname).await
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let found = self.inner.find_by_email(email).await?;
        if let Some(user) = &found {
            if self.fire(Interleave::LockAfterEmailLookup) {
                self.inner.record_failed_login(user.id, 1).await?;
            }
        }
        Ok(found)
    }

    async fn update_fields(&self, id: Uuid, changes: UserChanges) -> AppResult<Option<User>> {
        self.inner.update_fields(id, changes).await
    }

    async fn record_failed_login(
        &self,
        id: Uuid,
        max_attempts: u32,
    ) -> AppResult<Option<FailedLogin>> {
        self.inner.record_failed_login(id, max_attempts).await
    }

    async fn record_successful_login(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<Option<User>> {
        self.inner.record_successful_login(id, at).await
    }

    async fn confirm_email(&self, id: Uuid, token: &str) -> AppResult<Option<User>> {
        self.inner.confirm_email(id, token).await
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        self.inner.delete(id).await
    }

    async fn page(&self, skip: u64, limit: u64) -> AppResult<Vec<User>> {
        self.inner.page(skip, limit).await
    }

    async fn count(&self) -> AppResult<u64> {
        self.inner.count().await
    }
}

/// Service over the same database whose store runs `interleave` once
pub fn interleaving_service(ctx: &TestContext, interleave: Interleave) -> AccountManager {
    AccountManager::new(
        Arc::new(InterleavingStore::new(ctx.db.clone(), interleave)),
        ctx.notifier.clone(),
        AccountSettings::default().with_max_login_attempts(3),
    )
}
