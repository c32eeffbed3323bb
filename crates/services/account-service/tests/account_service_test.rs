//! Account service integration tests against an in-memory SQLite store.

mod support;

use uuid::Uuid;

use account_service_lib::repository::UserRepository;
use account_service_lib::service::AccountService;
use common::{AccountSettings, AppError, LockoutNotice};
use domain::{NewUser, Password, User, UserChanges, UserRole, UserUpdate};
use support::{
    interleaving_service, setup, setup_with, Interleave, RecordingNotifier, TestContext,
    PASSWORD, REPLACEMENT_EMAIL, REPLACEMENT_TOKEN,
};

async fn registered(ctx: &TestContext, email: &str) -> User {
    ctx.service
        .register_user(NewUser::new(email, PASSWORD))
        .await
        .unwrap()
        .expect("registration accepted")
}

async fn verified(ctx: &TestContext, email: &str) -> User {
    let user = registered(ctx, email).await;
    let token = ctx.notifier.token_for(user.id).expect("verification email sent");
    assert!(ctx.service.verify_email_with_token(user.id, &token).await.unwrap());
    ctx.service.get_by_id(user.id).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_create_user_with_valid_data() {
    let ctx = setup().await;
    let payload = NewUser::new("valid_user@example.com", "ValidPassword123!")
        .with_nickname("valid_user")
        .with_role(UserRole::Admin);

    let user = ctx.service.create(payload).await.unwrap().unwrap();

    assert_eq!(user.email, "valid_user@example.com");
    assert_eq!(user.nickname, "valid_user");
    assert_eq!(user.role, UserRole::Admin);
    assert!(!user.email_verified);
    assert!(!user.is_locked);
    assert_eq!(user.failed_login_attempts, 0);
    assert!(user.verification_token.is_some());
    assert_eq!(ctx.notifier.token_for(user.id), user.verification_token);
}

#[tokio::test]
async fn test_create_user_with_invalid_data() {
    let ctx = setup().await;
    let payload = NewUser::new("invalidemail", "short").with_nickname("");

    assert!(ctx.service.create(payload).await.unwrap().is_none());
    assert_eq!(ctx.service.count_users().await.unwrap(), 0);
    assert_eq!(ctx.notifier.verification_count(), 0);
}

#[tokio::test]
async fn test_create_generates_nickname_and_canonical_email() {
    let ctx = setup().await;
    let user = ctx
        .service
        .create(NewUser::new("  Mixed.Case@Example.COM ", PASSWORD))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(user.email, "mixed.case@example.com");
    assert!(!user.nickname.is_empty());
    assert!(Password::from_hash(user.password_hash.as_str()).verify(PASSWORD));
    assert_ne!(user.password_hash, PASSWORD);
}

#[tokio::test]
async fn test_create_duplicate_email_is_rejected() {
    let ctx = setup().await;
    registered(&ctx, "dup@example.com").await;

    let again = ctx
        .service
        .create(NewUser::new("DUP@example.com", PASSWORD))
        .await
        .unwrap();

    assert!(again.is_none());
    assert_eq!(ctx.service.count_users().await.unwrap(), 1);
}

#[tokio::test]
async fn test_create_duplicate_nickname_is_rejected() {
    let ctx = setup().await;
    let first = NewUser::new("first@example.com", PASSWORD).with_nickname("taken_name");
    let second = NewUser::new("second@example.com", PASSWORD).with_nickname("taken_name");

    assert!(ctx.service.create(first).await.unwrap().is_some());
    assert!(ctx.service.create(second).await.unwrap().is_none());
}

#[tokio::test]
async fn test_register_user_uses_default_role() {
    let ctx = setup().await;
    let payload = NewUser::new("register_valid_user@example.com", "RegisterValid123!")
        .with_role(UserRole::Admin);

    let user = ctx.service.register_user(payload).await.unwrap().unwrap();

    assert_eq!(user.email, "register_valid_user@example.com");
    assert_eq!(user.role, UserRole::Anonymous);
}

#[tokio::test]
async fn test_register_user_with_invalid_data() {
    let ctx = setup().await;
    let result = ctx
        .service
        .register_user(NewUser::new("registerinvalidemail", "short"))
        .await
        .unwrap();

    assert!(result.is_none());
}

#[tokio::test]
async fn test_registration_survives_email_failure() {
    let ctx = setup_with(AccountSettings::default(), RecordingNotifier::failing()).await;

    let user = registered(&ctx, "nomail@example.com").await;

    assert!(ctx.service.get_by_id(user.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_lookups() {
    let ctx = setup().await;
    let user = registered(&ctx, "lookup@example.com").await;

    let by_id = ctx.service.get_by_id(user.id).await.unwrap().unwrap();
    let by_nickname = ctx.service.get_by_nickname(&user.nickname).await.unwrap().unwrap();
    let by_email = ctx.service.get_by_email("Lookup@Example.com").await.unwrap().unwrap();

    assert_eq!(by_id.id, user.id);
    assert_eq!(by_nickname.id, user.id);
    assert_eq!(by_email.id, user.id);

    assert!(ctx.service.get_by_id(Uuid::new_v4()).await.unwrap().is_none());
    assert!(ctx.service.get_by_nickname("non_existent_nickname").await.unwrap().is_none());
    assert!(ctx
        .service
        .get_by_email("non_existent_email@example.com")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_update_user_valid_data() {
    let ctx = setup().await;
    let user = verified(&ctx, "before@example.com").await;

    let updated = ctx
        .service
        .update(user.id, UserUpdate::email("updated_email@example.com"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.email, "updated_email@example.com");
    assert_eq!(updated.nickname, user.nickname);
    // A new address needs a fresh verification
    assert!(!updated.email_verified);
    assert_eq!(ctx.notifier.token_for(user.id), updated.verification_token);
}

#[tokio::test]
async fn test_update_profile_fields() {
    let ctx = setup().await;
    let user = registered(&ctx, "profile@example.com").await;
    let payload = UserUpdate {
        first_name: Some("Ada".into()),
        bio: Some("Writes programs".into()),
        ..Default::default()
    };

    let updated = ctx.service.update(user.id, payload).await.unwrap().unwrap();

    assert_eq!(updated.profile.first_name.as_deref(), Some("Ada"));
    assert_eq!(updated.profile.bio.as_deref(), Some("Writes programs"));
    assert_eq!(updated.email, user.email);
}

#[tokio::test]
async fn test_update_user_invalid_data() {
    let ctx = setup().await;
    let user = registered(&ctx, "keep@example.com").await;

    let result = ctx
        .service
        .update(user.id, UserUpdate::email("invalidemail"))
        .await
        .unwrap();

    assert!(result.is_none());
    let stored = ctx.service.get_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(stored.email, "keep@example.com");
}

#[tokio::test]
async fn test_update_missing_or_conflicting() {
    let ctx = setup().await;
    let first = registered(&ctx, "one@example.com").await;
    let second = registered(&ctx, "two@example.com").await;

    let missing = ctx
        .service
        .update(Uuid::new_v4(), UserUpdate::email("x@example.com"))
        .await
        .unwrap();
    let taken_email = ctx
        .service
        .update(second.id, UserUpdate::email("one@example.com"))
        .await
        .unwrap();
    let taken_nickname = ctx
        .service
        .update(second.id, UserUpdate::nickname(first.nickname.clone()))
        .await
        .unwrap();

    assert!(missing.is_none());
    assert!(taken_email.is_none());
    assert!(taken_nickname.is_none());
}

#[tokio::test]
async fn test_delete_user() {
    let ctx = setup().await;
    let user = registered(&ctx, "gone@example.com").await;

    assert!(ctx.service.delete(user.id).await.unwrap());
    assert!(!ctx.service.delete(user.id).await.unwrap());
    assert!(ctx.service.get_by_id(user.id).await.unwrap().is_none());
    assert!(!ctx.service.delete(Uuid::new_v4()).await.unwrap());
}

#[tokio::test]
async fn test_list_users_with_pagination() {
    let ctx = setup().await;
    let hash = Password::new(PASSWORD).unwrap().into_string();
    for i in 0..50 {
        let user = User::new(
            format!("user_{i:02}"),
            format!("user{i}@example.com"),
            hash.clone(),
            UserRole::Authenticated,
            "token".into(),
        );
        ctx.store.insert(user).await.unwrap();
    }

    let page_1 = ctx.service.list_users(0, 10).await.unwrap();
    let page_2 = ctx.service.list_users(10, 10).await.unwrap();
    let everything = ctx.service.list_users(0, 1_000).await.unwrap();

    assert_eq!(page_1.len(), 10);
    assert_eq!(page_2.len(), 10);
    assert!(page_1.iter().all(|a| page_2.iter().all(|b| a.id != b.id)));
    assert_eq!(everything.len(), 50);
    let first_ids: Vec<Uuid> = everything[..10].iter().map(|u| u.id).collect();
    let page_1_ids: Vec<Uuid> = page_1.iter().map(|u| u.id).collect();
    assert_eq!(first_ids, page_1_ids);
    assert!(ctx.service.list_users(50, 10).await.unwrap().is_empty());
    assert_eq!(ctx.service.count_users().await.unwrap(), 50);
}

#[tokio::test]
async fn test_login_user_successful() {
    let ctx = setup().await;
    let user = verified(&ctx, "login@example.com").await;

    let logged_in = ctx.service.login_user("login@example.com", PASSWORD).await.unwrap();

    assert_eq!(logged_in.id, user.id);
    assert_eq!(logged_in.failed_login_attempts, 0);
    assert!(logged_in.last_login_at.is_some());
}

#[tokio::test]
async fn test_login_user_incorrect_email() {
    let ctx = setup().await;

    let err = ctx
        .service
        .login_user("nonexistentuser@noway.com", "Password123!")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidCredentials));
    assert_eq!(err.status(), 401);
}

#[tokio::test]
async fn test_login_user_incorrect_password() {
    let ctx = setup().await;
    let user = verified(&ctx, "wrong@example.com").await;

    let err = ctx
        .service
        .login_user(&user.email, "IncorrectPassword!")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidCredentials));
    let stored = ctx.service.get_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(stored.failed_login_attempts, 1);
    assert!(!stored.is_locked);
}

#[tokio::test]
async fn test_login_unverified_email() {
    let ctx = setup().await;
    let user = registered(&ctx, "pending@example.com").await;

    let err = ctx.service.login_user(&user.email, PASSWORD).await.unwrap_err();

    assert!(matches!(err, AppError::EmailUnverified));
    assert_eq!(err.status(), 403);
}

#[tokio::test]
async fn test_successful_login_resets_counter() {
    let ctx = setup().await;
    let user = verified(&ctx, "reset-counter@example.com").await;

    for _ in 0..2 {
        let _ = ctx.service.login_user(&user.email, "nope").await;
    }
    let logged_in = ctx.service.login_user(&user.email, PASSWORD).await.unwrap();

    assert_eq!(logged_in.failed_login_attempts, 0);
    assert!(!logged_in.is_locked);
}

#[tokio::test]
async fn test_account_locks_on_triggering_attempt() {
    let ctx = setup().await;
    let user = verified(&ctx, "lock@example.com").await;

    for _ in 0..2 {
        let err = ctx.service.login_user(&user.email, "wrongpassword").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
    }
    let err = ctx.service.login_user(&user.email, "wrongpassword").await.unwrap_err();
    assert!(matches!(err, AppError::AccountLocked));
    assert_eq!(err.status(), 403);
    assert!(err.to_string().to_lowercase().contains("locked"));

    // Even the right password is refused now, and nothing more is counted
    let err = ctx.service.login_user(&user.email, PASSWORD).await.unwrap_err();
    assert!(matches!(err, AppError::AccountLocked));

    let stored = ctx.service.get_by_id(user.id).await.unwrap().unwrap();
    assert!(stored.is_locked);
    assert_eq!(stored.failed_login_attempts, 3);
    assert!(ctx.service.is_account_locked(&user.email).await.unwrap());
}

#[tokio::test]
async fn test_account_lock_reported_on_next_attempt() {
    let settings = AccountSettings::default()
        .with_max_login_attempts(3)
        .with_lockout_notice(LockoutNotice::NextAttempt);
    let ctx = setup_with(settings, RecordingNotifier::default()).await;
    let user = verified(&ctx, "next@example.com").await;

    for _ in 0..3 {
        let err = ctx.service.login_user(&user.email, "wrongpassword").await.unwrap_err();
        assert_eq!(err.status(), 401);
    }
    let err = ctx.service.login_user(&user.email, "wrongpassword").await.unwrap_err();

    assert!(matches!(err, AppError::AccountLocked));
    assert!(err.to_string().to_lowercase().contains("locked"));
}

#[tokio::test]
async fn test_unlock_user_account() {
    let ctx = setup().await;
    let user = verified(&ctx, "unlock@example.com").await;
    for _ in 0..3 {
        let _ = ctx.service.login_user(&user.email, "wrongpassword").await;
    }
    assert!(ctx.service.is_account_locked(&user.email).await.unwrap());

    assert!(ctx.service.unlock_user_account(user.id).await.unwrap());

    let refreshed = ctx.service.get_by_id(user.id).await.unwrap().unwrap();
    assert!(!refreshed.is_locked);
    assert_eq!(refreshed.failed_login_attempts, 0);
    let logged_in = ctx.service.login_user(&user.email, PASSWORD).await.unwrap();
    assert_eq!(logged_in.failed_login_attempts, 0);

    assert!(!ctx.service.unlock_user_account(Uuid::new_v4()).await.unwrap());
    assert!(!ctx.service.is_account_locked("nobody@example.com").await.unwrap());
}

#[tokio::test]
async fn test_reset_password() {
    let ctx = setup().await;
    let user = verified(&ctx, "newpass@example.com").await;
    let new_password = "NewPassword123!";

    assert!(ctx.service.reset_password(user.id, new_password).await.unwrap());

    assert!(ctx.service.login_user(&user.email, new_password).await.is_ok());
    let err = ctx.service.login_user(&user.email, PASSWORD).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));
    assert_eq!(ctx.notifier.reset_count(user.id), 1);
}

#[tokio::test]
async fn test_reset_password_rejections() {
    let ctx = setup().await;
    let user = registered(&ctx, "weak@example.com").await;

    assert!(!ctx.service.reset_password(user.id, "short").await.unwrap());
    assert!(!ctx.service.reset_password(Uuid::new_v4(), "NewPassword123!").await.unwrap());

    let stored = ctx.service.get_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(stored.password_hash, user.password_hash);
}

#[tokio::test]
async fn test_reset_password_keeps_lock() {
    let ctx = setup().await;
    let user = verified(&ctx, "stilllocked@example.com").await;
    for _ in 0..3 {
        let _ = ctx.service.login_user(&user.email, "wrongpassword").await;
    }

    assert!(ctx.service.reset_password(user.id, "NewPassword123!").await.unwrap());

    let err = ctx.service.login_user(&user.email, "NewPassword123!").await.unwrap_err();
    assert!(matches!(err, AppError::AccountLocked));
}

#[tokio::test]
async fn test_verify_email_with_token() {
    let ctx = setup().await;
    let user = registered(&ctx, "verify@example.com").await;
    let token = "valid_token_example";
    let changes = UserChanges {
        verification_token: Some(Some(token.to_string())),
        ..Default::default()
    };
    ctx.store.update_fields(user.id, changes).await.unwrap();

    assert!(ctx.service.verify_email_with_token(user.id, token).await.unwrap());

    let verified = ctx.service.get_by_id(user.id).await.unwrap().unwrap();
    assert!(verified.email_verified);
    assert!(verified.verification_token.is_none());
    assert_eq!(verified.role, UserRole::Authenticated);

    // Single use
    assert!(!ctx.service.verify_email_with_token(user.id, token).await.unwrap());
}

#[tokio::test]
async fn test_verify_email_rejects_bad_token() {
    let ctx = setup().await;
    let user = registered(&ctx, "badtoken@example.com").await;

    assert!(!ctx.service.verify_email_with_token(user.id, "not-the-token").await.unwrap());
    assert!(!ctx.service.verify_email_with_token(Uuid::new_v4(), "whatever").await.unwrap());

    let stored = ctx.service.get_by_id(user.id).await.unwrap().unwrap();
    assert!(!stored.email_verified);
}

#[tokio::test]
async fn test_verify_keeps_elevated_role() {
    let ctx = setup().await;
    let user = ctx
        .service
        .create(NewUser::new("manager@example.com", PASSWORD).with_role(UserRole::Manager))
        .await
        .unwrap()
        .unwrap();
    let token = ctx.notifier.token_for(user.id).unwrap();

    assert!(ctx.service.verify_email_with_token(user.id, &token).await.unwrap());

    let stored = ctx.service.get_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(stored.role, UserRole::Manager);
}

#[tokio::test]
async fn test_lock_landing_during_login_refuses_access() {
    let ctx = setup().await;
    let user = verified(&ctx, "racing@example.com").await;
    let service = interleaving_service(&ctx, Interleave::LockAfterEmailLookup);

    let err = service.login_user(&user.email, PASSWORD).await.unwrap_err();

    assert!(matches!(err, AppError::AccountLocked));
    let stored = ctx.service.get_by_id(user.id).await.unwrap().unwrap();
    assert!(stored.is_locked);
    // The competing failure is kept, not reset by the good password
    assert_eq!(stored.failed_login_attempts, 1);
    assert!(stored.last_login_at.is_none());
}

#[tokio::test]
async fn test_token_replaced_during_verification_is_rejected() {
    let ctx = setup().await;
    let user = registered(&ctx, "first-address@example.com").await;
    let old_token = ctx.notifier.token_for(user.id).unwrap();
    let service = interleaving_service(&ctx, Interleave::ReplaceTokenAfterIdLookup);

    assert!(!service.verify_email_with_token(user.id, &old_token).await.unwrap());

    let stored = ctx.service.get_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(stored.email, REPLACEMENT_EMAIL);
    assert!(!stored.email_verified);
    assert_eq!(stored.verification_token.as_deref(), Some(REPLACEMENT_TOKEN));
    assert_eq!(stored.role, UserRole::Anonymous);
}
