//! Account Service Library
//!
//! User accounts: registration, credential checks, login lockout, email
//! verification and password reset, backed by a SeaORM store.

pub mod config;
pub mod infra;
pub mod notification;
pub mod repository;
pub mod service;

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::config::AccountServiceConfig;
use crate::infra::Database;
use crate::notification::LogNotifier;
use crate::repository::UserStore;
use crate::service::{AccountManager, AccountService};

/// Wire the account service on top of an open database.
pub fn build_service(db: &Database, config: &AccountServiceConfig) -> AccountManager {
    let repo = Arc::new(UserStore::new(db.get_connection()));
    let notifier = Arc::new(LogNotifier::new(config.account.server_base_url.clone()));
    AccountManager::new(repo, notifier, config.account.clone())
}

/// Run migrations (for CLI commands).
pub async fn run_migrations(action: MigrateAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = AccountServiceConfig::from_env();
    let db = Database::connect_without_migrations(&config.database).await?;

    match action {
        MigrateAction::Up => {
            db.run_migrations().await?;
            info!("Migrations applied successfully");
        }
        MigrateAction::Down => {
            db.rollback_migration().await?;
            info!("Rolled back last migration");
        }
        MigrateAction::Status => {
            let status = db.migration_status().await?;
            for (name, applied) in status {
                let marker = if applied { "[x]" } else { "[ ]" };
                println!("{} {}", marker, name);
            }
        }
        MigrateAction::Fresh => {
            db.fresh_migrations().await?;
            info!("Database reset and migrations applied");
        }
    }

    Ok(())
}

/// Migration action type.
#[derive(Debug, Clone, Copy)]
pub enum MigrateAction {
    Up,
    Down,
    Status,
    Fresh,
}

/// Administrative account commands (for CLI commands).
#[derive(Debug, Clone)]
pub enum AdminAction {
    List { skip: u64, limit: u64 },
    Count,
    Unlock { id: Uuid },
    Ping,
}

/// Run an administrative command against the configured database.
pub async fn run_admin(action: AdminAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = AccountServiceConfig::from_env();
    let db = Database::connect(&config.database).await?;

    if let AdminAction::Ping = action {
        db.ping().await?;
        println!("ok");
        return Ok(());
    }

    let service = build_service(&db, &config);
    match action {
        AdminAction::List { skip, limit } => {
            for user in service.list_users(skip, limit).await? {
                let state = if user.is_locked {
                    "locked"
                } else if user.email_verified {
                    "active"
                } else {
                    "unverified"
                };
                println!(
                    "{}  {:<24} {:<32} {:<13} {}",
                    user.id, user.nickname, user.email, user.role.as_str(), state
                );
            }
        }
        AdminAction::Count => {
            println!("{}", service.count_users().await?);
        }
        AdminAction::Unlock { id } => {
            if service.unlock_user_account(id).await? {
                println!("Unlocked {}", id);
            } else {
                println!("No user with id {}", id);
            }
        }
        AdminAction::Ping => {}
    }

    Ok(())
}
