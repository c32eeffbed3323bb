//! Account Service - administrative CLI for the account store.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use account_service_lib::{AdminAction, MigrateAction};

#[derive(Parser)]
#[command(name = "account-service")]
#[command(about = "User account management service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database migration commands
    Migrate {
        #[command(subcommand)]
        action: MigrateCommands,
    },
    /// List users page by page
    List {
        #[arg(long, default_value = "0")]
        skip: u64,
        #[arg(long, default_value = "10")]
        limit: u64,
    },
    /// Clear the lock and failed-login counter of an account
    Unlock { id: Uuid },
    /// Print the number of users
    Count,
    /// Check database connectivity
    Ping,
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Run pending migrations
    Up,
    /// Rollback last migration
    Down,
    /// Show migration status
    Status,
    /// Reset database and run all migrations
    Fresh,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate { action } => {
            let migrate_action = match action {
                MigrateCommands::Up => MigrateAction::Up,
                MigrateCommands::Down => MigrateAction::Down,
                MigrateCommands::Status => MigrateAction::Status,
                MigrateCommands::Fresh => MigrateAction::Fresh,
            };
            account_service_lib::run_migrations(migrate_action).await?;
        }
        Commands::List { skip, limit } => {
            account_service_lib::run_admin(AdminAction::List { skip, limit }).await?;
        }
        Commands::Unlock { id } => {
            account_service_lib::run_admin(AdminAction::Unlock { id }).await?;
        }
        Commands::Count => account_service_lib::run_admin(AdminAction::Count).await?,
        Commands::Ping => account_service_lib::run_admin(AdminAction::Ping).await?,
    }

    Ok(())
}
