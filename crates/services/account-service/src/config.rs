//! Account service configuration.

use std::env;

use common::{AccountSettings, DatabaseConfig, LockoutNotice};
use domain::{PasswordPolicy, UserRole};

/// Account service configuration.
#[derive(Debug, Clone, Default)]
pub struct AccountServiceConfig {
    pub database: DatabaseConfig,
    pub account: AccountSettings,
}

impl AccountServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup; unset or unparsable values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parse_bool = |key: &str, default: bool| {
            lookup(key)
                .and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
                    "1" | "true" | "yes" => Some(true),
                    "0" | "false" | "no" => Some(false),
                    _ => None,
                })
                .unwrap_or(default)
        };

        let database = DatabaseConfig {
            url: lookup("ACCOUNT_SERVICE_DATABASE_URL")
                .or_else(|| lookup("DATABASE_URL"))
                .unwrap_or(defaults.database.url),
            max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.database.max_connections),
            min_connections: lookup("DATABASE_MIN_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.database.min_connections),
        };

        let policy = defaults.account.password_policy;
        let password_policy = PasswordPolicy {
            min_length: lookup("PASSWORD_MIN_LENGTH")
                .and_then(|v| v.parse().ok())
                .unwrap_or(policy.min_length),
            require_uppercase: parse_bool("PASSWORD_REQUIRE_UPPERCASE", policy.require_uppercase),
            require_lowercase: parse_bool("PASSWORD_REQUIRE_LOWERCASE", policy.require_lowercase),
            require_digit: parse_bool("PASSWORD_REQUIRE_DIGIT", policy.require_digit),
            require_special: parse_bool("PASSWORD_REQUIRE_SPECIAL", policy.require_special),
        };

        let account = AccountSettings {
            max_login_attempts: lookup("MAX_LOGIN_ATTEMPTS")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(defaults.account.max_login_attempts)
                .max(1),
            password_policy,
            default_role: lookup("DEFAULT_ROLE")
                .and_then(|v| UserRole::parse(&v))
                .unwrap_or(defaults.account.default_role),
            lockout_notice: lookup("LOCKOUT_NOTICE")
                .and_then(|v| LockoutNotice::parse(&v))
                .unwrap_or(defaults.account.lockout_notice),
            server_base_url: lookup("SERVER_BASE_URL").unwrap_or(defaults.account.server_base_url),
        };

        Self { database, account }
    }
}
