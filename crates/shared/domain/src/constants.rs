//! Domain-level constants.
//!
//! These constants define business rules and validation requirements.

// =============================================================================
// User Roles
// =============================================================================

/// Unverified self-registered account
pub const ROLE_ANONYMOUS: &str = "anonymous";

/// Account whose email address has been verified
pub const ROLE_AUTHENTICATED: &str = "authenticated";

/// Staff role that can manage other accounts
pub const ROLE_MANAGER: &str = "manager";

/// Administrator role with elevated privileges
pub const ROLE_ADMIN: &str = "admin";

// =============================================================================
// Validation
// =============================================================================

/// Minimum password length requirement
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Nickname length bounds
pub const MIN_NICKNAME_LENGTH: usize = 3;
pub const MAX_NICKNAME_LENGTH: usize = 50;

// =============================================================================
// Authentication
// =============================================================================

/// Default number of failed logins before an account locks
pub const DEFAULT_MAX_LOGIN_ATTEMPTS: u32 = 5;

/// Length of issued verification tokens
pub const VERIFICATION_TOKEN_LENGTH: usize = 32;

// =============================================================================
// Pagination
// =============================================================================

/// Largest page `list_users` will return; smaller limits are raised to 1
pub const MAX_PAGE_SIZE: u64 = 100;
