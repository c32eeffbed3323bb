//! Service layer - Account business logic.

mod account_service;

pub use account_service::{AccountManager, AccountService};
