//! Common utilities shared across the account workspace.
//!
//! This crate provides:
//! - The unified error taxonomy and its status-code mapping
//! - Configuration structures injected into services

pub mod config;
pub mod error;

pub use config::*;
pub use error::{AppError, AppResult};
