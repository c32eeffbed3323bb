//! Domain layer - Core account entities and value objects.
//!
//! This crate contains pure domain logic with no infrastructure dependencies:
//! the user entity, password hashing, verification tokens and payload validation.

pub mod constants;
pub mod error;
pub mod nickname;
pub mod password;
pub mod token;
pub mod user;
pub mod validation;

pub use constants::*;
pub use error::{DomainError, DomainResult, FieldViolation};
pub use nickname::generate_nickname;
pub use password::Password;
pub use token::VerificationToken;
pub use user::{NewUser, Profile, User, UserChanges, UserRole, UserUpdate};
pub use validation::{PasswordPolicy, ValidNewUser, ValidUserUpdate};
