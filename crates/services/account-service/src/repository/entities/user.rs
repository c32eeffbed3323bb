//! User database entity for SeaORM.

use sea_orm::entity::prelude::*;
use sea_orm::Set;

use domain::{Profile, User, UserRole};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub nickname: String,
    #[sea_orm(unique)]
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub profile_picture_url: Option<String>,
    pub email_verified: bool,
    pub verification_token: Option<String>,
    pub failed_login_attempts: i32,
    pub is_locked: bool,
    pub last_login_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Convert database model to domain entity
impl From<Model> for User {
    fn from(model: Model) -> Self {
        User {
            id: model.id,
            nickname: model.nickname,
            email: model.email,
            password_hash: model.password_hash,
            role: UserRole::from(model.role.as_str()),
            profile: Profile {
                first_name: model.first_name,
                last_name: model.last_name,
                bio: model.bio,
                profile_picture_url: model.profile_picture_url,
            },
            email_verified: model.email_verified,
            verification_token: model.verification_token,
            failed_login_attempts: model.failed_login_attempts,
            is_locked: model.is_locked,
            last_login_at: model.last_login_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Full insert of a new row
impl From<User> for ActiveModel {
    fn from(user: User) -> Self {
        ActiveModel {
            id: Set(user.id),
            nickname: Set(user.nickname),
            email: Set(user.email),
            password_hash: Set(user.password_hash),
            role: Set(user.role.to_string()),
            first_name: Set(user.profile.first_name),
            last_name: Set(user.profile.last_name),
            bio: Set(user.profile.bio),
            profile_picture_url: Set(user.profile.profile_picture_url),
            email_verified: Set(user.email_verified),
            verification_token: Set(user.verification_token),
            failed_login_attempts: Set(user.failed_login_attempts),
            is_locked: Set(user.is_locked),
            last_login_at: Set(user.last_login_at),
            created_at: Set(user.created_at),
            updated_at: Set(user.updated_at),
        }
    }
}
