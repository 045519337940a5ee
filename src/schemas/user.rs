use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{User, UserStats};
use crate::db::types::{UserRole, UserStatus};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct RegisterRequest {
    pub(crate) username: String,
    pub(crate) password: String,
    #[serde(default)]
    #[validate(email(message = "email is not valid"))]
    pub(crate) email: Option<String>,
    #[serde(default)]
    #[serde(alias = "displayName")]
    #[validate(length(max = 64, message = "display_name is too long"))]
    pub(crate) display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    pub(crate) username: String,
    pub(crate) password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ProfileUpdate {
    #[serde(default)]
    #[serde(alias = "displayName")]
    #[validate(length(min = 1, max = 64, message = "display_name must be 1-64 characters"))]
    pub(crate) display_name: Option<String>,
    #[serde(default)]
    #[validate(email(message = "email is not valid"))]
    pub(crate) email: Option<String>,
    #[serde(default)]
    #[serde(alias = "currentPassword")]
    pub(crate) current_password: Option<String>,
    #[serde(default)]
    #[serde(alias = "newPassword")]
    pub(crate) new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AdminUserUpdate {
    #[serde(default)]
    pub(crate) role: Option<UserRole>,
    #[serde(default)]
    pub(crate) status: Option<UserStatus>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserListQuery {
    #[serde(default)]
    pub(crate) role: Option<UserRole>,
    #[serde(default)]
    pub(crate) status: Option<UserStatus>,
    #[serde(default)]
    pub(crate) search: Option<String>,
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    pub(crate) limit: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) email: Option<String>,
    pub(crate) display_name: String,
    pub(crate) role: UserRole,
    pub(crate) status: UserStatus,
    pub(crate) stats: UserStats,
    pub(crate) last_login_at: Option<String>,
    pub(crate) created_at: String,
}

impl UserResponse {
    pub(crate) fn from_db(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            display_name: user.display_name,
            role: user.role,
            status: user.status,
            stats: user.stats.0,
            last_login_at: user.last_login_at.map(format_primitive),
            created_at: format_primitive(user.created_at),
        }
    }
}
