use uuid::Uuid;

use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::{UserRole, UserStatus};
use crate::repositories;

/// Makes sure the configured first admin account exists, is active, has the
/// admin role and the configured password.
pub(crate) async fn ensure_first_admin(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.first_admin_password.is_empty() {
        tracing::warn!("FIRST_ADMIN_PASSWORD not configured; skipping admin creation");
        return Ok(());
    }

    let username = &admin.first_admin_username;
    let now = primitive_now_utc();

    if let Some(user) = repositories::users::find_by_username(state.db(), username).await? {
        let password_ok =
            security::verify_password(&admin.first_admin_password, &user.hashed_password)
                .unwrap_or(false);

        if !password_ok {
            let hashed_password = security::hash_password(&admin.first_admin_password)?;
            repositories::users::update_profile(
                state.db(),
                &user.id,
                repositories::users::UpdateProfile {
                    display_name: None,
                    email: None,
                    hashed_password: Some(hashed_password),
                    updated_at: now,
                },
            )
            .await?;
        }

        let access_ok = user.role == UserRole::Admin && user.status == UserStatus::Active;
        if !access_ok {
            repositories::users::update_access(
                state.db(),
                &user.id,
                Some(UserRole::Admin),
                Some(UserStatus::Active),
                now,
            )
            .await?;
        }

        if password_ok && access_ok {
            tracing::info!("First admin already up to date");
        } else {
            tracing::info!(username = %username, "Updated first admin");
        }
        return Ok(());
    }

    let hashed_password = security::hash_password(&admin.first_admin_password)?;
    repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            username,
            email: None,
            hashed_password,
            display_name: "Administrator",
            role: UserRole::Admin,
            created_at: now,
        },
    )
    .await?;

    tracing::info!(username = %username, "Created first admin");
    Ok(())
}
