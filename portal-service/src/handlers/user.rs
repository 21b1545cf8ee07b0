use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::models::RemoteUser;
use crate::services::{refresh_user_info, UserInfo};
use crate::AppState;

/// Runs the full refresh pipeline and returns the aggregated payload.
pub async fn user_auth(
    State(state): State<AppState>,
    user: RemoteUser,
) -> Result<Json<UserInfo>, AppError> {
    let info = refresh_user_info(
        state.store.as_ref(),
        state.directory.as_ref(),
        &state.config.apps,
        &user,
    )
    .await?;
    Ok(Json(info))
}

/// Returns the user's current local group names without touching the
/// directory. A known user with no memberships reads as `["anonymous"]`.
pub async fn user_groups(
    State(state): State<AppState>,
    user: RemoteUser,
) -> Result<Json<Vec<String>>, AppError> {
    if state.store.find_user(&user.local_name).await?.is_none() {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "no local account for {}",
            user.local_name
        )));
    }

    let mut groups = state.store.user_group_names(&user.local_name).await?;
    if groups.is_empty() {
        groups.push("anonymous".to_string());
    }
    Ok(Json(groups))
}
