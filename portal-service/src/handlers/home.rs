use askama::Template;
use axum::{extract::State, http::header, response::IntoResponse};
use service_core::error::AppError;
use std::path::Path;

use crate::models::RemoteUser;
use crate::services::refresh_user_info;
use crate::AppState;

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub app_name: String,
    pub server_url: String,
    pub username: String,
    pub groups: Vec<String>,
    pub apps: Vec<String>,
}

/// Landing page: runs the full refresh pipeline and renders what the user
/// may access. Proxies cache aggressively, so the page opts out.
pub async fn home(
    State(state): State<AppState>,
    user: RemoteUser,
) -> Result<impl IntoResponse, AppError> {
    let info = refresh_user_info(
        state.store.as_ref(),
        state.directory.as_ref(),
        &state.config.apps,
        &user,
    )
    .await?;

    ensure_media_dir(&state.config.media_root, &user.local_name).await;

    let template = HomeTemplate {
        app_name: state.config.app_name.clone(),
        server_url: state.config.server_url.clone(),
        username: info.local_name.clone(),
        groups: info.groups,
        apps: info.apps,
    };

    Ok(([(header::CACHE_CONTROL, "no-cache")], template))
}

/// Every user gets a personal media folder on first visit. A failure here
/// never blocks the page.
async fn ensure_media_dir(media_root: &str, local_name: &str) {
    let dir = Path::new(media_root).join(local_name);
    if let Err(e) = tokio::fs::create_dir_all(&dir).await {
        tracing::warn!(error = %e, dir = %dir.display(), "Failed to create media directory");
    }
}
