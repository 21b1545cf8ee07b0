use askama::Template;
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Redirect},
    Json,
};
use serde_json::json;
use service_core::error::AppError;
use tower_sessions::Session;

use crate::models::{local_account_name, REMOTE_USER_HEADER, SESSION_USER_KEY};
use crate::AppState;

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub app_name: String,
}

pub async fn login_page(State(state): State<AppState>) -> impl IntoResponse {
    LoginTemplate {
        app_name: state.config.app_name.clone(),
    }
}

/// Remote-login entry point behind the authenticating reverse proxy.
///
/// With an identity header: provision the local user row if missing, store
/// the identity in the session, and echo it back. Without one: echo whatever
/// identity the session currently holds (empty for anonymous callers).
pub async fn remote_login(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let identity = headers
        .get(REMOTE_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if identity.is_empty() {
        let current = session
            .get::<String>(SESSION_USER_KEY)
            .await
            .unwrap_or(None)
            .unwrap_or_default();
        return Ok(Json(json!({ "username": current })));
    }

    let local_name = local_account_name(&identity);
    if state.store.find_user(local_name).await?.is_none() {
        state.store.create_user(local_name).await?;
        tracing::info!(username = %local_name, "Provisioned local account at login");
    }

    session
        .insert(SESSION_USER_KEY, identity.clone())
        .await
        .map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Failed to store session identity: {}", e))
        })?;

    tracing::info!(username = %local_name, "User logged in");

    Ok(Json(json!({ "username": identity })))
}

pub async fn logout(session: Session) -> impl IntoResponse {
    session.clear().await;
    Redirect::to("/login")
}
