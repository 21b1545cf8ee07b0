//! Local user model and the proxy-supplied identity extractor.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tower_sessions::Session;

use crate::AppState;

/// Header set by the reverse proxy after it has authenticated the caller.
pub const REMOTE_USER_HEADER: &str = "x-remote-user";

/// Session key holding the identity established at login.
pub const SESSION_USER_KEY: &str = "username";

/// Persisted local user row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub created_utc: DateTime<Utc>,
}

impl UserRecord {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Profile attributes synchronized from the directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Identity of the requesting user as established by the reverse proxy.
///
/// `username` is the identity as presented (possibly `DOMAIN\name`);
/// `local_name` is the local account name, the part after the last backslash.
#[derive(Debug, Clone)]
pub struct RemoteUser {
    pub username: String,
    pub local_name: String,
}

impl RemoteUser {
    pub fn new(username: impl Into<String>) -> Self {
        let username = username.into();
        let local_name = local_account_name(&username).to_string();
        Self {
            username,
            local_name,
        }
    }
}

/// Strips an NT-style domain prefix from a presented identity.
pub fn local_account_name(username: &str) -> &str {
    match username.rsplit_once('\\') {
        Some((_, name)) => name,
        None => username,
    }
}

#[async_trait]
impl FromRequestParts<AppState> for RemoteUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Proxy header wins; the session identity covers requests the proxy
        // did not annotate (e.g. after an explicit remote login). An empty
        // header counts as absent.
        let header_identity = parts
            .headers
            .get(REMOTE_USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let mut identity = if header_identity.is_empty() {
            let session = Session::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to extract session",
                    )
                        .into_response()
                })?;
            session
                .get::<String>(SESSION_USER_KEY)
                .await
                .unwrap_or(None)
                .unwrap_or_default()
        } else {
            header_identity
        };

        if identity.is_empty() {
            if let Some(fallback) = &state.config.dev_fallback_user {
                identity = fallback.clone();
            }
        }

        if identity.is_empty() {
            return Err(Redirect::to("/login").into_response());
        }

        Ok(RemoteUser::new(identity))
    }
}
