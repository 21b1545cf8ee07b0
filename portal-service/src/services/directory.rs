//! Directory provider abstraction over the corporate LDAP/AD directory.

use crate::models::UserProfile;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Directory unavailable: {0}")]
    Unavailable(String),

    #[error("User '{0}' not found in directory")]
    UserNotFound(String),
}

impl From<DirectoryError> for AppError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Unavailable(msg) => AppError::BadGateway(msg),
            DirectoryError::UserNotFound(user) => {
                AppError::NotFound(anyhow::anyhow!("User '{}' not found in directory", user))
            }
        }
    }
}

/// A user's directory record: live group memberships plus profile attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub groups: Vec<String>,
    pub profile: UserProfile,
}

impl DirectoryUser {
    pub fn new(groups: Vec<String>) -> Self {
        Self {
            groups,
            profile: UserProfile::default(),
        }
    }

    pub fn with_profile(mut self, profile: UserProfile) -> Self {
        self.profile = profile;
        self
    }
}

/// Source of directory truth for group membership and profile attributes.
///
/// Every call performs a fresh query: no caching, no retry.
#[async_trait]
pub trait DirectoryProvider: Send + Sync {
    async fn lookup_user(&self, username: &str) -> Result<DirectoryUser, DirectoryError>;
    async fn health_check(&self) -> Result<(), DirectoryError>;
    fn is_enabled(&self) -> bool;
}

/// Fixed-table directory for tests and directory-less deployments.
///
/// Strict mode answers only for registered users; permissive mode answers
/// every lookup with an empty record so a portal without a directory still
/// serves pages.
pub struct StaticDirectory {
    users: RwLock<HashMap<String, DirectoryUser>>,
    permissive: bool,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            permissive: false,
        }
    }

    pub fn permissive() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            permissive: true,
        }
    }

    pub fn with_user(self, username: impl Into<String>, user: DirectoryUser) -> Self {
        self.set_user(username, user);
        self
    }

    /// Registers or replaces a user's directory record.
    pub fn set_user(&self, username: impl Into<String>, user: DirectoryUser) {
        match self.users.write() {
            Ok(mut users) => {
                users.insert(username.into(), user);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(username.into(), user);
            }
        }
    }
}

impl Default for StaticDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectoryProvider for StaticDirectory {
    async fn lookup_user(&self, username: &str) -> Result<DirectoryUser, DirectoryError> {
        let users = match self.users.read() {
            Ok(users) => users,
            Err(poisoned) => poisoned.into_inner(),
        };
        match users.get(username) {
            Some(user) => Ok(user.clone()),
            None if self.permissive => Ok(DirectoryUser::default()),
            None => Err(DirectoryError::UserNotFound(username.to_string())),
        }
    }

    async fn health_check(&self) -> Result<(), DirectoryError> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        true
    }
}
