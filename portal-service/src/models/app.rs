//! Application models: the persisted record and the ephemeral descriptor.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Persisted application row with its associated group names.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AppRecord {
    pub name: String,
    pub path: Option<String>,
    pub public: bool,
    pub groups: Vec<String>,
}

impl AppRecord {
    /// True when the app is visible to a user holding any of `group_names`.
    pub fn visible_to(&self, group_names: &[String]) -> bool {
        self.public || self.groups.iter().any(|g| group_names.contains(g))
    }
}

/// One configured application: name, optional deployment path, and the
/// group names permitted to see it. Rebuilt from configuration on every
/// handled request; never persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Validate, Serialize, Deserialize)]
pub struct AppDescriptor {
    #[validate(length(min = 1, message = "app name must not be empty"))]
    pub name: String,
    pub path: Option<String>,
    #[validate(length(min = 1, message = "app must list at least one group"))]
    pub groups: Vec<String>,
}

impl AppDescriptor {
    pub fn new(name: impl Into<String>, groups: &[&str]) -> Self {
        Self {
            name: name.into(),
            path: None,
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}
