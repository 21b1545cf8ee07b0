//! Persisted portal state behind a swappable store trait.
//!
//! `PostgresStore` (services/database.rs) is the production implementation;
//! `InMemoryStore` backs tests and store-less deployments.

use crate::models::{AppRecord, GroupRecord, UserProfile, UserRecord};
use async_trait::async_trait;
use chrono::Utc;
use service_core::error::AppError;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Store of users, groups, apps, and the two association sets.
///
/// Association operations have set semantics: adding an existing pair or
/// removing an absent one succeeds without effect, and a missing counterpart
/// row makes the operation a no-op rather than an error.
#[async_trait]
pub trait PortalStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, AppError>;
    async fn create_user(&self, username: &str) -> Result<UserRecord, AppError>;
    async fn update_user_profile(
        &self,
        username: &str,
        profile: &UserProfile,
    ) -> Result<(), AppError>;

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, AppError>;
    async fn create_group(&self, name: &str) -> Result<GroupRecord, AppError>;
    async fn delete_group(&self, name: &str) -> Result<(), AppError>;

    async fn list_apps(&self) -> Result<Vec<AppRecord>, AppError>;
    async fn create_app(
        &self,
        name: &str,
        path: Option<&str>,
        public: bool,
    ) -> Result<AppRecord, AppError>;
    async fn update_app(&self, name: &str, path: Option<&str>, public: bool)
        -> Result<(), AppError>;
    async fn delete_app(&self, name: &str) -> Result<(), AppError>;
    async fn attach_app_group(&self, app: &str, group: &str) -> Result<(), AppError>;
    async fn detach_app_group(&self, app: &str, group: &str) -> Result<(), AppError>;

    async fn user_group_names(&self, username: &str) -> Result<Vec<String>, AppError>;
    async fn add_user_group(&self, username: &str, group: &str) -> Result<(), AppError>;
    async fn remove_user_group(&self, username: &str, group: &str) -> Result<(), AppError>;
}

#[derive(Debug, Clone)]
struct StoredApp {
    path: Option<String>,
    public: bool,
}

#[derive(Default)]
struct Inner {
    users: HashMap<String, UserRecord>,
    groups: BTreeMap<String, GroupRecord>,
    apps: BTreeMap<String, StoredApp>,
    app_groups: BTreeMap<String, BTreeSet<String>>,
    memberships: HashMap<String, BTreeSet<String>>,
}

/// In-memory store used by tests and deployments without a database.
///
/// Counts state-changing writes so tests can assert that re-running a
/// reconcile leaves the store untouched.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    mutations: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of writes that actually changed state.
    pub fn mutations(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }

    fn record_mutation(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl PortalStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, AppError> {
        Ok(self.lock().users.get(username).cloned())
    }

    async fn create_user(&self, username: &str) -> Result<UserRecord, AppError> {
        let mut inner = self.lock();
        if inner.users.contains_key(username) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "User '{}' already exists",
                username
            )));
        }
        let record = UserRecord {
            username: username.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            created_utc: Utc::now(),
        };
        inner.users.insert(username.to_string(), record.clone());
        self.record_mutation();
        Ok(record)
    }

    async fn update_user_profile(
        &self,
        username: &str,
        profile: &UserProfile,
    ) -> Result<(), AppError> {
        let mut inner = self.lock();
        if let Some(user) = inner.users.get_mut(username) {
            let changed = user.first_name != profile.first_name
                || user.last_name != profile.last_name
                || user.email != profile.email;
            if changed {
                user.first_name = profile.first_name.clone();
                user.last_name = profile.last_name.clone();
                user.email = profile.email.clone();
                self.record_mutation();
            }
        }
        Ok(())
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, AppError> {
        Ok(self.lock().groups.values().cloned().collect())
    }

    async fn create_group(&self, name: &str) -> Result<GroupRecord, AppError> {
        let mut inner = self.lock();
        if inner.groups.contains_key(name) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Group '{}' already exists",
                name
            )));
        }
        let record = GroupRecord {
            name: name.to_string(),
            created_utc: Utc::now(),
        };
        inner.groups.insert(name.to_string(), record.clone());
        self.record_mutation();
        Ok(record)
    }

    async fn delete_group(&self, name: &str) -> Result<(), AppError> {
        let mut inner = self.lock();
        if inner.groups.remove(name).is_none() {
            return Ok(());
        }
        // Cascade: drop the group from every association set.
        for groups in inner.app_groups.values_mut() {
            groups.remove(name);
        }
        for groups in inner.memberships.values_mut() {
            groups.remove(name);
        }
        self.record_mutation();
        Ok(())
    }

    async fn list_apps(&self) -> Result<Vec<AppRecord>, AppError> {
        let inner = self.lock();
        Ok(inner
            .apps
            .iter()
            .map(|(name, app)| AppRecord {
                name: name.clone(),
                path: app.path.clone(),
                public: app.public,
                groups: inner
                    .app_groups
                    .get(name)
                    .map(|g| g.iter().cloned().collect())
                    .unwrap_or_default(),
            })
            .collect())
    }

    async fn create_app(
        &self,
        name: &str,
        path: Option<&str>,
        public: bool,
    ) -> Result<AppRecord, AppError> {
        let mut inner = self.lock();
        if inner.apps.contains_key(name) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "App '{}' already exists",
                name
            )));
        }
        inner.apps.insert(
            name.to_string(),
            StoredApp {
                path: path.map(str::to_string),
                public,
            },
        );
        self.record_mutation();
        Ok(AppRecord {
            name: name.to_string(),
            path: path.map(str::to_string),
            public,
            groups: Vec::new(),
        })
    }

    async fn update_app(
        &self,
        name: &str,
        path: Option<&str>,
        public: bool,
    ) -> Result<(), AppError> {
        let mut inner = self.lock();
        if let Some(app) = inner.apps.get_mut(name) {
            let changed = app.path.as_deref() != path || app.public != public;
            if changed {
                app.path = path.map(str::to_string);
                app.public = public;
                self.record_mutation();
            }
        }
        Ok(())
    }

    async fn delete_app(&self, name: &str) -> Result<(), AppError> {
        let mut inner = self.lock();
        if inner.apps.remove(name).is_none() {
            return Ok(());
        }
        inner.app_groups.remove(name);
        self.record_mutation();
        Ok(())
    }

    async fn attach_app_group(&self, app: &str, group: &str) -> Result<(), AppError> {
        let mut inner = self.lock();
        if !inner.apps.contains_key(app) || !inner.groups.contains_key(group) {
            return Ok(());
        }
        if inner
            .app_groups
            .entry(app.to_string())
            .or_default()
            .insert(group.to_string())
        {
            self.record_mutation();
        }
        Ok(())
    }

    async fn detach_app_group(&self, app: &str, group: &str) -> Result<(), AppError> {
        let mut inner = self.lock();
        if let Some(groups) = inner.app_groups.get_mut(app) {
            if groups.remove(group) {
                self.record_mutation();
            }
        }
        Ok(())
    }

    async fn user_group_names(&self, username: &str) -> Result<Vec<String>, AppError> {
        Ok(self
            .lock()
            .memberships
            .get(username)
            .map(|g| g.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn add_user_group(&self, username: &str, group: &str) -> Result<(), AppError> {
        let mut inner = self.lock();
        if !inner.users.contains_key(username) || !inner.groups.contains_key(group) {
            return Ok(());
        }
        if inner
            .memberships
            .entry(username.to_string())
            .or_default()
            .insert(group.to_string())
        {
            self.record_mutation();
        }
        Ok(())
    }

    async fn remove_user_group(&self, username: &str, group: &str) -> Result<(), AppError> {
        let mut inner = self.lock();
        if let Some(groups) = inner.memberships.get_mut(username) {
            if groups.remove(group) {
                self.record_mutation();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deleting_a_group_cascades_to_associations() {
        let store = InMemoryStore::new();
        store.create_user("jdoe").await.unwrap();
        store.create_group("GIS").await.unwrap();
        store.create_app("viewer", None, false).await.unwrap();
        store.attach_app_group("viewer", "GIS").await.unwrap();
        store.add_user_group("jdoe", "GIS").await.unwrap();

        store.delete_group("GIS").await.unwrap();

        assert!(store.user_group_names("jdoe").await.unwrap().is_empty());
        let apps = store.list_apps().await.unwrap();
        assert!(apps[0].groups.is_empty());
    }

    #[tokio::test]
    async fn duplicate_group_creation_conflicts() {
        let store = InMemoryStore::new();
        store.create_group("GIS").await.unwrap();
        let err = store.create_group("GIS").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn unchanged_writes_do_not_count_as_mutations() {
        let store = InMemoryStore::new();
        store.create_user("jdoe").await.unwrap();
        store.create_group("GIS").await.unwrap();
        store.create_app("viewer", Some("/srv/viewer"), false).await.unwrap();
        store.add_user_group("jdoe", "GIS").await.unwrap();
        let before = store.mutations();

        store.add_user_group("jdoe", "GIS").await.unwrap();
        store.update_app("viewer", Some("/srv/viewer"), false).await.unwrap();
        store
            .update_user_profile("jdoe", &UserProfile::default())
            .await
            .unwrap();
        store.remove_user_group("jdoe", "Planning").await.unwrap();

        assert_eq!(store.mutations(), before);
    }

    #[tokio::test]
    async fn association_writes_ignore_missing_rows() {
        let store = InMemoryStore::new();
        store.create_user("jdoe").await.unwrap();
        // No such group locally: the write is a silent no-op.
        store.add_user_group("jdoe", "Ghost").await.unwrap();
        assert!(store.user_group_names("jdoe").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn group_names_come_back_sorted() {
        let store = InMemoryStore::new();
        store.create_user("jdoe").await.unwrap();
        for name in ["Planning", "GIS", "Finance"] {
            store.create_group(name).await.unwrap();
            store.add_user_group("jdoe", name).await.unwrap();
        }
        assert_eq!(
            store.user_group_names("jdoe").await.unwrap(),
            vec!["Finance", "GIS", "Planning"]
        );
    }
}
