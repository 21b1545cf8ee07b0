//! Aggregated user payload and the per-request refresh pipeline.

use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use tracing::instrument;

use crate::config::AppsConfig;
use crate::models::RemoteUser;
use crate::services::catalog::AppCatalog;
use crate::services::directory::DirectoryProvider;
use crate::services::reconcile::{reconcile_catalog, reconcile_user};
use crate::services::store::PortalStore;

/// Aggregated view of one user delivered to portal clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub username: String,
    pub local_name: String,
    pub groups: Vec<String>,
    pub apps: Vec<String>,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub email: String,
}

/// Builds the aggregated payload from persisted state alone.
///
/// `groups` comes back sorted; `apps` lists every app that is public or
/// shares at least one group with the user.
#[instrument(skip(store), fields(user = %identity.local_name))]
pub async fn user_info(
    store: &dyn PortalStore,
    identity: &RemoteUser,
) -> Result<UserInfo, AppError> {
    let user = store.find_user(&identity.local_name).await?.ok_or_else(|| {
        AppError::NotFound(anyhow::anyhow!(
            "no local account for {}",
            identity.local_name
        ))
    })?;

    let groups = store.user_group_names(&identity.local_name).await?;
    let apps = store
        .list_apps()
        .await?
        .into_iter()
        .filter(|app| app.visible_to(&groups))
        .map(|app| app.name)
        .collect();

    Ok(UserInfo {
        username: identity.username.clone(),
        local_name: identity.local_name.clone(),
        groups,
        apps,
        first_name: user.first_name,
        last_name: user.last_name,
        email: user.email,
    })
}

/// Runs the full per-request pipeline: rebuild the catalog, reconcile the
/// persisted tables, look the user up in the directory, reconcile the user's
/// memberships and profile, then aggregate from the store.
#[instrument(skip_all, fields(user = %identity.local_name))]
pub async fn refresh_user_info(
    store: &dyn PortalStore,
    directory: &dyn DirectoryProvider,
    apps: &AppsConfig,
    identity: &RemoteUser,
) -> Result<UserInfo, AppError> {
    let catalog = AppCatalog::from_config(apps)?;
    let outcome = reconcile_catalog(store, &catalog).await?;
    let directory_user = directory.lookup_user(&identity.local_name).await?;
    reconcile_user(
        store,
        &identity.local_name,
        &directory_user,
        &outcome.groups,
    )
    .await?;
    user_info(store, identity).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserProfile;
    use crate::services::catalog::PUBLIC_GROUP;
    use crate::services::directory::{DirectoryUser, StaticDirectory};
    use crate::services::store::InMemoryStore;

    async fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        for group in [PUBLIC_GROUP, "GIS", "Planning", "Finance"] {
            store.create_group(group).await.unwrap();
        }
        store.create_app("mobile", None, true).await.unwrap();
        store
            .attach_app_group("mobile", PUBLIC_GROUP)
            .await
            .unwrap();
        store.create_app("print", None, false).await.unwrap();
        store.attach_app_group("print", "GIS").await.unwrap();
        store.attach_app_group("print", "Planning").await.unwrap();
        store.create_app("budget", None, false).await.unwrap();
        store.attach_app_group("budget", "Finance").await.unwrap();
        store
    }

    #[tokio::test]
    async fn aggregation_lists_public_and_intersecting_apps() {
        let store = seeded_store().await;
        store.create_user("jdoe").await.unwrap();
        store.add_user_group("jdoe", "GIS").await.unwrap();

        let info = user_info(&store, &RemoteUser::new("CORP\\jdoe"))
            .await
            .unwrap();

        assert_eq!(info.username, "CORP\\jdoe");
        assert_eq!(info.local_name, "jdoe");
        assert_eq!(info.groups, vec!["GIS"]);
        assert_eq!(info.apps, vec!["mobile", "print"]);
    }

    #[tokio::test]
    async fn aggregation_reports_profile_fields() {
        let store = seeded_store().await;
        store.create_user("jdoe").await.unwrap();
        let profile = UserProfile {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: "jane.doe@example.com".to_string(),
        };
        store.update_user_profile("jdoe", &profile).await.unwrap();

        let info = user_info(&store, &RemoteUser::new("jdoe")).await.unwrap();
        assert_eq!(info.first_name, "Jane");
        assert_eq!(info.last_name, "Doe");
        assert_eq!(info.email, "jane.doe@example.com");
    }

    #[tokio::test]
    async fn aggregation_requires_a_local_account() {
        let store = seeded_store().await;
        let err = user_info(&store, &RemoteUser::new("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    fn apps_config() -> AppsConfig {
        AppsConfig {
            endpoint: "gisapps.example.com".to_string(),
            path_label: None,
            extra: Vec::new(),
        }
    }

    #[tokio::test]
    async fn refresh_follows_directory_membership_changes() {
        let apps = apps_config();
        let store = InMemoryStore::new();
        store.create_user("jdoe").await.unwrap();
        let directory =
            StaticDirectory::new().with_user("jdoe", DirectoryUser::new(vec!["GIS".to_string()]));

        let info = refresh_user_info(&store, &directory, &apps, &RemoteUser::new("jdoe"))
            .await
            .unwrap();
        assert_eq!(info.groups, vec!["GIS"]);
        assert!(info.apps.contains(&"print".to_string()));

        directory.set_user("jdoe", DirectoryUser::new(vec!["Planning".to_string()]));
        let info = refresh_user_info(&store, &directory, &apps, &RemoteUser::new("jdoe"))
            .await
            .unwrap();
        assert_eq!(info.groups, vec!["Planning"]);
    }

    #[tokio::test]
    async fn refresh_surfaces_unknown_directory_users_as_not_found() {
        let apps = apps_config();
        let store = InMemoryStore::new();
        store.create_user("jdoe").await.unwrap();
        let directory = StaticDirectory::new();

        let err = refresh_user_info(&store, &directory, &apps, &RemoteUser::new("jdoe"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
