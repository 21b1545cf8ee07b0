//! Two-phase authorization reconciler.
//!
//! Phase one (`reconcile_catalog`) aligns the persisted group and app tables
//! with the configured catalog. Phase two (`reconcile_user`) aligns one
//! user's memberships and profile with the directory record, consuming the
//! group set produced by phase one. No per-item failure aborts the remaining
//! work; failures surface as typed warnings.

use std::collections::BTreeSet;

use service_core::error::AppError;
use tracing::instrument;

use crate::services::catalog::{AppCatalog, PUBLIC_GROUP};
use crate::services::directory::DirectoryUser;
use crate::services::metrics::{
    record_reconcile_run, record_reconcile_warning, RECONCILE_DURATION,
};
use crate::services::store::PortalStore;

/// Group names that exist locally after catalog reconciliation.
pub type GroupSet = BTreeSet<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// A referenced group has no local row.
    GroupNotFound,
    /// A store write failed and was skipped.
    Persistence,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningKind::GroupNotFound => "group_not_found",
            WarningKind::Persistence => "persistence",
        }
    }
}

/// A non-fatal condition observed while reconciling.
#[derive(Debug, Clone)]
pub struct ReconcileWarning {
    pub kind: WarningKind,
    pub subject: String,
    pub detail: String,
}

impl ReconcileWarning {
    pub fn group_not_found(subject: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::GroupNotFound,
            subject: subject.into(),
            detail: detail.into(),
        }
    }

    pub fn persistence(subject: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::Persistence,
            subject: subject.into(),
            detail: detail.into(),
        }
    }
}

/// Result of catalog reconciliation.
#[derive(Debug)]
pub struct CatalogOutcome {
    pub groups: GroupSet,
    pub warnings: Vec<ReconcileWarning>,
}

/// Result of user reconciliation.
#[derive(Debug)]
pub struct UserOutcome {
    pub groups: Vec<String>,
    pub warnings: Vec<ReconcileWarning>,
}

fn note(warnings: &mut Vec<ReconcileWarning>, warning: ReconcileWarning) {
    tracing::warn!(
        kind = warning.kind.as_str(),
        subject = %warning.subject,
        detail = %warning.detail,
        "reconcile warning"
    );
    record_reconcile_warning(warning.kind.as_str());
    warnings.push(warning);
}

/// Aligns persisted groups and apps with the catalog.
///
/// Returns the set of group names that exist locally afterwards, which
/// `reconcile_user` consumes for membership lookups.
#[instrument(skip(store, catalog))]
pub async fn reconcile_catalog(
    store: &dyn PortalStore,
    catalog: &AppCatalog,
) -> Result<CatalogOutcome, AppError> {
    let timer = RECONCILE_DURATION
        .with_label_values(&["catalog"])
        .start_timer();
    let result = catalog_pass(store, catalog).await;
    timer.observe_duration();

    match &result {
        Ok(outcome) if outcome.warnings.is_empty() => record_reconcile_run("catalog", "ok"),
        Ok(_) => record_reconcile_run("catalog", "warnings"),
        Err(_) => record_reconcile_run("catalog", "error"),
    }
    result
}

async fn catalog_pass(
    store: &dyn PortalStore,
    catalog: &AppCatalog,
) -> Result<CatalogOutcome, AppError> {
    let mut warnings = Vec::new();
    let wanted: Vec<String> = catalog.group_names();
    let wanted_set: BTreeSet<&str> = wanted.iter().map(String::as_str).collect();

    let existing: BTreeSet<String> = store
        .list_groups()
        .await?
        .into_iter()
        .map(|g| g.name)
        .collect();

    for name in &wanted {
        if !existing.contains(name) {
            if let Err(err) = store.create_group(name).await {
                note(
                    &mut warnings,
                    ReconcileWarning::persistence(name, format!("failed to create group: {err}")),
                );
            }
        }
    }
    for name in &existing {
        if !wanted_set.contains(name.as_str()) {
            if let Err(err) = store.delete_group(name).await {
                note(
                    &mut warnings,
                    ReconcileWarning::persistence(name, format!("failed to delete group: {err}")),
                );
            }
        }
    }

    // Membership lookups below run against what actually landed, not what we
    // intended to create.
    let group_set: GroupSet = store
        .list_groups()
        .await?
        .into_iter()
        .map(|g| g.name)
        .collect();

    let persisted_apps = store.list_apps().await?;
    let catalog_names: BTreeSet<&str> = catalog
        .descriptors()
        .iter()
        .map(|d| d.name.as_str())
        .collect();

    for app in &persisted_apps {
        if !catalog_names.contains(app.name.as_str()) {
            if let Err(err) = store.delete_app(&app.name).await {
                note(
                    &mut warnings,
                    ReconcileWarning::persistence(
                        &app.name,
                        format!("failed to delete app: {err}"),
                    ),
                );
            }
        }
    }

    for descriptor in catalog.descriptors() {
        let public = descriptor.groups.iter().any(|g| g == PUBLIC_GROUP);
        let path = descriptor.path.as_deref();

        let current = match persisted_apps.iter().find(|a| a.name == descriptor.name) {
            Some(app) => {
                if app.path.as_deref() != path || app.public != public {
                    if let Err(err) = store.update_app(&descriptor.name, path, public).await {
                        note(
                            &mut warnings,
                            ReconcileWarning::persistence(
                                &descriptor.name,
                                format!("failed to update app: {err}"),
                            ),
                        );
                    }
                }
                app.groups.clone()
            }
            None => match store.create_app(&descriptor.name, path, public).await {
                Ok(app) => app.groups,
                Err(err) => {
                    note(
                        &mut warnings,
                        ReconcileWarning::persistence(
                            &descriptor.name,
                            format!("failed to create app: {err}"),
                        ),
                    );
                    continue;
                }
            },
        };

        let current: BTreeSet<String> = current.into_iter().collect();
        for group in &current {
            if !descriptor.groups.contains(group) {
                if let Err(err) = store.detach_app_group(&descriptor.name, group).await {
                    note(
                        &mut warnings,
                        ReconcileWarning::persistence(
                            group,
                            format!("failed to detach group from {}: {err}", descriptor.name),
                        ),
                    );
                }
            }
        }
        for group in &descriptor.groups {
            if current.contains(group) {
                continue;
            }
            if !group_set.contains(group) {
                note(
                    &mut warnings,
                    ReconcileWarning::group_not_found(
                        group,
                        format!("cannot attach missing group to {}", descriptor.name),
                    ),
                );
                continue;
            }
            if let Err(err) = store.attach_app_group(&descriptor.name, group).await {
                note(
                    &mut warnings,
                    ReconcileWarning::persistence(
                        group,
                        format!("failed to attach group to {}: {err}", descriptor.name),
                    ),
                );
            }
        }
    }

    Ok(CatalogOutcome {
        groups: group_set,
        warnings,
    })
}

/// Aligns one user's memberships and profile with the directory record.
///
/// The user row must already exist; users are provisioned at login, never
/// here.
#[instrument(skip(store, directory_user, group_set))]
pub async fn reconcile_user(
    store: &dyn PortalStore,
    username: &str,
    directory_user: &DirectoryUser,
    group_set: &GroupSet,
) -> Result<UserOutcome, AppError> {
    let timer = RECONCILE_DURATION.with_label_values(&["user"]).start_timer();
    let result = user_pass(store, username, directory_user, group_set).await;
    timer.observe_duration();

    match &result {
        Ok(outcome) if outcome.warnings.is_empty() => record_reconcile_run("user", "ok"),
        Ok(_) => record_reconcile_run("user", "warnings"),
        Err(_) => record_reconcile_run("user", "error"),
    }
    result
}

async fn user_pass(
    store: &dyn PortalStore,
    username: &str,
    directory_user: &DirectoryUser,
    group_set: &GroupSet,
) -> Result<UserOutcome, AppError> {
    let mut warnings = Vec::new();

    let user = store
        .find_user(username)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("no local account for {username}")))?;

    let directory_groups: BTreeSet<&str> =
        directory_user.groups.iter().map(String::as_str).collect();
    let current: BTreeSet<String> = store
        .user_group_names(username)
        .await?
        .into_iter()
        .collect();

    for group in &current {
        if !directory_groups.contains(group.as_str()) {
            if let Err(err) = store.remove_user_group(username, group).await {
                note(
                    &mut warnings,
                    ReconcileWarning::persistence(
                        group,
                        format!("failed to remove membership for {username}: {err}"),
                    ),
                );
            }
        }
    }
    for group in &directory_groups {
        if current.contains(*group) {
            continue;
        }
        if !group_set.contains(*group) {
            note(
                &mut warnings,
                ReconcileWarning::group_not_found(
                    *group,
                    format!("directory group has no local row; membership for {username} skipped"),
                ),
            );
            continue;
        }
        if let Err(err) = store.add_user_group(username, group).await {
            note(
                &mut warnings,
                ReconcileWarning::persistence(
                    *group,
                    format!("failed to add membership for {username}: {err}"),
                ),
            );
        }
    }

    if directory_user.profile != user.profile() {
        if let Err(err) = store
            .update_user_profile(username, &directory_user.profile)
            .await
        {
            note(
                &mut warnings,
                ReconcileWarning::persistence(
                    username,
                    format!("failed to update profile: {err}"),
                ),
            );
        }
    }

    let groups = store.user_group_names(username).await?;
    Ok(UserOutcome { groups, warnings })
}
