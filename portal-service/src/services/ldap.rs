//! LDAP/Active Directory implementation of the directory provider.

use crate::config::DirectoryConfig;
use crate::models::UserProfile;
use crate::services::directory::{DirectoryError, DirectoryProvider, DirectoryUser};
use crate::services::metrics::record_directory_lookup;
use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use std::time::Duration;
use tracing::instrument;

const USER_ATTRS: [&str; 4] = ["memberOf", "givenName", "sn", "mail"];

pub struct LdapDirectory {
    config: DirectoryConfig,
}

impl LdapDirectory {
    pub fn new(config: DirectoryConfig) -> Self {
        Self { config }
    }

    fn url(&self) -> String {
        if self.config.use_tls {
            format!("ldaps://{}:{}", self.config.host, self.config.port)
        } else {
            format!("ldap://{}:{}", self.config.host, self.config.port)
        }
    }

    /// Opens a fresh connection and binds with the service account.
    async fn connect(&self) -> Result<Ldap, DirectoryError> {
        let url = self.url();
        let settings = LdapConnSettings::new()
            .set_conn_timeout(Duration::from_secs(self.config.connect_timeout_secs))
            .set_starttls(self.config.use_starttls);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| {
                DirectoryError::Unavailable(format!("Failed to connect to {}: {}", url, e))
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                tracing::warn!(error = %e, "LDAP connection driver error");
            }
        });

        let result = ldap
            .simple_bind(&self.config.bind_dn, &self.config.bind_password)
            .await
            .map_err(|e| {
                DirectoryError::Unavailable(format!(
                    "LDAP bind failed for {}: {}",
                    self.config.bind_dn, e
                ))
            })?;

        if result.rc != 0 {
            // rc 49 is invalidCredentials
            return Err(DirectoryError::Unavailable(format!(
                "LDAP bind failed with code {}: {}",
                result.rc, result.text
            )));
        }

        Ok(ldap)
    }
}

#[async_trait]
impl DirectoryProvider for LdapDirectory {
    #[instrument(skip(self))]
    async fn lookup_user(&self, username: &str) -> Result<DirectoryUser, DirectoryError> {
        let mut ldap = self.connect().await.map_err(|e| {
            record_directory_lookup("unavailable");
            e
        })?;

        let filter = format!(
            "(&(objectClass=user)(sAMAccountName={}))",
            escape_filter_value(username)
        );

        let result = ldap
            .search(
                &self.config.base_dn,
                Scope::Subtree,
                &filter,
                USER_ATTRS.to_vec(),
            )
            .await
            .map_err(|e| {
                record_directory_lookup("unavailable");
                DirectoryError::Unavailable(format!("LDAP search failed: {}", e))
            })?;

        let (entries, _res) = result.success().map_err(|e| {
            record_directory_lookup("unavailable");
            DirectoryError::Unavailable(format!("LDAP search failed: {}", e))
        })?;

        ldap.unbind().await.ok();

        let entry = match entries.into_iter().next() {
            Some(entry) => SearchEntry::construct(entry),
            None => {
                record_directory_lookup("not_found");
                return Err(DirectoryError::UserNotFound(username.to_string()));
            }
        };

        let groups: Vec<String> = entry
            .attrs
            .get("memberOf")
            .map(|dns| dns.iter().filter_map(|dn| group_name_from_dn(dn)).collect())
            .unwrap_or_default();

        let profile = UserProfile {
            first_name: first_attr(&entry, "givenName"),
            last_name: first_attr(&entry, "sn"),
            email: first_attr(&entry, "mail"),
        };

        record_directory_lookup("ok");
        tracing::info!(
            username = %username,
            group_count = groups.len(),
            groups = ?groups,
            first_name = %profile.first_name,
            last_name = %profile.last_name,
            email = %profile.email,
            "Directory lookup complete"
        );

        Ok(DirectoryUser { groups, profile })
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), DirectoryError> {
        let mut ldap = self.connect().await?;
        ldap.unbind().await.ok();
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

fn first_attr(entry: &SearchEntry, name: &str) -> String {
    entry
        .attrs
        .get(name)
        .and_then(|values| values.first())
        .cloned()
        .unwrap_or_default()
}

/// Escapes special characters in LDAP filter values (RFC 4515).
fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\5c")
        .replace('*', "\\2a")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}

/// Extracts the group name from a `memberOf` DN: the value of the leading
/// CN component. DNs without a leading CN are skipped.
fn group_name_from_dn(dn: &str) -> Option<String> {
    let first = dn.split(',').next()?;
    let (attr, value) = first.split_once('=')?;
    if attr.trim().eq_ignore_ascii_case("cn") && !value.is_empty() {
        Some(value.to_string())
    } else {
        None
    }
}
