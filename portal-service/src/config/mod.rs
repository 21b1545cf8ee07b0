//! Configuration module for portal-service.

use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

use crate::models::AppDescriptor;

#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    /// Display name rendered on the landing page.
    pub app_name: String,
    /// Public base URL of this portal, rendered into templates.
    pub server_url: String,
    /// Root directory under which each user gets a media folder.
    pub media_root: String,
    /// Identity assumed when neither header nor session carry one. Unset in
    /// production.
    pub dev_fallback_user: Option<String>,
    pub database: DatabaseConfig,
    pub directory: DirectoryConfig,
    pub apps: AppsConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `None` selects the in-memory store; only allowed outside production.
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    pub use_starttls: bool,
    pub bind_dn: String,
    pub bind_password: String,
    pub base_dn: String,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AppsConfig {
    /// Directory service endpoint this deployment sits behind; known
    /// endpoints imply a deployment path label.
    pub endpoint: String,
    /// Overrides the endpoint-derived path label.
    pub path_label: Option<String>,
    /// Extra app descriptors merged over the built-in list.
    pub extra: Vec<AppDescriptor>,
}

impl PortalConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let database_url = env::var("DATABASE_URL").ok();
        if is_prod && database_url.is_none() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_URL is required in production but not set"
            )));
        }

        let directory_enabled = env::var("DIRECTORY_ENABLED")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);
        // Directory settings are only mandatory when the directory is on.
        let directory_required = is_prod && directory_enabled;

        let dev_fallback_user = match env::var("DEV_FALLBACK_USER") {
            Ok(value) if value.is_empty() => None,
            Ok(value) => Some(value),
            Err(_) if is_prod => None,
            Err(_) => Some("siteadmin".to_string()),
        };

        let extra_apps = match env::var("APPS_EXTRA") {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("APPS_EXTRA is not valid JSON: {}", e))
            })?,
            Err(_) => Vec::new(),
        };

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "portal-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            app_name: get_env("APP_NAME", Some("GIS Portal"), is_prod)?,
            server_url: get_env("SERVER_URL", Some("http://localhost:8080"), is_prod)?,
            media_root: get_env("MEDIA_ROOT", Some("./media"), is_prod)?,
            dev_fallback_user,
            database: DatabaseConfig {
                url: database_url,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            },
            directory: DirectoryConfig {
                enabled: directory_enabled,
                host: get_env("DIRECTORY_HOST", Some("localhost"), directory_required)?,
                port: get_env("DIRECTORY_PORT", Some("389"), directory_required)?
                    .parse()
                    .unwrap_or(389),
                use_tls: env::var("DIRECTORY_USE_TLS")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
                use_starttls: env::var("DIRECTORY_USE_STARTTLS")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
                bind_dn: get_env("DIRECTORY_BIND_DN", Some(""), directory_required)?,
                bind_password: get_env("DIRECTORY_BIND_PASSWORD", Some(""), directory_required)?,
                base_dn: get_env("DIRECTORY_BASE_DN", Some(""), directory_required)?,
                connect_timeout_secs: env::var("DIRECTORY_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            },
            apps: AppsConfig {
                endpoint: get_env("APPS_ENDPOINT", Some("gisapps.example.com"), is_prod)?,
                path_label: env::var("APPS_PATH_LABEL").ok(),
                extra: extra_apps,
            },
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
