//! Application startup and lifecycle management.

use axum::{middleware::from_fn, routing::get, Router};
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::security_headers::security_headers_middleware;
use service_core::middleware::tracing::{request_id, request_id_middleware};
use std::sync::Arc;
use time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::PortalConfig;
use crate::handlers::{
    auth::{login_page, logout, remote_login},
    health::{health_check, readiness_check},
    home::home,
    metrics::metrics,
    user::{user_auth, user_groups},
};
use crate::services::{
    init_metrics, AppCatalog, DirectoryProvider, InMemoryStore, LdapDirectory, PortalStore,
    PostgresStore, StaticDirectory,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: PortalConfig,
    pub store: Arc<dyn PortalStore>,
    pub directory: Arc<dyn DirectoryProvider>,
}

pub fn build_router(state: AppState) -> Router {
    // Session setup
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false) // Set to true in production with HTTPS
        .with_expiry(Expiry::OnInactivity(Duration::hours(24)));

    Router::new()
        .route("/", get(home))
        .route("/login", get(login_page))
        .route("/login/remote", get(remote_login).post(remote_login))
        .route("/logout", get(logout))
        .route("/user-auth", get(user_auth).post(user_auth))
        .route("/user-groups", get(user_groups).post(user_groups))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
        .layer(session_layer)
        .layer(from_fn(metrics_middleware))
        // Add tracing layer
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request_id(request.headers()).unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        // Add tracing middleware for request_id
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: PortalConfig) -> Result<Self, AppError> {
        // Initialize metrics
        init_metrics();

        // Fail fast on a misconfigured app catalog.
        AppCatalog::from_config(&config.apps)?;

        let store: Arc<dyn PortalStore> = match &config.database.url {
            Some(url) => {
                let store = PostgresStore::connect(
                    url,
                    config.database.max_connections,
                    config.database.min_connections,
                )
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                    e
                })?;
                store.run_migrations().await.map_err(|e| {
                    tracing::error!(error = %e, "Failed to run migrations");
                    e
                })?;
                Arc::new(store)
            }
            None => {
                tracing::info!("DATABASE_URL not set - using the in-memory store");
                Arc::new(InMemoryStore::new())
            }
        };

        let directory: Arc<dyn DirectoryProvider> = if config.directory.enabled {
            tracing::info!(
                host = %config.directory.host,
                port = config.directory.port,
                "Directory synchronization enabled"
            );
            Arc::new(LdapDirectory::new(config.directory.clone()))
        } else {
            tracing::info!("Directory synchronization disabled - using the static directory");
            Arc::new(StaticDirectory::permissive())
        };

        let state = AppState {
            config: config.clone(),
            store,
            directory,
        };

        let listener = TcpListener::bind(config.common.bind_address())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, addr = %config.common.bind_address(), "Failed to bind listener");
                AppError::from(e)
            })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Portal service listener bound");

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        tracing::info!(
            service = "portal-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router).await
    }
}
