use portal_service::config::{AppsConfig, DatabaseConfig, DirectoryConfig, PortalConfig};
use portal_service::services::{DirectoryProvider, InMemoryStore, PortalStore, StaticDirectory};
use portal_service::startup::build_router;
use portal_service::AppState;
use service_core::config::Config as CoreConfig;
use std::sync::Arc;
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,portal_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub store: Arc<InMemoryStore>,
    pub directory: Arc<StaticDirectory>,
    pub media_root: String,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Spawns the app on a random port with an in-memory store and a strict
    /// static directory, both kept accessible for seeding and assertions.
    pub async fn spawn_with(configure: impl FnOnce(&mut PortalConfig)) -> Self {
        init_tracing();

        let media_root = std::env::temp_dir()
            .join(format!("portal-media-{}", uuid::Uuid::new_v4()))
            .display()
            .to_string();

        let mut config = PortalConfig {
            common: CoreConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            service_name: "portal-service".to_string(),
            service_version: "test".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            app_name: "GIS Portal".to_string(),
            server_url: "http://localhost:8080".to_string(),
            media_root: media_root.clone(),
            dev_fallback_user: None,
            database: DatabaseConfig {
                url: None,
                max_connections: 5,
                min_connections: 1,
            },
            directory: DirectoryConfig {
                enabled: false,
                host: "localhost".to_string(),
                port: 389,
                use_tls: false,
                use_starttls: false,
                bind_dn: String::new(),
                bind_password: String::new(),
                base_dn: String::new(),
                connect_timeout_secs: 5,
            },
            apps: AppsConfig {
                endpoint: "gisapps.example.com".to_string(),
                path_label: None,
                extra: Vec::new(),
            },
        };
        configure(&mut config);

        let store = Arc::new(InMemoryStore::new());
        let directory = Arc::new(StaticDirectory::new());
        let store_state: Arc<dyn PortalStore> = store.clone();
        let directory_state: Arc<dyn DirectoryProvider> = directory.clone();

        let state = AppState {
            config,
            store: store_state,
            directory: directory_state,
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let port = listener.local_addr().expect("No local address").port();
        let address = format!("http://127.0.0.1:{}", port);

        let router = build_router(state);
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to build test client");

        // Wait for the server to be ready by polling the health endpoint
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            client,
            store,
            directory,
            media_root,
        }
    }
}
