//! Postgres-backed portal store.

use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{AppRecord, GroupRecord, UserProfile, UserRecord};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::PortalStore;

/// Database connection pool wrapper implementing [`PortalStore`].
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "portal-service"))]
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl PortalStore for PostgresStore {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // User Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_user"])
            .start_timer();

        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT username, first_name, last_name, email, created_utc
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to find user: {}", e)))?;

        timer.observe_duration();

        Ok(user)
    }

    #[instrument(skip(self))]
    async fn create_user(&self, username: &str) -> Result<UserRecord, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_user"])
            .start_timer();

        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (id, username)
            VALUES ($1, $2)
            RETURNING username, first_name, last_name, email, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("User '{}' already exists", username))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create user: {}", e)),
        })?;

        timer.observe_duration();

        info!(username = %username, "User created");

        Ok(user)
    }

    #[instrument(skip(self, profile))]
    async fn update_user_profile(
        &self,
        username: &str,
        profile: &UserProfile,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_user_profile"])
            .start_timer();

        sqlx::query(
            r#"
            UPDATE users
            SET first_name = $2, last_name = $3, email = $4
            WHERE username = $1
            "#,
        )
        .bind(username)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.email)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update profile: {}", e)))?;

        timer.observe_duration();

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Group Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_groups"])
            .start_timer();

        let groups = sqlx::query_as::<_, GroupRecord>(
            r#"
            SELECT name, created_utc
            FROM groups
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list groups: {}", e)))?;

        timer.observe_duration();

        Ok(groups)
    }

    #[instrument(skip(self))]
    async fn create_group(&self, name: &str) -> Result<GroupRecord, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_group"])
            .start_timer();

        let group = sqlx::query_as::<_, GroupRecord>(
            r#"
            INSERT INTO groups (id, name)
            VALUES ($1, $2)
            RETURNING name, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Group '{}' already exists", name))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create group: {}", e)),
        })?;

        timer.observe_duration();

        info!(group = %name, "Group created");

        Ok(group)
    }

    #[instrument(skip(self))]
    async fn delete_group(&self, name: &str) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_group"])
            .start_timer();

        // Association rows go with the group via ON DELETE CASCADE.
        sqlx::query("DELETE FROM groups WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete group: {}", e))
            })?;

        timer.observe_duration();

        info!(group = %name, "Group deleted");

        Ok(())
    }

    // -------------------------------------------------------------------------
    // App Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    async fn list_apps(&self) -> Result<Vec<AppRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_apps"])
            .start_timer();

        let apps = sqlx::query_as::<_, AppRecord>(
            r#"
            SELECT a.name, a.path, a.public,
                   COALESCE(
                       array_agg(g.name ORDER BY g.name) FILTER (WHERE g.name IS NOT NULL),
                       '{}'
                   ) AS groups
            FROM apps a
            LEFT JOIN app_groups ag ON ag.app_id = a.id
            LEFT JOIN groups g ON g.id = ag.group_id
            GROUP BY a.id
            ORDER BY a.name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list apps: {}", e)))?;

        timer.observe_duration();

        Ok(apps)
    }

    #[instrument(skip(self))]
    async fn create_app(
        &self,
        name: &str,
        path: Option<&str>,
        public: bool,
    ) -> Result<AppRecord, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_app"])
            .start_timer();

        let app = sqlx::query_as::<_, AppRecord>(
            r#"
            INSERT INTO apps (id, name, path, public)
            VALUES ($1, $2, $3, $4)
            RETURNING name, path, public, ARRAY[]::text[] AS groups
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(path)
        .bind(public)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("App '{}' already exists", name))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create app: {}", e)),
        })?;

        timer.observe_duration();

        info!(app = %name, public = public, "App created");

        Ok(app)
    }

    #[instrument(skip(self))]
    async fn update_app(
        &self,
        name: &str,
        path: Option<&str>,
        public: bool,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_app"])
            .start_timer();

        sqlx::query(
            r#"
            UPDATE apps
            SET path = $2, public = $3
            WHERE name = $1
            "#,
        )
        .bind(name)
        .bind(path)
        .bind(public)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update app: {}", e)))?;

        timer.observe_duration();

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_app(&self, name: &str) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_app"])
            .start_timer();

        sqlx::query("DELETE FROM apps WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete app: {}", e)))?;

        timer.observe_duration();

        info!(app = %name, "App deleted");

        Ok(())
    }

    #[instrument(skip(self))]
    async fn attach_app_group(&self, app: &str, group: &str) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["attach_app_group"])
            .start_timer();

        // Inserts nothing when either name is unknown or the pair exists.
        sqlx::query(
            r#"
            INSERT INTO app_groups (app_id, group_id)
            SELECT a.id, g.id
            FROM apps a, groups g
            WHERE a.name = $1 AND g.name = $2
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(app)
        .bind(group)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to attach group: {}", e)))?;

        timer.observe_duration();

        Ok(())
    }

    #[instrument(skip(self))]
    async fn detach_app_group(&self, app: &str, group: &str) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["detach_app_group"])
            .start_timer();

        sqlx::query(
            r#"
            DELETE FROM app_groups ag
            USING apps a, groups g
            WHERE ag.app_id = a.id AND ag.group_id = g.id
              AND a.name = $1 AND g.name = $2
            "#,
        )
        .bind(app)
        .bind(group)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to detach group: {}", e)))?;

        timer.observe_duration();

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Membership Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    async fn user_group_names(&self, username: &str) -> Result<Vec<String>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["user_group_names"])
            .start_timer();

        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT g.name
            FROM groups g
            JOIN user_groups ug ON ug.group_id = g.id
            JOIN users u ON u.id = ug.user_id
            WHERE u.username = $1
            ORDER BY g.name
            "#,
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list memberships: {}", e))
        })?;

        timer.observe_duration();

        Ok(names)
    }

    #[instrument(skip(self))]
    async fn add_user_group(&self, username: &str, group: &str) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["add_user_group"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO user_groups (user_id, group_id)
            SELECT u.id, g.id
            FROM users u, groups g
            WHERE u.username = $1 AND g.name = $2
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(username)
        .bind(group)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to add membership: {}", e)))?;

        timer.observe_duration();

        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_user_group(&self, username: &str, group: &str) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["remove_user_group"])
            .start_timer();

        sqlx::query(
            r#"
            DELETE FROM user_groups ug
            USING users u, groups g
            WHERE ug.user_id = u.id AND ug.group_id = g.id
              AND u.username = $1 AND g.name = $2
            "#,
        )
        .bind(username)
        .bind(group)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to remove membership: {}", e))
        })?;

        timer.observe_duration();

        Ok(())
    }
}
