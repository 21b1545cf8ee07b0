//! Services module for portal-service.

pub mod catalog;
pub mod database;
pub mod directory;
pub mod ldap;
pub mod metrics;
pub mod reconcile;
pub mod store;
pub mod user_info;

pub use catalog::{AppCatalog, PUBLIC_GROUP};
pub use database::PostgresStore;
pub use directory::{DirectoryError, DirectoryProvider, DirectoryUser, StaticDirectory};
pub use ldap::LdapDirectory;
pub use metrics::{get_metrics, init_metrics};
pub use reconcile::{
    reconcile_catalog, reconcile_user, CatalogOutcome, GroupSet, ReconcileWarning, UserOutcome,
    WarningKind,
};
pub use store::{InMemoryStore, PortalStore};
pub use user_info::{refresh_user_info, user_info, UserInfo};
