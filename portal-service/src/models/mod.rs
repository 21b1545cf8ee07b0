pub mod app;
pub mod group;
pub mod user;

pub use app::{AppDescriptor, AppRecord};
pub use group::GroupRecord;
pub use user::{
    local_account_name, RemoteUser, UserProfile, UserRecord, REMOTE_USER_HEADER, SESSION_USER_KEY,
};
