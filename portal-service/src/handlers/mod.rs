//! HTTP handlers for portal-service.

pub mod auth;
pub mod health;
pub mod home;
pub mod metrics;
pub mod user;
