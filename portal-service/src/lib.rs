//! portal-service: proxy-authenticated intranet portal.
//!
//! Sits behind an authenticating reverse proxy, mirrors directory group
//! membership into local tables on every request, and serves a landing page
//! plus a small JSON surface listing the apps each user may reach.

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;

pub use startup::AppState;
