//! # werkbot_core
//!
//! Session and tenant resolution for Werkbot: who is calling, which
//! workshop they act for and in which role.

pub mod auth;
pub mod cache;
pub mod environment;
pub mod i18n;
pub mod migrate;
pub mod models;
pub mod rate_limit;
pub mod session;
pub mod store;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
