//! Domain models shared by the store, the resolver and the HTTP layer.

pub mod auth;
pub mod session;
