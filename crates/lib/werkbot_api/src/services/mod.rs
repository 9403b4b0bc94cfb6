//! Request-independent flows called by the handlers.

pub mod auth;
