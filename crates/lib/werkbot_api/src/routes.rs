//! Route paths.

pub const GET_HEALTH: &str = "/health";

/// `GET`, `POST` and `DELETE` share one path.
pub const SESSION: &str = "/session";
pub const GET_SESSIONS: &str = "/sessions";

pub const POST_AUTH_LOGIN: &str = "/auth/login";
pub const POST_AUTH_REGISTER: &str = "/auth/register";
pub const POST_AUTH_REFRESH: &str = "/auth/refresh";
pub const POST_AUTH_LOGOUT: &str = "/auth/logout";
