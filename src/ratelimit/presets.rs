//! The stock limiter configurations.

use std::time::Duration;

use super::limiter::LimiterConfig;

/// Name of the limiter for general API traffic.
pub const GENERAL: &str = "general";
/// Name of the limiter for login and signup endpoints.
pub const AUTH: &str = "auth";

/// Window shared by both stock limiters.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Request budget of the general limiter.
pub const GENERAL_MAX_REQUESTS: u64 = 500;
/// Request budget of the auth limiter.
pub const AUTH_MAX_REQUESTS: u64 = 100;

/// Rejection message of the general limiter.
///
/// The text promises 15 minutes while the window is 5. Both are kept as
/// deployed; adjust them together if either changes.
pub const GENERAL_MESSAGE: &str =
    "Too many requests from this IP, please try again after 15 minutes.";
/// Rejection message of the auth limiter.
pub const AUTH_MESSAGE: &str = "Too many login/signup attempts. Try again later.";

impl LimiterConfig {
    /// 500 requests per 5 minutes.
    pub fn general() -> Self {
        Self::preset(GENERAL_MAX_REQUESTS, GENERAL_MESSAGE)
    }

    /// 100 requests per 5 minutes, for credential endpoints.
    pub fn auth() -> Self {
        Self::preset(AUTH_MAX_REQUESTS, AUTH_MESSAGE)
    }

    fn preset(max_requests: u64, message: &str) -> Self {
        match Self::new(DEFAULT_WINDOW, max_requests, message) {
            Ok(config) => config,
            Err(e) => unreachable!("stock limiter configuration is valid: {}", e),
        }
    }
}
