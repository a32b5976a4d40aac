//! Admission decisions returned by a limiter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Header carrying the window's request budget.
pub const HEADER_LIMIT: &str = "RateLimit-Limit";
/// Header carrying the requests left in the window.
pub const HEADER_REMAINING: &str = "RateLimit-Remaining";
/// Header carrying the seconds until the window resets.
pub const HEADER_RESET: &str = "RateLimit-Reset";
/// Header sent with rejections.
pub const HEADER_RETRY_AFTER: &str = "Retry-After";

/// The outcome of a single admission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the request is admitted
    pub allowed: bool,
    /// The limiter's request budget per window
    pub limit: u64,
    /// Requests left in the current window after this one
    pub remaining: u64,
    /// When the current window ends
    pub reset_at: DateTime<Utc>,
    /// Rejection message, only set when `allowed` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Decision {
    pub(crate) fn allowed(limit: u64, remaining: u64, reset_at: DateTime<Utc>) -> Self {
        Self {
            allowed: true,
            limit,
            remaining,
            reset_at,
            message: None,
        }
    }

    pub(crate) fn rejected(limit: u64, reset_at: DateTime<Utc>, message: &str) -> Self {
        Self {
            allowed: false,
            limit,
            remaining: 0,
            reset_at,
            message: Some(message.to_string()),
        }
    }

    /// Whole seconds until the window resets, rounded up, never negative.
    pub fn retry_after(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.reset_at - now).num_milliseconds();
        if millis <= 0 {
            0
        } else {
            (millis as u64).div_ceil(1000)
        }
    }

    /// Standard rate limit response headers for this decision.
    ///
    /// `Retry-After` is only included for rejections.
    pub fn headers(&self, now: DateTime<Utc>) -> Vec<(&'static str, String)> {
        let reset = self.retry_after(now);
        let mut headers = vec![
            (HEADER_LIMIT, self.limit.to_string()),
            (HEADER_REMAINING, self.remaining.to_string()),
            (HEADER_RESET, reset.to_string()),
        ];

        if !self.allowed {
            headers.push((HEADER_RETRY_AFTER, reset.to_string()));
        }

        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + millis).unwrap()
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let decision = Decision::allowed(10, 9, t(300_000));

        assert_eq!(decision.retry_after(t(0)), 300);
        assert_eq!(decision.retry_after(t(299_001)), 1);
        assert_eq!(decision.retry_after(t(300_000)), 0);
        assert_eq!(decision.retry_after(t(400_000)), 0);
    }

    #[test]
    fn test_allowed_headers() {
        let decision = Decision::allowed(500, 499, t(300_000));
        let headers = decision.headers(t(0));

        assert_eq!(
            headers,
            vec![
                (HEADER_LIMIT, "500".to_string()),
                (HEADER_REMAINING, "499".to_string()),
                (HEADER_RESET, "300".to_string()),
            ]
        );
    }

    #[test]
    fn test_rejected_headers_include_retry_after() {
        let decision = Decision::rejected(100, t(60_000), "slow down");
        let headers = decision.headers(t(30_000));

        assert_eq!(decision.message.as_deref(), Some("slow down"));
        assert_eq!(decision.remaining, 0);
        assert!(headers.contains(&(HEADER_RETRY_AFTER, "30".to_string())));
    }

    #[test]
    fn test_message_omitted_when_allowed() {
        let decision = Decision::allowed(3, 2, t(0));
        let json = serde_json::to_value(&decision).unwrap();

        assert_eq!(json["allowed"], true);
        assert!(json.get("message").is_none());
    }
}
