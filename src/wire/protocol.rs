//! Newline-delimited JSON messages of the decision service.
//!
//! Each request is one JSON object on one line:
//!
//! ```text
//! {"limiter":"auth","key":"203.0.113.7"}
//! ```
//!
//! and is answered by exactly one response line:
//!
//! ```text
//! {"status":"ok","decision":{"allowed":true,...},"headers":[["RateLimit-Limit","100"],...]}
//! {"status":"error","error":"Unknown limiter: uploads"}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FloodgateError, Result};
use crate::ratelimit::Decision;

/// Maximum request line size (8 KiB), excluding the newline.
pub const MAX_LINE_BYTES: usize = 8 * 1024;

/// A request to check one client against one limiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRequest {
    /// Name of the limiter to check against
    pub limiter: String,
    /// Client key; the connection's peer IP when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// The answer to one request line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckResponse {
    /// The check ran
    Ok {
        /// The admission decision
        decision: Decision,
        /// Rate limit headers the HTTP layer may forward
        headers: Vec<(String, String)>,
    },
    /// The request could not be served
    Error {
        /// Human-readable reason
        error: String,
    },
}

impl CheckResponse {
    /// Wrap a decision taken at `now`.
    pub fn ok(decision: Decision, now: DateTime<Utc>) -> Self {
        let headers = decision
            .headers(now)
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();

        CheckResponse::Ok { decision, headers }
    }

    /// An error response.
    pub fn error(reason: impl Into<String>) -> Self {
        CheckResponse::Error {
            error: reason.into(),
        }
    }
}

/// Parse one request line.
pub fn decode_request(line: &str) -> Result<CheckRequest> {
    if line.len() > MAX_LINE_BYTES {
        return Err(FloodgateError::Protocol(format!(
            "request line of {} bytes exceeds {} bytes",
            line.len(),
            MAX_LINE_BYTES
        )));
    }

    serde_json::from_str(line)
        .map_err(|e| FloodgateError::Protocol(format!("invalid request: {}", e)))
}

/// Serialize a response as one newline-terminated line.
pub fn encode_line(response: &CheckResponse) -> Result<String> {
    let mut line = serde_json::to_string(response)
        .map_err(|e| FloodgateError::Protocol(format!("failed to encode response: {}", e)))?;
    line.push('\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_decode_request_with_key() {
        let request = decode_request(r#"{"limiter":"auth","key":"203.0.113.7"}"#).unwrap();
        assert_eq!(request.limiter, "auth");
        assert_eq!(request.key.as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_decode_request_without_key() {
        let request = decode_request(r#"{"limiter":"general"}"#).unwrap();
        assert_eq!(request.key, None);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_request("CHECK auth 1.2.3.4"),
            Err(FloodgateError::Protocol(_))
        ));
        assert!(matches!(
            decode_request(r#"{"key":"x"}"#),
            Err(FloodgateError::Protocol(_))
        ));
    }

    #[test]
    fn test_decode_rejects_oversized_line() {
        let line = format!(r#"{{"limiter":"{}"}}"#, "a".repeat(MAX_LINE_BYTES));
        assert!(matches!(
            decode_request(&line),
            Err(FloodgateError::Protocol(ref m)) if m.contains("exceeds")
        ));
    }

    #[test]
    fn test_encode_rejection_line() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let decision = Decision {
            allowed: false,
            limit: 100,
            remaining: 0,
            reset_at: now + chrono::Duration::seconds(90),
            message: Some("Too many login/signup attempts. Try again later.".to_string()),
        };

        let line = encode_line(&CheckResponse::ok(decision, now)).unwrap();
        assert!(line.ends_with('\n'));

        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["decision"]["allowed"], false);
        assert_eq!(
            value["decision"]["message"],
            "Too many login/signup attempts. Try again later."
        );
        assert_eq!(value["headers"][3][0], "Retry-After");
        assert_eq!(value["headers"][3][1], "90");
    }

    #[test]
    fn test_encode_error_line() {
        let line = encode_line(&CheckResponse::error("Unknown limiter: uploads")).unwrap();
        assert_eq!(
            line,
            "{\"status\":\"error\",\"error\":\"Unknown limiter: uploads\"}\n"
        );
    }
}
