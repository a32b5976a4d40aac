//! Decision service request handling.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use super::protocol::{self, CheckResponse};
use crate::error::{FloodgateError, Result};
use crate::ratelimit::{ClientKey, Clock, KeyExtractor, LimiterRegistry, PeerAddrKey};

/// Answers check requests against a registry of limiters.
pub struct DecisionService {
    registry: Arc<LimiterRegistry>,
    clock: Arc<dyn Clock>,
}

impl DecisionService {
    /// Create a new DecisionService over `registry`, reading time from `clock`.
    pub fn new(registry: Arc<LimiterRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self { registry, clock }
    }

    /// The registry this service checks against.
    pub fn registry(&self) -> &Arc<LimiterRegistry> {
        &self.registry
    }

    /// Handle one request line from `peer`.
    ///
    /// Never fails: problems with the request become an error response.
    #[instrument(skip(self, line))]
    pub fn handle_line(&self, peer: SocketAddr, line: &str) -> CheckResponse {
        match self.check(peer, line) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Rejecting decision request");
                CheckResponse::error(e.to_string())
            }
        }
    }

    fn check(&self, peer: SocketAddr, line: &str) -> Result<CheckResponse> {
        let request = protocol::decode_request(line)?;

        if request.limiter.is_empty() {
            return Err(FloodgateError::Protocol("limiter is required".to_string()));
        }

        let key = match request.key {
            Some(key) if key.is_empty() => {
                return Err(FloodgateError::Protocol(
                    "key must not be empty".to_string(),
                ));
            }
            Some(key) => ClientKey::from(key),
            None => PeerAddrKey.extract(&peer),
        };

        let limiter = self.registry.require(&request.limiter)?;
        let now = self.clock.now();
        let decision = limiter.check(&key, now);

        debug!(
            limiter = %request.limiter,
            key = %key,
            allowed = decision.allowed,
            remaining = decision.remaining,
            "Rate limit decision made"
        );

        Ok(CheckResponse::ok(decision, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::ManualClock;
    use chrono::{TimeZone, Utc};

    fn service() -> (DecisionService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        ));
        let registry = Arc::new(LimiterRegistry::with_defaults());
        (DecisionService::new(registry, clock.clone()), clock)
    }

    fn peer() -> SocketAddr {
        "192.0.2.33:41000".parse().unwrap()
    }

    fn error_of(response: CheckResponse) -> String {
        match response {
            CheckResponse::Error { error } => error,
            other => panic!("expected error response, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_request_returns_ok() {
        let (service, _) = service();

        let response = service.handle_line(peer(), r#"{"limiter":"auth","key":"user:7"}"#);
        match response {
            CheckResponse::Ok { decision, headers } => {
                assert!(decision.allowed);
                assert_eq!(decision.limit, 100);
                assert_eq!(decision.remaining, 99);
                assert_eq!(headers[0], ("RateLimit-Limit".to_string(), "100".to_string()));
                assert_eq!(headers[2], ("RateLimit-Reset".to_string(), "300".to_string()));
            }
            other => panic!("expected ok response, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_key_uses_peer_ip() {
        let (service, clock) = service();

        service.handle_line(peer(), r#"{"limiter":"general"}"#);

        let general = service.registry().general().unwrap();
        assert_eq!(
            general.current_count(&ClientKey::from("192.0.2.33"), clock.now()),
            1
        );
    }

    #[test]
    fn test_empty_limiter_rejected() {
        let (service, _) = service();
        let error = error_of(service.handle_line(peer(), r#"{"limiter":""}"#));
        assert!(error.contains("limiter is required"));
    }

    #[test]
    fn test_empty_key_rejected() {
        let (service, _) = service();
        let error = error_of(service.handle_line(peer(), r#"{"limiter":"auth","key":""}"#));
        assert!(error.contains("key must not be empty"));
    }

    #[test]
    fn test_unknown_limiter_rejected() {
        let (service, _) = service();
        let error = error_of(service.handle_line(peer(), r#"{"limiter":"uploads"}"#));
        assert_eq!(error, "Unknown limiter: uploads");
    }

    #[test]
    fn test_malformed_json_rejected() {
        let (service, _) = service();
        let error = error_of(service.handle_line(peer(), "{not json"));
        assert!(error.starts_with("Protocol error"));
    }

    #[test]
    fn test_rejection_carries_message_and_window_reset() {
        let (service, clock) = service();
        let line = r#"{"limiter":"auth","key":"203.0.113.9"}"#;

        for _ in 0..100 {
            service.handle_line(peer(), line);
        }

        clock.advance(chrono::Duration::seconds(60));
        match service.handle_line(peer(), line) {
            CheckResponse::Ok { decision, headers } => {
                assert!(!decision.allowed);
                assert_eq!(
                    decision.message.as_deref(),
                    Some("Too many login/signup attempts. Try again later.")
                );
                assert!(headers.contains(&("Retry-After".to_string(), "240".to_string())));
            }
            other => panic!("expected ok response, got {:?}", other),
        }

        clock.advance(chrono::Duration::seconds(240));
        match service.handle_line(peer(), line) {
            CheckResponse::Ok { decision, .. } => {
                assert!(decision.allowed);
                assert_eq!(decision.remaining, 99);
            }
            other => panic!("expected ok response, got {:?}", other),
        }
    }
}
