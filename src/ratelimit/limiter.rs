//! Core fixed-window rate limiter implementation.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, trace};

use super::counter::{Admission, WindowState};
use super::decision::Decision;
use super::key::ClientKey;
use crate::error::{FloodgateError, Result};

/// Immutable configuration of a limiter instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimiterConfig {
    window_size: Duration,
    /// `window_size` as a calendar duration
    window: chrono::Duration,
    max_requests: u64,
    rejection_message: String,
}

impl LimiterConfig {
    /// Create a validated configuration.
    ///
    /// Fails with [`FloodgateError::InvalidConfig`] for a zero window or a
    /// zero request budget.
    pub fn new(
        window_size: Duration,
        max_requests: u64,
        rejection_message: impl Into<String>,
    ) -> Result<Self> {
        if window_size.is_zero() {
            return Err(FloodgateError::InvalidConfig(
                "window size must be greater than zero".to_string(),
            ));
        }

        if max_requests == 0 {
            return Err(FloodgateError::InvalidConfig(
                "max requests must be greater than zero".to_string(),
            ));
        }

        let window = chrono::Duration::from_std(window_size).map_err(|_| {
            FloodgateError::InvalidConfig(format!("window size {:?} is out of range", window_size))
        })?;

        Ok(Self {
            window_size,
            window,
            max_requests,
            rejection_message: rejection_message.into(),
        })
    }

    /// Length of one window.
    pub fn window_size(&self) -> Duration {
        self.window_size
    }

    /// Requests admitted per window and key.
    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    /// Message attached to rejections.
    pub fn rejection_message(&self) -> &str {
        &self.rejection_message
    }
}

/// A fixed-window rate limiter with its own key-space.
///
/// This struct is thread-safe and can be shared across threads and tasks.
/// Each key's reset, compare and increment happen while holding that key's
/// map entry, so concurrent checks on one key never lose an update.
pub struct FixedWindowLimiter {
    config: LimiterConfig,
    /// Per-key window state
    windows: DashMap<ClientKey, WindowState>,
}

impl FixedWindowLimiter {
    /// Create a limiter from a validated configuration.
    pub fn new(config: LimiterConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    /// Validate the parameters and create a limiter in one step.
    pub fn configure(
        window_size: Duration,
        max_requests: u64,
        rejection_message: impl Into<String>,
    ) -> Result<Self> {
        LimiterConfig::new(window_size, max_requests, rejection_message).map(Self::new)
    }

    /// The limiter's configuration.
    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Decide whether a request from `key` arriving at `now` is admitted.
    ///
    /// An admitted request is counted against the window. A rejected one is
    /// not, so retry storms cannot grow the counter.
    pub fn check(&self, key: &ClientKey, now: DateTime<Utc>) -> Decision {
        trace!(key = %key, now = %now, "Checking rate limit");

        let limit = self.config.max_requests;

        let (admission, reset_at) = {
            let mut state = self.windows.entry(key.clone()).or_insert_with(|| {
                debug!(
                    key = %key,
                    limit = limit,
                    window = ?self.config.window_size,
                    "Creating new rate limit window"
                );
                WindowState::new(now)
            });

            let admission = state.admit(now, self.config.window, limit);
            (admission, state.reset_at(self.config.window))
        };

        match admission {
            Admission::Admitted { remaining } => Decision::allowed(limit, remaining, reset_at),
            Admission::Rejected => {
                debug!(key = %key, reset_at = %reset_at, "Rate limit exceeded");
                Decision::rejected(limit, reset_at, &self.config.rejection_message)
            }
        }
    }

    /// Remove every key whose window has elapsed at `now`.
    ///
    /// An elapsed window behaves exactly like a missing one, so this never
    /// changes a later decision as long as later checks do not use an
    /// earlier `now` than the sweep did. A check from before the sweep
    /// finds no state and opens a fresh window. Returns the number of keys
    /// removed.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.windows.retain(|_, state| {
            let keep = !state.is_expired(now, self.config.window);
            if !keep {
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            debug!(removed = removed, "Evicted expired rate limit windows");
        }

        removed
    }

    /// Requests counted for `key` in the window live at `now`.
    ///
    /// Returns 0 for unknown keys and elapsed windows. Does not count as a
    /// request.
    pub fn current_count(&self, key: &ClientKey, now: DateTime<Utc>) -> u64 {
        self.windows
            .get(key)
            .map(|state| state.count_at(now, self.config.window))
            .unwrap_or(0)
    }

    /// Forget `key`, giving it a fresh window on its next request.
    ///
    /// Returns `true` if the key was tracked.
    pub fn reset_key(&self, key: &ClientKey) -> bool {
        self.windows.remove(key).is_some()
    }

    /// Clear all windows.
    pub fn clear(&self) {
        self.windows.clear();
    }

    /// Get the number of tracked keys.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}
