//! Named limiter instances.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use super::limiter::{FixedWindowLimiter, LimiterConfig};
use super::presets;
use crate::config::LimiterSettings;
use crate::error::{FloodgateError, Result};

/// A set of independently configured limiters addressed by name.
///
/// Every limiter has its own key-space, so the same client key is counted
/// separately under each name.
#[derive(Default)]
pub struct LimiterRegistry {
    limiters: HashMap<String, Arc<FixedWindowLimiter>>,
}

impl LimiterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the `general` and `auth` limiters.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.insert(presets::GENERAL, LimiterConfig::general());
        registry.insert(presets::AUTH, LimiterConfig::auth());
        registry
    }

    /// Build every configured limiter, failing on the first invalid one.
    pub fn from_settings(settings: &BTreeMap<String, LimiterSettings>) -> Result<Self> {
        let mut registry = Self::new();

        for (name, limiter) in settings {
            let config = limiter.to_limiter_config(name)?;
            registry.insert(name, config);
        }

        Ok(registry)
    }

    /// Register a limiter under `name`, replacing any previous one.
    pub fn insert(&mut self, name: &str, config: LimiterConfig) -> Arc<FixedWindowLimiter> {
        info!(
            limiter = name,
            window = ?config.window_size(),
            max_requests = config.max_requests(),
            "Registering limiter"
        );

        let limiter = Arc::new(FixedWindowLimiter::new(config));
        self.limiters.insert(name.to_string(), limiter.clone());
        limiter
    }

    /// Look up a limiter by name.
    pub fn get(&self, name: &str) -> Option<Arc<FixedWindowLimiter>> {
        self.limiters.get(name).cloned()
    }

    /// Look up a limiter by name, failing for unknown names.
    pub fn require(&self, name: &str) -> Result<Arc<FixedWindowLimiter>> {
        self.get(name)
            .ok_or_else(|| FloodgateError::UnknownLimiter(name.to_string()))
    }

    /// The `general` limiter, if registered.
    pub fn general(&self) -> Option<Arc<FixedWindowLimiter>> {
        self.get(presets::GENERAL)
    }

    /// The `auth` limiter, if registered.
    pub fn auth(&self) -> Option<Arc<FixedWindowLimiter>> {
        self.get(presets::AUTH)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.limiters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered limiters.
    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    /// Whether no limiter is registered.
    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }

    /// Evict expired windows from every limiter. Returns the total removed.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        self.limiters
            .values()
            .map(|limiter| limiter.evict_expired(now))
            .sum()
    }

    /// Keys tracked across all limiters.
    pub fn tracked_keys(&self) -> usize {
        self.limiters.values().map(|l| l.tracked_keys()).sum()
    }
}
