//! Background eviction of expired windows.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::clock::Clock;
use super::registry::LimiterRegistry;

/// Periodically evicts expired windows from every limiter in a registry.
///
/// Eviction only reclaims memory; checks already treat elapsed windows as
/// fresh, so the sweep cadence never affects decisions.
pub struct EvictionSweeper {
    registry: Arc<LimiterRegistry>,
    clock: Arc<dyn Clock>,
    every: Duration,
}

impl EvictionSweeper {
    /// Create a sweeper running every `every`.
    pub fn new(registry: Arc<LimiterRegistry>, clock: Arc<dyn Clock>, every: Duration) -> Self {
        Self {
            registry,
            clock,
            every,
        }
    }

    /// Run one sweep now. Returns the number of windows removed.
    pub fn sweep(&self) -> usize {
        self.registry.evict_expired(self.clock.now())
    }

    /// Spawn the sweep loop on the current runtime.
    ///
    /// The loop exits once `shutdown` reads `true` or its sender is dropped.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval = ?self.every, "Eviction sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep();
                    debug!(
                        removed = removed,
                        tracked = self.registry.tracked_keys(),
                        "Eviction sweep finished"
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Eviction sweeper stopped");
    }
}
