//! Fixed-window counter state.

use chrono::{DateTime, Duration, Utc};

/// Outcome of offering one request to a [`WindowState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request fit in the window; `remaining` is what is left after it.
    Admitted { remaining: u64 },
    /// The window is exhausted. The count was not touched.
    Rejected,
}

/// The per-key record of a fixed window.
///
/// Not synchronized on its own; the limiter holds the key's map entry for the
/// whole of [`WindowState::admit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowState {
    /// Requests admitted in the current window
    count: u64,
    /// When the current window started
    window_start: DateTime<Utc>,
}

impl WindowState {
    /// A fresh, empty window starting at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    /// Requests admitted in the current window.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Start of the current window.
    pub fn window_start(&self) -> DateTime<Utc> {
        self.window_start
    }

    /// When the current window ends.
    pub fn reset_at(&self, window: Duration) -> DateTime<Utc> {
        self.window_start
            .checked_add_signed(window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether the window has fully elapsed at `now`.
    ///
    /// A `now` earlier than `window_start` is still inside the window.
    pub fn is_expired(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now >= self.reset_at(window)
    }

    /// Count observed at `now`, treating an expired window as empty.
    pub fn count_at(&self, now: DateTime<Utc>, window: Duration) -> u64 {
        if self.is_expired(now, window) {
            0
        } else {
            self.count
        }
    }

    /// Start a new window at `now` if the current one has elapsed.
    ///
    /// Returns `true` if the window was reset.
    pub fn maybe_reset_window(&mut self, now: DateTime<Utc>, window: Duration) -> bool {
        if self.is_expired(now, window) {
            self.count = 0;
            self.window_start = now;
            true
        } else {
            false
        }
    }

    /// Offer one request arriving at `now`.
    pub fn admit(&mut self, now: DateTime<Utc>, window: Duration, limit: u64) -> Admission {
        self.maybe_reset_window(now, window);

        if self.count < limit {
            self.count += 1;
            Admission::Admitted {
                remaining: limit - self.count,
            }
        } else {
            Admission::Rejected
        }
    }
}
