//! Rate limiting logic and state management.

mod clock;
mod counter;
mod decision;
mod key;
mod limiter;
mod registry;
mod sweeper;

pub mod presets;

pub use clock::{Clock, ManualClock, SystemClock};
pub use counter::{Admission, WindowState};
pub use decision::Decision;
pub use key::{ClientKey, KeyExtractor, PeerAddrKey};
pub use limiter::{FixedWindowLimiter, LimiterConfig};
pub use registry::LimiterRegistry;
pub use sweeper::EvictionSweeper;
