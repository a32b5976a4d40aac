//! JSON-lines decision service.
//!
//! A thin TCP front for a [`LimiterRegistry`](crate::ratelimit::LimiterRegistry):
//! an HTTP layer asks for a decision per inbound request and translates a
//! rejection into its own 429 response.

mod server;
mod service;

pub mod protocol;

pub use protocol::{CheckRequest, CheckResponse};
pub use server::DecisionServer;
pub use service::DecisionService;
