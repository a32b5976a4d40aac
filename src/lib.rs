//! Floodgate - Fixed-Window Request Rate Limiting
//!
//! This crate implements a per-client fixed-window rate limiting engine and a
//! small decision service around it. An HTTP layer hands the engine a client
//! key and the current time and gets back an admit/reject decision with the
//! remaining quota and the window's reset time.

pub mod config;
pub mod error;
pub mod ratelimit;
pub mod wire;
