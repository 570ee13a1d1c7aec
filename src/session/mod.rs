//! Recognition session management
//!
//! This module provides the `SessionController` abstraction that manages:
//! - The Idle/Active session lifecycle around the capture and recognition
//!   capabilities
//! - Teardown on stop, error, final result, and lost availability
//! - The two published observable fields (transcript, processing flag)
//! - Session statistics

mod config;
mod controller;
mod stats;

pub use config::SessionConfig;
pub use controller::{SessionController, UNAVAILABLE_MESSAGE};
pub use stats::SessionStats;
