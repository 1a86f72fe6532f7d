//! reeltext Common Utilities
//!
//! Shared infrastructure for all reeltext crates:
//! - Error taxonomy and result aliases
//! - Session clock and frame pacing
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
