//! Utility modules for the price oracle.
//!
//! - Time sources
//! - Constants and defaults

pub mod clock;
pub mod constants;

pub use clock::*;
pub use constants::*;
