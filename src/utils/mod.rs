//! Utility functions
//!
//! Provides human-readable formatting for sizes and transfer speeds.

pub mod format;

pub use format::{format_size, format_speed};
