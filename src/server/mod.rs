//! Server core functionality
//!
//! Router construction and the listener lifecycle.

pub mod core;

pub use core::{Server, build_router};
