//! Error handling
//!
//! Defines error types and their translation into HTTP failure responses.

pub mod handlers;
pub mod types;

pub use handlers::{client_message, error_to_status, handle_error};
pub use types::*;
