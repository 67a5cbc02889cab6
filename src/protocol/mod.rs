//! HTTP protocol layer
//!
//! Request handlers and the JSON response envelope.

pub mod handlers;
pub mod responses;

pub use handlers::{AppState, PathQuery};
pub use responses::{ApiResponse, DeletedItem, ErrorBody};
