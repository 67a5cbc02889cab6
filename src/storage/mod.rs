//! File system storage management
//!
//! Handles path containment, directory listing and deletion under the
//! storage root.

pub mod operations;
pub mod results;
pub mod validation;

pub use operations::{delete_entry, list_directory, stat_target};
pub use results::{DeleteResult, FileDescriptor, ItemType, ListResult};
pub use validation::{PathGuard, validate_filename};
