//! Storage result types
//!
//! Defines result structures returned by storage operations.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;

/// One immediate child of a listed directory
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub name: String,
    pub size: u64,
    pub mod_time: DateTime<Local>,
    pub is_dir: bool,
    pub extension: String,
    /// Path relative to the storage root, reusable for download and delete
    pub path: String,
}

/// Result of a directory listing operation
#[derive(Debug, Clone)]
pub struct ListResult {
    pub entries: Vec<FileDescriptor>,
    /// Entries whose metadata could not be read
    pub skipped: usize,
}

/// Kind of entry removed by a delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    File,
    Directory,
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemType::File => write!(f, "file"),
            ItemType::Directory => write!(f, "directory"),
        }
    }
}

/// Result of a deletion operation
#[derive(Debug, Clone)]
pub struct DeleteResult {
    pub item_type: ItemType,
    pub name: String,
}
