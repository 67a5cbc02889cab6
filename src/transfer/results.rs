//! Transfer result types
//!
//! Defines result structures returned by transfer operations.

use serde::Serialize;
use std::fmt;

/// Throughput summary reported alongside a finished transfer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedInfo {
    /// Bytes per second over the whole transfer
    pub average_speed: f64,
    /// Bytes per second since the last sample
    pub current_speed: f64,
    pub total_bytes: u64,
    pub duration: String,
    pub speed_text: String,
}

/// How the uploaded file content was read from the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    /// The whole form fit under the memory threshold
    Buffered,
    /// The first multipart part was read straight off the request body
    Streaming,
}

impl fmt::Display for UploadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadMode::Buffered => write!(f, "buffered"),
            UploadMode::Streaming => write!(f, "streaming"),
        }
    }
}

/// Result of a completed upload
#[derive(Debug, Clone)]
pub struct UploadResult {
    pub filename: String,
    pub mode: UploadMode,
    pub speed: SpeedInfo,
}
