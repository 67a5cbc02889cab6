//! Human-readable formatting
//!
//! Scales byte counts and speeds at 1024-byte boundaries.

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Formats a speed in bytes per second, e.g. `12.34 MB/s`
pub fn format_speed(bytes_per_sec: f64) -> String {
    if bytes_per_sec < KIB {
        format!("{:.0} B/s", bytes_per_sec)
    } else if bytes_per_sec < MIB {
        format!("{:.2} KB/s", bytes_per_sec / KIB)
    } else if bytes_per_sec < GIB {
        format!("{:.2} MB/s", bytes_per_sec / MIB)
    } else {
        format!("{:.2} GB/s", bytes_per_sec / GIB)
    }
}

/// Formats a byte count, e.g. `1.50 KB`
pub fn format_size(bytes: u64) -> String {
    let value = bytes as f64;
    if value < KIB {
        format!("{} B", bytes)
    } else if value < MIB {
        format!("{:.2} KB", value / KIB)
    } else if value < GIB {
        format!("{:.2} MB", value / MIB)
    } else {
        format!("{:.2} GB", value / GIB)
    }
}
