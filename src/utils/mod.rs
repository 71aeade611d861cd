//! Formatting helpers for the build summary

use std::time::Duration;

const SIZE_UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Format a bundle size as human-readable text
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < SIZE_UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }

    match unit {
        0 => format!("{} B", bytes),
        _ => format!("{:.2} {}", value, SIZE_UNITS[unit]),
    }
}

/// Format a build duration
pub fn format_duration(duration: Duration) -> String {
    match duration.as_millis() {
        millis @ 0..=999 => format!("{}ms", millis),
        1_000..=59_999 => format!("{:.2}s", duration.as_secs_f64()),
        _ => {
            let secs = duration.as_secs_f64();
            format!("{}m {:.2}s", (secs / 60.0) as u64, secs % 60.0)
        }
    }
}
