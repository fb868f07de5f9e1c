//! Human-readable sizes and durations

use std::time::Duration;

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;
const GB: u64 = 1024 * MB;

/// `512B`, `1.5KB`, `12.0MB`, `1.1GB`.
pub fn format_size(size: u64) -> String {
    if size >= GB {
        format!("{:.1}GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.1}MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.1}KB", size as f64 / KB as f64)
    } else {
        format!("{}B", size)
    }
}

/// Signed variant for size differences.
pub fn format_size_delta(before: u64, after: u64) -> String {
    if after > before {
        format!("-{}", format_size(after - before))
    } else {
        format_size(before - after)
    }
}

/// `850ms`, `12s`, `3min 5s`, `2min`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    if millis >= 60_000 {
        let minutes = millis / 60_000;
        let seconds = (millis % 60_000) / 1000;
        if seconds > 0 {
            format!("{}min {}s", minutes, seconds)
        } else {
            format!("{}min", minutes)
        }
    } else if millis >= 1000 {
        format!("{}s", millis / 1000)
    } else {
        format!("{}ms", millis)
    }
}
