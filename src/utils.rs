// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Utility functions for hfdl.

use std::time::Duration;

/// Mask a sensitive string (like access tokens) for logging.
///
/// Shows only the first `visible_prefix` characters and replaces the rest
/// with "...". Inputs no longer than the prefix are hidden entirely.
///
/// # Examples
///
/// ```
/// use hfdl::utils::mask_sensitive;
///
/// let token = "hf_abcdefghijklmnopqrstuvwxyz";
/// assert_eq!(mask_sensitive(token, 5), "hf_ab...");
/// ```
pub fn mask_sensitive(input: &str, visible_prefix: usize) -> String {
    if input.chars().count() <= visible_prefix {
        return "...".to_string();
    }

    let prefix: String = input.chars().take(visible_prefix).collect();
    format!("{}...", prefix)
}

/// Human-readable byte count (binary units).
pub fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_073_741_824 {
        format!("{:.1} GB", bytes as f64 / 1_073_741_824.0)
    } else if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}

/// Human-readable duration, e.g. `1h 2m`, `3m 4s`, `5s`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}
