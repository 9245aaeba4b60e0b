// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Run state and outcome types.

use std::path::PathBuf;
use std::time::Duration;

use crate::utils::{format_bytes, format_duration};

/// Stage of a download run.
///
/// `Idle → Listing → Filtering → Preparing → Transferring`, ending in
/// exactly one of `Succeeded`, `Failed` or `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Listing,
    Filtering,
    Preparing,
    Transferring,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunState {
    /// Returns true once the run can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed | RunState::Cancelled)
    }
}

/// Totals of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Absolute destination root.
    pub destination: PathBuf,
    /// Number of files transferred.
    pub files: usize,
    /// Bytes written across all files.
    pub bytes: u64,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Average throughput in bytes per second, if any time elapsed.
    pub fn bytes_per_second(&self) -> Option<u64> {
        let secs = self.elapsed.as_secs_f64();
        (secs > 0.0).then(|| (self.bytes as f64 / secs) as u64)
    }

    /// One-line human description, e.g. `3 files, 1.2 GB in 2m 5s`.
    pub fn describe(&self) -> String {
        let noun = if self.files == 1 { "file" } else { "files" };
        let mut line = format!(
            "{} {}, {} in {}",
            self.files,
            noun,
            format_bytes(self.bytes),
            format_duration(self.elapsed)
        );
        if let Some(bps) = self.bytes_per_second() {
            line.push_str(&format!(" ({}/s)", format_bytes(bps)));
        }
        line
    }
}

/// How a run ended without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every file was written; the destination is left intact.
    Succeeded(RunSummary),
    /// Interrupted by the cancellation signal; everything the run created
    /// has been removed.
    Cancelled,
}
