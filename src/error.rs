// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error taxonomy and user-facing error reports for hfdl.
//!
//! [`DownloadError`] is the typed failure every stage of a run can produce.
//! Cancellation is deliberately absent: an interrupted run ends with
//! [`RunOutcome::Cancelled`](crate::download::RunOutcome::Cancelled).
//!
//! [`format_error`] and [`ErrorBuilder`] turn an error into an actionable
//! message with possible causes and suggested fixes.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Hint shown at the bottom of every error report.
pub const DETAILS_HINT: &str = "Run again with --verbose for request-level details.";

/// Result alias used throughout the library.
pub type DownloadResult<T> = std::result::Result<T, DownloadError>;

/// Every way a download run can fail.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The repository listing call failed.
    #[error("failed to list files for {repo_id}: {reason}")]
    RemoteListing { repo_id: String, reason: String },

    /// Include/exclude filters removed every file from the manifest.
    #[error("file list for repo {repo_id} is empty. Check your filters?")]
    EmptyWorkSet { repo_id: String },

    /// The destination already exists and checks are enabled.
    #[error("the path {} already exists. Remove the folder and try again", .path.display())]
    DestinationExists { path: PathBuf },

    /// A single file transfer failed (status, network or disk).
    #[error("failed to download {filename}: {reason}")]
    Transfer { filename: String, reason: String },

    /// A manifest entry would resolve outside the destination directory.
    #[error("refusing to write {filename}: path escapes the destination directory")]
    UnsafePath { filename: String },

    /// A glob pattern could not be compiled.
    #[error("invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The configuration was rejected before any work started.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Filesystem failure outside of a specific transfer.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    /// Build a transfer error for `filename` from any displayable cause.
    pub fn transfer(filename: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Transfer {
            filename: filename.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a listing error for `repo_id` from any displayable cause.
    pub fn listing(repo_id: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::RemoteListing {
            repo_id: repo_id.into(),
            reason: reason.to_string(),
        }
    }

    /// Process exit code following sysexits.h conventions.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidConfig(_) => 64,
            Self::EmptyWorkSet { .. } | Self::InvalidPattern { .. } => 65,
            Self::RemoteListing { .. } => 69,
            Self::DestinationExists { .. } => 73,
            Self::Transfer { .. } | Self::UnsafePath { .. } | Self::Io { .. } => 74,
        }
    }

    /// Render this error as a report with causes and fixes.
    pub fn report(&self) -> String {
        let builder = ErrorBuilder::new(self.to_string());
        match self {
            Self::RemoteListing { .. } => builder
                .cause("Repository id or revision is misspelled")
                .cause("The repository is private or gated")
                .cause("No network connection to the hub")
                .fix("Check the id on the hub website")
                .fix("Pass a token: hfdl <repo> --token <token>"),
            Self::EmptyWorkSet { .. } => builder
                .cause("Include patterns match no file")
                .cause("Exclude patterns remove every file")
                .fix("Patterns match the full relative path, e.g. '*.safetensors'")
                .fix("Bypass the check: hfdl <repo> -sc"),
            Self::DestinationExists { .. } => builder
                .fix("Remove the folder and run again")
                .fix("Choose another folder: hfdl <repo> -p <path>")
                .fix("Download into it anyway: hfdl <repo> -sc"),
            Self::Transfer { .. } => builder
                .cause("Connection dropped or timed out")
                .cause("Token lacks access to this file")
                .cause("Disk is full or not writable")
                .fix("Run the command again; partial files were removed"),
            _ => builder,
        }
        .build()
    }
}

/// Formats an error message with a title, possible causes and suggested fixes.
///
/// # Example
///
/// ```
/// use hfdl::error::format_error;
///
/// let error = format_error(
///     "Failed to list files for org/model",
///     &["Repository is private"],
///     &["Pass a token with --token"],
/// );
/// assert!(error.contains("Possible causes:"));
/// ```
pub fn format_error(title: &str, causes: &[&str], fixes: &[&str]) -> String {
    let mut output = String::new();

    output.push_str(&format!("[✗] {}\n\n", title));

    if !causes.is_empty() {
        output.push_str("Possible causes:\n");
        for cause in causes {
            output.push_str(&format!("  - {}\n", cause));
        }
        output.push('\n');
    }

    if !fixes.is_empty() {
        output.push_str("Try these fixes:\n");
        for (i, fix) in fixes.iter().enumerate() {
            output.push_str(&format!("  {}. {}\n", i + 1, fix));
        }
        output.push('\n');
    }

    output.push_str(DETAILS_HINT);

    output
}

/// Builder for constructing formatted error messages.
#[derive(Debug, Clone)]
pub struct ErrorBuilder {
    title: String,
    causes: Vec<String>,
    fixes: Vec<String>,
}

impl ErrorBuilder {
    /// Create a new error builder with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            causes: Vec::new(),
            fixes: Vec::new(),
        }
    }

    /// Add a possible cause.
    pub fn cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    /// Add a suggested fix.
    pub fn fix(mut self, fix: impl Into<String>) -> Self {
        self.fixes.push(fix.into());
        self
    }

    /// Build the formatted error message.
    pub fn build(self) -> String {
        let causes: Vec<&str> = self.causes.iter().map(|s| s.as_str()).collect();
        let fixes: Vec<&str> = self.fixes.iter().map(|s| s.as_str()).collect();
        format_error(&self.title, &causes, &fixes)
    }
}

impl fmt::Display for ErrorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.clone().build())
    }
}
