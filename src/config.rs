// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Run configuration.
//!
//! Every optional field carries a documented default, resolved through an
//! accessor rather than at construction so the caller's intent (set vs.
//! unset) stays visible. Filtering in particular depends on whether patterns
//! were supplied at all.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{DownloadError, DownloadResult};
use crate::filter::FilterSpec;

/// Default hub endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

/// Revision used when none is given.
pub const DEFAULT_REVISION: &str = "main";

/// Default chunk size for streamed bodies (2 MB).
pub const DEFAULT_CHUNK_SIZE: usize = 2_000_000;

/// Bytes in one megabyte of `--chunk-limit`.
pub const BYTES_PER_MEGABYTE: f64 = 1_000_000.0;

/// Everything a single download run needs.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Repository id, e.g. `org/model`.
    pub repo_id: String,
    /// Branch or ref. Default: [`DEFAULT_REVISION`].
    pub revision: Option<String>,
    /// Destination directory. Default: last `/`-segment of the repo id.
    pub download_path: Option<PathBuf>,
    /// Bearer credential. Default: none (no `Authorization` header).
    pub token: Option<String>,
    /// Include patterns. Default: `["*"]`.
    pub include: Option<Vec<String>>,
    /// Exclude patterns. Default: `[]`.
    pub exclude: Option<Vec<String>>,
    /// Chunk size in megabytes. Default: [`DEFAULT_CHUNK_SIZE`] bytes.
    pub chunk_limit_mb: Option<f64>,
    /// Disable the empty-work-set and destination-exists checks.
    pub skip_checks: bool,
    /// Per-request timeout. Default: none.
    pub timeout: Option<Duration>,
    /// Hub base URL. Default: [`DEFAULT_ENDPOINT`].
    pub endpoint: String,
}

impl DownloadConfig {
    /// Create a configuration with every option at its default.
    pub fn new(repo_id: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
            revision: None,
            download_path: None,
            token: None,
            include: None,
            exclude: None,
            chunk_limit_mb: None,
            skip_checks: false,
            timeout: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn with_download_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.download_path = Some(path.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_include<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_chunk_limit_mb(mut self, megabytes: f64) -> Self {
        self.chunk_limit_mb = Some(megabytes);
        self
    }

    pub fn with_skip_checks(mut self, skip: bool) -> Self {
        self.skip_checks = skip;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Revision to list and resolve against.
    pub fn revision(&self) -> &str {
        self.revision.as_deref().unwrap_or(DEFAULT_REVISION)
    }

    /// Destination directory as given (not yet resolved to an absolute path).
    pub fn destination(&self) -> PathBuf {
        match &self.download_path {
            Some(path) => path.clone(),
            None => PathBuf::from(self.repo_id.rsplit('/').next().unwrap_or(&self.repo_id)),
        }
    }

    /// Chunk size in bytes: `ceil(mb * 1_000_000)`, or the default.
    pub fn chunk_size(&self) -> DownloadResult<usize> {
        match self.chunk_limit_mb {
            None => Ok(DEFAULT_CHUNK_SIZE),
            Some(mb) if mb.is_finite() && mb > 0.0 => Ok((mb * BYTES_PER_MEGABYTE).ceil() as usize),
            Some(mb) => Err(DownloadError::InvalidConfig(format!(
                "chunk limit must be a positive number of megabytes, got {}",
                mb
            ))),
        }
    }

    /// Compiled filter, or `None` when no patterns were supplied at all.
    ///
    /// `None` means the manifest passes through untouched.
    pub fn filter(&self) -> DownloadResult<Option<FilterSpec>> {
        let include = self.include.as_deref().unwrap_or_default();
        let exclude = self.exclude.as_deref().unwrap_or_default();
        if include.is_empty() && exclude.is_empty() {
            return Ok(None);
        }
        FilterSpec::new(include, exclude).map(Some)
    }

    /// Reject configurations that cannot possibly succeed.
    pub fn validate(&self) -> DownloadResult<()> {
        let repo = self.repo_id.trim();
        if repo.is_empty() || repo.ends_with('/') {
            return Err(DownloadError::InvalidConfig(format!(
                "'{}' is not a repository id",
                self.repo_id
            )));
        }
        if self.revision.as_deref().is_some_and(|r| r.trim().is_empty()) {
            return Err(DownloadError::InvalidConfig("revision must not be empty".into()));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(DownloadError::InvalidConfig("timeout must be at least one second".into()));
        }
        self.chunk_size()?;
        self.filter()?;
        Ok(())
    }
}
