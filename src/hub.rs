// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Repository manifest retrieval.
//!
//! The listing API is consumed through a blocking client, so
//! [`fetch_manifest`] offloads the whole call onto tokio's blocking pool. The
//! blocking client owns an internal runtime and must never be created or
//! dropped on an async worker thread, which is why [`HubClient`] builds it
//! inside [`ManifestSource::list_files`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hfdl::hub::{fetch_manifest, HubClient};
//!
//! # async fn example() -> Result<(), hfdl::DownloadError> {
//! let hub = Arc::new(HubClient::new("https://huggingface.co"));
//! let entries = fetch_manifest(hub, "openai-community/gpt2", "main", None).await?;
//! for entry in &entries {
//!     println!("{} -> {}", entry.filename, entry.url);
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{DownloadError, DownloadResult};

/// Default timeout for connection setup (in seconds).
const CONNECTION_TIMEOUT_SECS: u64 = 10;

/// One downloadable file of a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoEntry {
    /// Path relative to the repository root, `/`-separated.
    pub filename: String,
    /// Absolute URL the file body is streamed from.
    pub url: String,
}

impl RepoEntry {
    pub fn new(filename: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            url: url.into(),
        }
    }
}

/// A repository listing service.
///
/// Both methods are synchronous; callers go through [`fetch_manifest`].
pub trait ManifestSource: Send + Sync + 'static {
    /// List every file of `repo_id` at `revision`, in service order.
    fn list_files(
        &self,
        repo_id: &str,
        revision: &str,
        token: Option<&str>,
    ) -> DownloadResult<Vec<String>>;

    /// Resolve the download URL of one listed file.
    fn file_url(&self, repo_id: &str, revision: &str, filename: &str) -> String;
}

/// Internal response structure for the repository info API.
#[derive(Debug, Deserialize)]
struct RepoInfoResponse {
    #[serde(default)]
    siblings: Vec<Sibling>,
}

#[derive(Debug, Deserialize)]
struct Sibling {
    rfilename: String,
}

/// Client for the Hugging Face hub HTTP API.
#[derive(Debug, Clone)]
pub struct HubClient {
    /// Base URL, without trailing slash.
    endpoint: String,
    /// Whole-request timeout for the listing call.
    timeout: Option<Duration>,
}

impl HubClient {
    /// Create a client for `endpoint` (e.g. `https://huggingface.co`).
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            timeout: None,
        }
    }

    /// Set a whole-request timeout for the listing call.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the base URL of the hub.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn info_url(&self, repo_id: &str, revision: &str) -> String {
        format!(
            "{}/api/models/{}/revision/{}",
            self.endpoint,
            repo_id,
            urlencoding::encode(revision)
        )
    }
}

impl ManifestSource for HubClient {
    fn list_files(
        &self,
        repo_id: &str,
        revision: &str,
        token: Option<&str>,
    ) -> DownloadResult<Vec<String>> {
        let mut builder = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECTION_TIMEOUT_SECS));
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| DownloadError::listing(repo_id, format!("HTTP client setup failed: {}", e)))?;

        let url = self.info_url(repo_id, revision);
        tracing::debug!(%url, authenticated = token.is_some(), "Listing repository");

        let mut request = client.get(&url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .map_err(|e| DownloadError::listing(repo_id, format!("request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(DownloadError::listing(
                repo_id,
                format!("authentication rejected ({})", status),
            ));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DownloadError::listing(
                repo_id,
                format!("repository or revision '{}' not found", revision),
            ));
        }
        if !status.is_success() {
            return Err(DownloadError::listing(repo_id, format!("hub returned {}", status)));
        }

        let info: RepoInfoResponse = response
            .json()
            .map_err(|e| DownloadError::listing(repo_id, format!("malformed listing: {}", e)))?;

        Ok(info.siblings.into_iter().map(|s| s.rfilename).collect())
    }

    fn file_url(&self, repo_id: &str, revision: &str, filename: &str) -> String {
        let path: Vec<String> = filename
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!(
            "{}/{}/resolve/{}/{}",
            self.endpoint,
            repo_id,
            urlencoding::encode(revision),
            path.join("/")
        )
    }
}

/// Fetch the manifest of `repo_id` off the async scheduler.
///
/// Exactly one blocking call per invocation; a panic in the listing task is
/// reported as a listing failure.
pub async fn fetch_manifest<S: ManifestSource>(
    source: Arc<S>,
    repo_id: &str,
    revision: &str,
    token: Option<&str>,
) -> DownloadResult<Vec<RepoEntry>> {
    let repo = repo_id.to_string();
    let rev = revision.to_string();
    let token = token.map(str::to_string);

    tokio::task::spawn_blocking(move || {
        let files = source.list_files(&repo, &rev, token.as_deref())?;
        Ok(files
            .into_iter()
            .map(|filename| {
                let url = source.file_url(&repo, &rev, &filename);
                RepoEntry { filename, url }
            })
            .collect())
    })
    .await
    .map_err(|e| DownloadError::listing(repo_id, format!("listing task failed: {}", e)))?
}
