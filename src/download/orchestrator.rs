// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Run orchestration: list, filter, prepare, transfer, and clean up.

use std::sync::Arc;
use std::time::Instant;

use colored::Colorize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::destination::Destination;
use super::progress::ProgressSink;
use super::types::{RunOutcome, RunState, RunSummary};
use super::worker::{transfer, TransferTask};
use crate::config::DownloadConfig;
use crate::error::{DownloadError, DownloadResult};
use crate::filter::select_work_set;
use crate::hub::{fetch_manifest, HubClient, ManifestSource};
use crate::utils::mask_sensitive;

/// Why the transfer phase stopped early.
enum Interruption {
    Failed(DownloadError),
    Cancelled,
}

/// Drives one download run from listing to a terminal state.
///
/// A `Downloader` runs once; later calls to [`run`](Self::run) are rejected.
pub struct Downloader<S: ManifestSource> {
    config: DownloadConfig,
    source: Arc<S>,
    progress: Arc<dyn ProgressSink>,
    state: RunState,
    notices: bool,
}

impl Downloader<HubClient> {
    /// Downloader backed by the hub named in `config.endpoint`.
    pub fn for_hub(config: DownloadConfig, progress: Arc<dyn ProgressSink>) -> Self {
        let hub = HubClient::new(config.endpoint.clone()).with_timeout(config.timeout);
        Self::new(config, Arc::new(hub), progress)
    }
}

impl<S: ManifestSource> Downloader<S> {
    pub fn new(config: DownloadConfig, source: Arc<S>, progress: Arc<dyn ProgressSink>) -> Self {
        Self {
            config,
            source,
            progress,
            state: RunState::Idle,
            notices: true,
        }
    }

    /// Print "Saving to" / "Starting download" notices on stdout (default on).
    pub fn with_notices(mut self, notices: bool) -> Self {
        self.notices = notices;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    fn transition(&mut self, next: RunState) {
        tracing::debug!(from = ?self.state, to = ?next, "Run state change");
        self.state = next;
    }

    /// Execute the run.
    ///
    /// Returns `Ok(RunOutcome::Cancelled)` when `cancel` fires; that is a
    /// clean exit, not an error. On any error or cancellation during the
    /// transfer phase everything this run created under the destination is
    /// removed before this returns. The progress sink is stopped on every
    /// path.
    pub async fn run(&mut self, cancel: CancellationToken) -> DownloadResult<RunOutcome> {
        if self.state != RunState::Idle {
            return Err(DownloadError::InvalidConfig(format!(
                "downloader already ran (state {:?})",
                self.state
            )));
        }

        let result = self.execute(&cancel).await;
        self.progress.stop();

        let terminal = match &result {
            Ok(RunOutcome::Succeeded(_)) => RunState::Succeeded,
            Ok(RunOutcome::Cancelled) => RunState::Cancelled,
            Err(_) => RunState::Failed,
        };
        self.transition(terminal);

        match &result {
            Ok(RunOutcome::Succeeded(summary)) => {
                tracing::info!(files = summary.files, bytes = summary.bytes, "Run succeeded")
            }
            Ok(RunOutcome::Cancelled) => tracing::warn!("Run cancelled"),
            Err(e) => tracing::error!(error = %e, "Run failed"),
        }
        result
    }

    async fn execute(&mut self, cancel: &CancellationToken) -> DownloadResult<RunOutcome> {
        let config = self.config.clone();
        config.validate()?;
        let chunk_size = config.chunk_size()?;
        let filter = config.filter()?;

        tracing::debug!(
            repo = %config.repo_id,
            revision = config.revision(),
            token = ?config.token.as_deref().map(|t| mask_sensitive(t, 5)),
            chunk_size,
            "Starting run"
        );

        self.transition(RunState::Listing);
        let listing = fetch_manifest(
            self.source.clone(),
            &config.repo_id,
            config.revision(),
            config.token.as_deref(),
        );
        let entries = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(RunOutcome::Cancelled),
            listed = listing => listed?,
        };
        tracing::info!(files = entries.len(), "Fetched manifest");

        self.transition(RunState::Filtering);
        let work_set = select_work_set(&config.repo_id, entries, filter.as_ref(), config.skip_checks)?;

        self.transition(RunState::Preparing);
        let destination = Arc::new(Destination::prepare(&config.destination(), config.skip_checks).await?);
        if self.notices {
            println!("{} {}", "Saving to".cyan(), destination.root().display());
        }

        self.transition(RunState::Transferring);
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| DownloadError::InvalidConfig(format!("HTTP client setup failed: {}", e)))?;

        if self.notices {
            println!("{} {}", "Starting download for".cyan(), config.repo_id.bold());
        }

        let started = Instant::now();
        let mut workers = JoinSet::new();
        for entry in work_set {
            let task = TransferTask {
                entry,
                destination: destination.clone(),
                chunk_size,
                token: config.token.clone(),
                progress: self.progress.clone(),
            };
            let client = client.clone();
            workers.spawn(async move { transfer(&client, task).await });
        }
        let files = workers.len();

        let mut bytes = 0u64;
        let interruption = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Some(Interruption::Cancelled),
                joined = workers.join_next() => match joined {
                    None => break None,
                    Some(Ok(Ok(written))) => bytes += written,
                    Some(Ok(Err(e))) => break Some(Interruption::Failed(e)),
                    Some(Err(e)) => {
                        break Some(Interruption::Failed(DownloadError::transfer(
                            "<worker>",
                            format!("worker task failed: {}", e),
                        )))
                    }
                },
            }
        };

        let Some(cause) = interruption else {
            return Ok(RunOutcome::Succeeded(RunSummary {
                destination: destination.root().to_path_buf(),
                files,
                bytes,
                elapsed: started.elapsed(),
            }));
        };

        // Siblings may still hold open files; stop them before deleting.
        workers.abort_all();
        while workers.join_next().await.is_some() {}

        if let Err(e) = destination.discard().await {
            tracing::error!(
                root = %destination.root().display(),
                error = %e,
                "Failed to remove destination after interrupted run"
            );
        }

        match cause {
            Interruption::Cancelled => Ok(RunOutcome::Cancelled),
            Interruption::Failed(e) => Err(e),
        }
    }
}
