// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! hfdl - concurrent Hugging Face repository downloader
//!
//! Fetches the file manifest of a hub repository, filters it with
//! shell-style globs, and downloads every selected file in parallel with
//! live progress. A failed or interrupted run removes what it created.
//!
//! # Core Modules
//!
//! - [`hub`] - Manifest listing and URL resolution
//! - [`filter`] - Include/exclude glob filtering
//! - [`download`] - Destination guard, transfer workers, progress, orchestration
//! - [`config`] - Run configuration and defaults
//! - [`error`] - Error taxonomy and user-facing reports

pub mod config;
pub mod download;
pub mod error;
pub mod filter;
pub mod hub;
pub mod sync;
pub mod utils;

pub use config::DownloadConfig;
pub use download::{Downloader, RunOutcome, RunState, RunSummary};
pub use error::{DownloadError, DownloadResult};
pub use filter::FilterSpec;
pub use hub::{HubClient, ManifestSource, RepoEntry};
pub use utils::mask_sensitive;
