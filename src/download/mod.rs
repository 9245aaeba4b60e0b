// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Concurrent repository download.
//!
//! One worker per file, all sharing a connection pool and a progress sink.
//! The first failure (or a cancellation signal) aborts every sibling and
//! removes whatever the run created, so an unsuccessful run never leaves a
//! half-populated destination behind.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐
//! │ Downloader      │────▶│ fetch_manifest  │  (blocking pool)
//! │ (state machine) │     └────────┬────────┘
//! └────────┬────────┘              ▼
//!          │              ┌─────────────────┐
//!          │              │ select_work_set │
//!          │              └─────────────────┘
//!          ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ JoinSet of      │────▶│ Destination     │
//! │ transfer()      │     │ (ledger/discard)│
//! └────────┬────────┘     └─────────────────┘
//!          ▼
//! ┌─────────────────┐
//! │ ProgressSink    │
//! └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hfdl::config::DownloadConfig;
//! use hfdl::download::{Downloader, RunOutcome, TerminalProgress};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), hfdl::DownloadError> {
//! let config = DownloadConfig::new("openai-community/gpt2").with_include(["*.json"]);
//! let mut downloader = Downloader::for_hub(config, Arc::new(TerminalProgress::new()));
//!
//! match downloader.run(CancellationToken::new()).await? {
//!     RunOutcome::Succeeded(summary) => println!("{}", summary.describe()),
//!     RunOutcome::Cancelled => {}
//! }
//! # Ok(())
//! # }
//! ```

pub mod destination;
pub mod orchestrator;
pub mod progress;
pub mod types;
pub mod worker;

pub use destination::{Destination, DestinationOrigin};
pub use orchestrator::Downloader;
pub use progress::{ProgressSink, TallyProgress, TaskHandle, TerminalProgress};
pub use types::{RunOutcome, RunState, RunSummary};
pub use worker::{transfer, ChunkAssembler, TransferTask};
