// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::ffi::OsString;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use hfdl::config::{DownloadConfig, DEFAULT_ENDPOINT};
use hfdl::download::{Downloader, ProgressSink, RunOutcome, TallyProgress, TerminalProgress};
use hfdl::DownloadError;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit codes not tied to a specific [`DownloadError`].
mod exit_codes {
    /// Success, including a user-initiated cancellation
    pub const SUCCESS: i32 = 0;
    /// General error - unspecified error
    pub const ERROR: i32 = 1;
    /// Second Ctrl+C while cleanup is still running
    pub const INTERRUPTED: i32 = 130;
}

/// hfdl - Asynchronous Hugging Face downloader.
#[derive(Parser, Debug)]
#[command(name = "hfdl")]
#[command(version = VERSION)]
#[command(about = "Asynchronous Hugging Face downloader")]
#[command(long_about = "hfdl - Asynchronous Hugging Face downloader\n\n\
    Whole repository:     hfdl openai-community/gpt2\n\
    Only safetensors:     hfdl org/model -i '*.safetensors' '*.json'\n\
    Private repository:   hfdl org/private -t <token>\n\
    Into a given folder:  hfdl org/model -p models/my-model\n\n\
    Files download concurrently. If any file fails, or you press Ctrl+C,\n\
    everything this run created is removed.")]
struct Cli {
    /// Repo ID from huggingface (e.g. org/model)
    repo_id: String,

    /// Branch in the repo to use (default: main)
    #[arg(short = 'r', long)]
    revision: Option<String>,

    /// Folder name for the model (default: last part of the repo ID)
    #[arg(short = 'p', long = "download-path", value_name = "PATH")]
    download_path: Option<PathBuf>,

    /// HuggingFace token for private repos
    #[arg(short = 't', long, env = "HF_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Glob patterns of files to include (matched against the full path)
    #[arg(short = 'i', long, num_args = 0.., value_name = "PATTERN")]
    include: Option<Vec<String>>,

    /// Glob patterns of files to exclude (matched against the full path)
    #[arg(short = 'e', long, num_args = 0.., value_name = "PATTERN")]
    exclude: Option<Vec<String>>,

    /// Override the max limit for download chunks in MB
    #[arg(short = 'c', long = "chunk-limit", value_name = "MB")]
    chunk_limit: Option<f64>,

    /// Skips all sanity checks such as checking if the destination directory exists (also -sc)
    #[arg(long = "skip-checks")]
    skip_checks: bool,

    /// Optional request timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Hub endpoint to list and download from
    #[arg(long, env = "HF_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Quiet mode: no progress bars or notices, errors only
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode: debug logging on stderr
    #[arg(short = 'v', long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> DownloadConfig {
        let mut config = DownloadConfig::new(self.repo_id)
            .with_endpoint(self.endpoint)
            .with_skip_checks(self.skip_checks);
        config.revision = self.revision;
        config.download_path = self.download_path;
        config.token = self.token;
        config.include = self.include;
        config.exclude = self.exclude;
        config.chunk_limit_mb = self.chunk_limit;
        config.timeout = self.timeout.map(Duration::from_secs);
        config
    }
}

/// Rewrite the two-letter `-sc` flag, which clap cannot express as a short
/// option, into its long form.
fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| if arg == "-sc" { OsString::from("--skip-checks") } else { arg })
        .collect()
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else if quiet {
        tracing::Level::ERROR
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

async fn download(config: DownloadConfig, quiet: bool) -> Result<()> {
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("Received Ctrl+C, cancelling downloads");
        signal_token.cancel();

        // The handler stays installed, so a second press must exit explicitly
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(exit_codes::INTERRUPTED);
        }
    });

    let progress: Arc<dyn ProgressSink> = if quiet {
        Arc::new(TallyProgress::new())
    } else {
        Arc::new(TerminalProgress::new())
    };

    let repo_id = config.repo_id.clone();
    let mut downloader = Downloader::for_hub(config, progress).with_notices(!quiet);

    match downloader.run(cancel).await? {
        RunOutcome::Succeeded(summary) => {
            if !quiet {
                println!(
                    "{} {} ({})",
                    "Finished download for".green(),
                    repo_id.bold(),
                    summary.describe()
                );
            }
        }
        RunOutcome::Cancelled => {}
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let quiet = cli.quiet;
    let config = cli.into_config();

    // One event loop for every transfer; the listing call uses the blocking pool
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;
    run_detached(runtime, download(config, quiet))
}

/// Drive `future` to completion, then shut the runtime down without waiting
/// for blocking-pool tasks. A listing call abandoned by cancellation may
/// still be in flight and has no upper bound without `--timeout`.
fn run_detached<F: Future>(runtime: tokio::runtime::Runtime, future: F) -> F::Output {
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    output
}

/// Print an error report and pick the exit code.
fn report_failure(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<DownloadError>() {
        Some(download_err) => {
            eprintln!("{}", download_err.report());
            download_err.exit_code()
        }
        None => {
            eprintln!("{} {:#}", "[✗]".red(), err);
            exit_codes::ERROR
        }
    }
}

fn main() {
    let cli = Cli::parse_from(normalize_args(std::env::args_os()));
    init_logging(cli.verbose, cli.quiet);

    let code = match run(cli) {
        Ok(()) => exit_codes::SUCCESS,
        Err(err) => report_failure(&err),
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let argv = std::iter::once("hfdl").chain(args.iter().copied()).map(OsString::from);
        Cli::try_parse_from(normalize_args(argv)).unwrap()
    }

    #[test]
    fn test_short_skip_checks_flag() {
        assert!(parse(&["org/model", "-sc"]).skip_checks);
        assert!(parse(&["org/model", "--skip-checks"]).skip_checks);
        assert!(!parse(&["org/model"]).skip_checks);
    }

    #[test]
    fn test_full_argument_surface() {
        let cli = parse(&[
            "org/model", "-r", "dev", "-p", "out/dir", "-c", "1.5", "--timeout", "30",
            "-e", "*.md", "-i", "*.bin", "*.json",
        ]);
        let config = cli.into_config();

        assert_eq!(config.repo_id, "org/model");
        assert_eq!(config.revision(), "dev");
        assert_eq!(config.destination(), PathBuf::from("out/dir"));
        assert_eq!(config.chunk_size().unwrap(), 1_500_000);
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.include, Some(vec!["*.bin".to_string(), "*.json".to_string()]));
        assert_eq!(config.exclude, Some(vec!["*.md".to_string()]));
    }

    #[test]
    fn test_defaults_leave_filters_unset() {
        let config = parse(&["org/model"]).into_config();
        assert!(config.include.is_none());
        assert!(config.exclude.is_none());
        assert!(config.filter().unwrap().is_none());
        assert_eq!(config.destination(), PathBuf::from("model"));
    }

    #[test]
    fn test_include_without_values() {
        let cli = parse(&["org/model", "-i"]);
        assert_eq!(cli.include, Some(Vec::new()));
    }

    #[test]
    fn test_shutdown_does_not_wait_for_abandoned_blocking_work() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let started = std::time::Instant::now();

        let value = run_detached(runtime, async {
            let stalled = tokio::task::spawn_blocking(|| std::thread::sleep(Duration::from_secs(5)));
            tokio::select! {
                _ = stalled => 0,
                _ = tokio::time::sleep(Duration::from_millis(50)) => 7,
            }
        });

        assert_eq!(value, 7);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let argv = ["hfdl", "org/model", "-q", "-v"].map(OsString::from);
        assert!(Cli::try_parse_from(argv).is_err());
    }
}
