// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Progress reporting shared by all transfer workers.

use std::sync::RwLock;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::sync::{resilient_read, resilient_write};

/// Opaque handle to one progress task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(usize);

/// A sink for per-file byte counts.
///
/// Called concurrently from every worker; implementations must keep each
/// task's counter consistent under interleaved updates.
pub trait ProgressSink: Send + Sync {
    /// Register a task. `total` is `None` when the size is unknown.
    fn add_task(&self, label: &str, total: Option<u64>) -> TaskHandle;

    /// Advance a task by `delta` bytes.
    fn advance(&self, task: TaskHandle, delta: u64);

    /// Release display resources. Called exactly once per run.
    fn stop(&self);
}

/// Live multi-bar display on stderr.
pub struct TerminalProgress {
    multi: MultiProgress,
    bars: RwLock<Vec<ProgressBar>>,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::stderr()),
            bars: RwLock::new(Vec::new()),
        }
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg:40!} [{bar:30.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec} {eta}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░")
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg:40!} {bytes} {bytes_per_sec}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for TerminalProgress {
    fn add_task(&self, label: &str, total: Option<u64>) -> TaskHandle {
        let bar = match total {
            Some(total) => ProgressBar::new(total).with_style(Self::bar_style()),
            None => ProgressBar::new_spinner().with_style(Self::spinner_style()),
        };
        let bar = self.multi.add(bar);
        bar.set_message(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        let mut bars = resilient_write(&self.bars);
        bars.push(bar);
        TaskHandle(bars.len() - 1)
    }

    fn advance(&self, task: TaskHandle, delta: u64) {
        if let Some(bar) = resilient_read(&self.bars).get(task.0) {
            bar.inc(delta);
            if bar.length().is_some_and(|len| bar.position() >= len) {
                bar.finish();
            }
        }
    }

    fn stop(&self) {
        for bar in resilient_read(&self.bars).iter() {
            if !bar.is_finished() {
                bar.abandon();
            }
        }
    }
}

/// Snapshot of one task recorded by [`TallyProgress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTally {
    pub label: String,
    pub total: Option<u64>,
    pub position: u64,
    /// Number of `advance` calls that reached this task.
    pub updates: u64,
}

/// Headless sink that only counts. Used by `--quiet` and by tests.
#[derive(Debug, Default)]
pub struct TallyProgress {
    tasks: RwLock<Vec<TaskTally>>,
    stopped: RwLock<bool>,
}

impl TallyProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every task registered so far.
    pub fn tasks(&self) -> Vec<TaskTally> {
        resilient_read(&self.tasks).clone()
    }

    /// Sum of all positions.
    pub fn total_bytes(&self) -> u64 {
        resilient_read(&self.tasks).iter().map(|t| t.position).sum()
    }

    pub fn is_stopped(&self) -> bool {
        *resilient_read(&self.stopped)
    }
}

impl ProgressSink for TallyProgress {
    fn add_task(&self, label: &str, total: Option<u64>) -> TaskHandle {
        let mut tasks = resilient_write(&self.tasks);
        tasks.push(TaskTally {
            label: label.to_string(),
            total,
            position: 0,
            updates: 0,
        });
        TaskHandle(tasks.len() - 1)
    }

    fn advance(&self, task: TaskHandle, delta: u64) {
        if let Some(tally) = resilient_write(&self.tasks).get_mut(task.0) {
            tally.position += delta;
            tally.updates += 1;
        }
    }

    fn stop(&self) {
        *resilient_write(&self.stopped) = true;
    }
}
