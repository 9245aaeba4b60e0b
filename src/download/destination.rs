// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Destination directory lifecycle.
//!
//! A run only ever deletes what it created. When the destination did not
//! exist beforehand the whole tree belongs to the run. When it did (only
//! possible with checks skipped), every directory and file a worker creates
//! is written to a ledger and only those are removed.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use crate::error::{DownloadError, DownloadResult};
use crate::sync::resilient_lock;

/// Who brought the destination into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationOrigin {
    /// Absent at preparation time; created lazily by the first worker.
    CreatedByRun,
    /// Already present at preparation time.
    PreExisting,
}

/// A prepared destination directory.
#[derive(Debug)]
pub struct Destination {
    root: PathBuf,
    origin: DestinationOrigin,
    /// Paths created by this run, in creation order.
    ledger: Mutex<Vec<PathBuf>>,
}

impl Destination {
    /// Resolve `path` to an absolute path and run the pre-flight checks.
    ///
    /// Creates the parent directory if needed. With `skip_checks == false`
    /// an existing file or directory at `path` is a
    /// [`DownloadError::DestinationExists`], raised before anything is
    /// created.
    pub async fn prepare(path: &Path, skip_checks: bool) -> DownloadResult<Self> {
        let root = std::path::absolute(path).map_err(|source| DownloadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let exists = tokio::fs::try_exists(&root)
            .await
            .map_err(|source| DownloadError::Io {
                path: root.clone(),
                source,
            })?;

        if exists && !skip_checks {
            return Err(DownloadError::DestinationExists { path: path.to_path_buf() });
        }

        if let Some(parent) = root.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| DownloadError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let origin = if exists {
            DestinationOrigin::PreExisting
        } else {
            DestinationOrigin::CreatedByRun
        };
        tracing::debug!(root = %root.display(), ?origin, "Destination prepared");

        Ok(Self {
            root,
            origin,
            ledger: Mutex::new(Vec::new()),
        })
    }

    /// Absolute destination root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn origin(&self) -> DestinationOrigin {
        self.origin
    }

    /// Local path for a manifest filename.
    ///
    /// Rejects names that would escape the root (`..`, absolute paths,
    /// drive prefixes) or that name the root itself.
    pub fn resolve(&self, filename: &str) -> DownloadResult<PathBuf> {
        let relative = Path::new(filename);
        let mut normal = 0;
        for component in relative.components() {
            match component {
                Component::Normal(_) => normal += 1,
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(DownloadError::UnsafePath {
                        filename: filename.to_string(),
                    });
                }
            }
        }
        if normal == 0 {
            return Err(DownloadError::UnsafePath {
                filename: filename.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }

    /// Create the missing parent directories of `file`, recording the
    /// outermost one this call brings into existence.
    pub async fn create_parent_dirs(&self, file: &Path) -> std::io::Result<()> {
        let Some(parent) = file.parent() else {
            return Ok(());
        };

        let mut outermost_missing = None;
        for ancestor in parent.ancestors() {
            if !ancestor.starts_with(&self.root) {
                break;
            }
            if tokio::fs::try_exists(ancestor).await? {
                break;
            }
            outermost_missing = Some(ancestor.to_path_buf());
        }

        if let Some(dir) = outermost_missing {
            self.record(dir);
        }
        tokio::fs::create_dir_all(parent).await
    }

    /// Record a path created by this run.
    pub fn record(&self, path: PathBuf) {
        resilient_lock(&self.ledger).push(path);
    }

    /// Paths recorded so far.
    pub fn created_paths(&self) -> Vec<PathBuf> {
        resilient_lock(&self.ledger).clone()
    }

    /// Remove everything this run created.
    ///
    /// Must only be called once no worker can touch the tree anymore.
    pub async fn discard(&self) -> std::io::Result<()> {
        match self.origin {
            DestinationOrigin::CreatedByRun => {
                tracing::info!(root = %self.root.display(), "Removing destination");
                remove_path(&self.root).await
            }
            DestinationOrigin::PreExisting => {
                let created = std::mem::take(&mut *resilient_lock(&self.ledger));
                tracing::info!(
                    root = %self.root.display(),
                    paths = created.len(),
                    "Removing paths created in pre-existing destination"
                );
                for path in created.iter().rev() {
                    remove_path(path).await?;
                }
                Ok(())
            }
        }
    }
}

/// Remove a file or directory tree; a missing path is not an error.
async fn remove_path(path: &Path) -> std::io::Result<()> {
    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    let result = if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };
    match result {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
