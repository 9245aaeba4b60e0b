// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Single-file transfer.
//!
//! A worker streams one manifest entry to disk in fixed-size chunks and
//! advances its progress task after every chunk. It never cleans up after
//! itself: on failure the orchestrator discards the whole destination.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use super::destination::Destination;
use super::progress::ProgressSink;
use crate::error::{DownloadError, DownloadResult};
use crate::hub::RepoEntry;

/// Everything one worker needs. Owned exclusively by that worker.
pub struct TransferTask {
    pub entry: RepoEntry,
    pub destination: Arc<Destination>,
    /// Positive chunk size in bytes.
    pub chunk_size: usize,
    pub token: Option<String>,
    pub progress: Arc<dyn ProgressSink>,
}

/// Regroups network frames of arbitrary size into chunks of exactly
/// `chunk_size` bytes; only the final chunk may be shorter.
#[derive(Debug)]
pub struct ChunkAssembler {
    chunk_size: usize,
    pending: BytesMut,
}

impl ChunkAssembler {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            pending: BytesMut::new(),
        }
    }

    /// Feed one frame, returning every chunk it completes.
    pub fn push(&mut self, mut frame: Bytes) -> Vec<Bytes> {
        let mut ready = Vec::new();
        while !frame.is_empty() {
            if self.pending.is_empty() && frame.len() >= self.chunk_size {
                ready.push(frame.split_to(self.chunk_size));
                continue;
            }
            let take = (self.chunk_size - self.pending.len()).min(frame.len());
            self.pending.extend_from_slice(&frame.split_to(take));
            if self.pending.len() == self.chunk_size {
                ready.push(self.pending.split().freeze());
            }
        }
        ready
    }

    /// Remaining bytes once the stream is exhausted.
    pub fn finish(mut self) -> Option<Bytes> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.split().freeze())
        }
    }
}

/// Download one entry. Returns the number of bytes written.
pub async fn transfer(client: &reqwest::Client, task: TransferTask) -> DownloadResult<u64> {
    let TransferTask {
        entry,
        destination,
        chunk_size,
        token,
        progress,
    } = task;
    let filename = entry.filename.as_str();

    let path = destination.resolve(filename)?;
    destination
        .create_parent_dirs(&path)
        .await
        .map_err(|e| DownloadError::transfer(filename, format!("cannot create directory: {}", e)))?;

    let mut request = client.get(&entry.url);
    if let Some(token) = token.as_deref() {
        request = request.bearer_auth(token);
    }

    let response = request
        .send()
        .await
        .map_err(|e| DownloadError::transfer(filename, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::transfer(filename, format!("server returned {}", status)));
    }

    let total = response.content_length();
    let task = progress.add_task(&format!("Downloading {}", filename), total);
    tracing::debug!(filename, ?total, chunk_size, "Transfer started");

    // Only paths this run brings into existence are claimed, and they are
    // claimed before the create starts.
    let existed = tokio::fs::try_exists(&path)
        .await
        .map_err(|e| DownloadError::transfer(filename, format!("cannot inspect {}: {}", path.display(), e)))?;
    if !existed {
        destination.record(path.clone());
    }
    let mut file = tokio::fs::File::create(&path)
        .await
        .map_err(|e| DownloadError::transfer(filename, format!("cannot create {}: {}", path.display(), e)))?;

    let mut assembler = ChunkAssembler::new(chunk_size);
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(frame) = stream.next().await {
        let frame = frame.map_err(|e| DownloadError::transfer(filename, format!("stream error: {}", e)))?;
        for chunk in assembler.push(frame) {
            written += write_chunk(&mut file, &chunk, filename).await?;
            progress.advance(task, chunk.len() as u64);
        }
    }
    if let Some(chunk) = assembler.finish() {
        written += write_chunk(&mut file, &chunk, filename).await?;
        progress.advance(task, chunk.len() as u64);
    }

    file.flush()
        .await
        .map_err(|e| DownloadError::transfer(filename, format!("flush failed: {}", e)))?;

    tracing::debug!(filename, written, "Transfer finished");
    Ok(written)
}

async fn write_chunk(file: &mut tokio::fs::File, chunk: &[u8], filename: &str) -> DownloadResult<u64> {
    file.write_all(chunk)
        .await
        .map_err(|e| DownloadError::transfer(filename, format!("write failed: {}", e)))?;
    Ok(chunk.len() as u64)
}
