//! Append-only JSONL index writer.
//!
//! A single task owns the index file exclusively and serializes all
//! appends; workers hold clone-cheap sender handles. This removes any
//! need for file locking while keeping one-line-per-record ordering under
//! concurrent writers. A write failure is logged loudly but never aborts
//! the crawl — a missing index entry is preferable to crawl failure.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, error};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::record::IndexRecord;

const CHANNEL_CAPACITY: usize = 256;

/// Handle for appending records to the crawl's index file.
///
/// Cheap to clone; all clones feed the same writer task. The task exits
/// (flushing anything buffered) once every handle has been dropped; the
/// scheduler then joins the returned task handle.
#[derive(Debug, Clone)]
pub struct IndexWriter {
    tx: mpsc::Sender<IndexRecord>,
}

impl IndexWriter {
    /// Open `path` in append/create mode and spawn the writer task.
    pub async fn spawn(path: &Path) -> Result<(Self, JoinHandle<()>)> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("failed to open index file {}", path.display()))?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let task = tokio::spawn(writer_loop(file, rx, path.to_path_buf()));
        Ok((Self { tx }, task))
    }

    /// Enqueue a record for appending.
    ///
    /// If the writer task is gone the record is dropped and logged at
    /// error severity; the crawl itself continues.
    pub async fn append(&self, record: IndexRecord) {
        if self.tx.send(record).await.is_err() {
            error!(
                target: "docmirror::index",
                "index writer task is gone; record dropped"
            );
        }
    }
}

async fn writer_loop(
    mut file: tokio::fs::File,
    mut rx: mpsc::Receiver<IndexRecord>,
    path: PathBuf,
) {
    let mut written = 0usize;
    while let Some(record) = rx.recv().await {
        let mut line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                error!(
                    target: "docmirror::index",
                    "failed to serialize index record for {}: {e}",
                    record.canonical_url
                );
                continue;
            }
        };
        line.push('\n');
        if let Err(e) = file.write_all(line.as_bytes()).await {
            error!(
                target: "docmirror::index",
                "failed to append index record to {}: {e}",
                path.display()
            );
            continue;
        }
        if let Err(e) = file.flush().await {
            error!(
                target: "docmirror::index",
                "failed to flush index file {}: {e}",
                path.display()
            );
        }
        written += 1;
    }
    debug!(
        target: "docmirror::index",
        "index writer finished after {written} records: {}",
        path.display()
    );
}
