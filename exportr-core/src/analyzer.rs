//! Analysis collaborator interface.
//!
//! The pipeline never parses recordings itself; it hands each file to an
//! injected [`FileAnalyzer`] and trusts the returned
//! [`FileReport`](exportr_common::FileReport). Byte progress flows back
//! through the [`AnalysisProgress`] sink, which forwards one-way messages
//! to the controller's own task; the analyzer never touches controller
//! state directly.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use exportr_common::FileReport;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::pipeline::message::WorkerMsg;

/// Failures an analysis collaborator can surface for a single file.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Source file could not be opened.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file opened but its leading structure is not a recording.
    #[error("malformed header in {path}: {detail}")]
    MalformedHeader { path: PathBuf, detail: String },

    /// The file ends mid-ensemble.
    #[error("truncated recording {path}: expected {expected} bytes, found {found}")]
    Truncated {
        path: PathBuf,
        expected: u64,
        found: u64,
    },

    /// The file has no content at all.
    #[error("{path} is empty")]
    EmptyFile { path: PathBuf },

    /// Anything else the collaborator wants to report.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Byte-progress sink handed to an analyzer for one file.
///
/// The sink carries the identity of the file it reports for, so reports
/// stay unambiguous when files are analyzed back to back. It is cheap to
/// clone and safe to use from any task or thread; messages are delivered
/// to the controller in send order.
#[derive(Debug, Clone)]
pub struct AnalysisProgress {
    batch_id: Uuid,
    file_index: usize,
    file_path: PathBuf,
    tx: mpsc::Sender<WorkerMsg>,
}

impl AnalysisProgress {
    pub(crate) fn new(
        batch_id: Uuid,
        file_index: usize,
        file_path: PathBuf,
        tx: mpsc::Sender<WorkerMsg>,
    ) -> Self {
        Self {
            batch_id,
            file_index,
            file_path,
            tx,
        }
    }

    /// Report a chunk of bytes consumed from the source file.
    ///
    /// `delta` is the size of the chunk just read, not a running total;
    /// `total` is the file size in bytes. Call this once per I/O chunk,
    /// not per record. Sends are ignored once the batch is superseded.
    pub async fn bytes_read(&self, delta: u64, total: u64) {
        tracing::trace!(
            file = %self.file_path.display(),
            delta,
            total,
            "analysis progress"
        );
        let _ = self
            .tx
            .send(WorkerMsg::AnalysisProgressed {
                batch_id: self.batch_id,
                file_index: self.file_index,
                bytes_delta: delta,
                total_bytes: total,
            })
            .await;
    }

    /// Identity of the file this sink reports for.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

/// Analysis collaborator: inspects one recording file and produces its
/// [`FileReport`].
///
/// Implementations read the file, count ensembles and ensemble pairs,
/// derive the time span and inter-ensemble delta, and report byte
/// progress through the sink as they go. Access must be read-only; the
/// only side effect permitted is the progress sink.
#[async_trait]
pub trait FileAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        path: &Path,
        progress: &AnalysisProgress,
    ) -> Result<FileReport, AnalysisError>;
}
