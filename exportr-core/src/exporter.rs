//! Export collaborator interface.
//!
//! Mirrors the analysis side: the pipeline supplies the source path, the
//! ensemble range derived from the file's report, and the inter-ensemble
//! delta; the injected [`FileExporter`] converts the recording into the
//! target array format and ticks the [`ExportProgress`] sink once per
//! ensemble consumed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use exportr_common::EnsembleRange;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::pipeline::message::WorkerMsg;

/// Failures an export collaborator can surface for a single file.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Source recording could not be re-read.
    #[error("failed to re-read source {path}: {source}")]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Target file could not be written (disk full, permissions, partial
    /// write).
    #[error("failed to write target for {path}: {source}")]
    TargetWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Anything else the collaborator wants to report.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Per-ensemble progress sink handed to an exporter for one file.
#[derive(Debug, Clone)]
pub struct ExportProgress {
    batch_id: Uuid,
    file_index: usize,
    file_path: PathBuf,
    tx: mpsc::Sender<WorkerMsg>,
}

impl ExportProgress {
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

    /// Report one ensemble consumed. `ensemble_number` is the sequence
    /// number embedded in the ensemble when present, else 0.
    pub async fn ensemble(&self, ensemble_number: u64) {
        tracing::trace!(
            file = %self.file_path.display(),
            ensemble_number,
            "export progress"
        );
        let _ = self
            .tx
            .send(WorkerMsg::ExportProgressed {
                batch_id: self.batch_id,
                file_index: self.file_index,
                ensemble_number,
            })
            .await;
    }

    /// Identity of the file this sink reports for.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

/// Export collaborator: converts one recording into the target array
/// format.
///
/// `range` bounds the ensembles to convert and `delta` is the time step
/// to embed in the output. A failed export may leave a partial target
/// behind; the pipeline reports the failure and moves on without
/// cleaning up, matching the retry model (the caller re-submits the
/// single file).
#[async_trait]
pub trait FileExporter: Send + Sync {
    async fn export(
        &self,
        path: &Path,
        range: EnsembleRange,
        delta: Duration,
        progress: &ExportProgress,
    ) -> Result<(), ExportError>;
}
