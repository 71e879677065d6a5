//! One-way messages from worker tasks to the controller.

use exportr_common::FileReport;
use uuid::Uuid;

use crate::analyzer::AnalysisError;
use crate::exporter::ExportError;

/// Message a worker task sends back to the controller's execution
/// context.
///
/// Workers never mutate controller state; these messages are their only
/// channel back. Each carries the batch id the worker was spawned under
/// so the controller can discard leftovers from a superseded batch. A
/// worker always sends its `*Finished` message last, which with FIFO
/// delivery guarantees that progress for file i never trails file i's
/// completion.
#[derive(Debug)]
pub(crate) enum WorkerMsg {
    /// A chunk of bytes was consumed while analyzing a file.
    AnalysisProgressed {
        batch_id: Uuid,
        file_index: usize,
        bytes_delta: u64,
        total_bytes: u64,
    },

    /// One file's analysis terminated, successfully or not.
    AnalysisFinished {
        batch_id: Uuid,
        file_index: usize,
        result: Result<FileReport, AnalysisError>,
    },

    /// One ensemble was consumed while exporting a file.
    ExportProgressed {
        batch_id: Uuid,
        file_index: usize,
        ensemble_number: u64,
    },

    /// One file's export terminated, successfully or not.
    ExportFinished {
        batch_id: Uuid,
        file_index: usize,
        result: Result<(), ExportError>,
    },
}

impl WorkerMsg {
    pub(crate) fn batch_id(&self) -> Uuid {
        match self {
            WorkerMsg::AnalysisProgressed { batch_id, .. }
            | WorkerMsg::AnalysisFinished { batch_id, .. }
            | WorkerMsg::ExportProgressed { batch_id, .. }
            | WorkerMsg::ExportFinished { batch_id, .. } => *batch_id,
        }
    }
}
