//! Export phase state machine.

use std::path::PathBuf;
use std::time::Duration;

use exportr_common::{EnsembleRange, FileReport};

/// Next unit of work the export phase wants.
#[derive(Debug)]
pub(crate) enum ExportStep {
    /// Spawn a worker for this job.
    Run(ExportJob),
    /// The report at the cursor lacked fields the exporter needs; it was
    /// skipped and the cursor already advanced past it.
    Skip { file_index: usize, file_path: PathBuf },
    /// No eligible work remains.
    Complete,
}

/// Everything a worker needs to export one file.
#[derive(Debug, Clone)]
pub(crate) struct ExportJob {
    /// Position of the file in the analysis report list.
    pub file_index: usize,
    pub file_path: PathBuf,
    pub range: EnsembleRange,
    pub delta: Duration,
}

/// Sequential export over the qualifying analysis reports.
///
/// The input is filtered once at construction: only reports with a
/// positive effective ensemble count take part. Zero-count reports are
/// dropped silently, with no event of any kind, preserving the relative
/// order of the rest. Each retained entry remembers its index in the
/// full report list so published events line up with analysis events.
#[derive(Debug)]
pub(crate) struct ExportPipeline {
    eligible: Vec<(usize, FileReport)>,
    cursor: usize,
    ensembles_done: u64,
}

impl ExportPipeline {
    pub fn new(reports: &[FileReport]) -> Self {
        let eligible = reports
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_exportable())
            .map(|(i, r)| (i, r.clone()))
            .collect();
        Self {
            eligible,
            cursor: 0,
            ensembles_done: 0,
        }
    }

    /// Number of eligible files.
    pub fn total(&self) -> usize {
        self.eligible.len()
    }

    /// Report-list index of the file in flight.
    pub fn current_index(&self) -> usize {
        self.eligible[self.cursor].0
    }

    /// Path of the file in flight.
    pub fn current_path(&self) -> &PathBuf {
        &self.eligible[self.cursor].1.file_path
    }

    /// Produce the next unit of work.
    ///
    /// A report without a delta time cannot be exported; `next_job`
    /// advances past it and reports the skip so the caller can surface a
    /// per-file error without stalling the batch. [`ExportStep::Run`]
    /// leaves the cursor in place until [`ExportPipeline::advance`].
    pub fn next_job(&mut self) -> ExportStep {
        let Some((file_index, report)) = self.eligible.get(self.cursor) else {
            return ExportStep::Complete;
        };
        match report.delta_time {
            Some(delta) => ExportStep::Run(ExportJob {
                file_index: *file_index,
                file_path: report.file_path.clone(),
                range: report.export_range(),
                delta,
            }),
            None => {
                let step = ExportStep::Skip {
                    file_index: *file_index,
                    file_path: report.file_path.clone(),
                };
                self.advance();
                step
            }
        }
    }

    /// Count one ensemble processed in the current file; returns the
    /// per-file running total.
    pub fn record_progress(&mut self) -> u64 {
        self.ensembles_done += 1;
        self.ensembles_done
    }

    /// Move past the file in flight.
    pub fn advance(&mut self) {
        self.cursor += 1;
        self.ensembles_done = 0;
    }
}
