//! Pipeline controller actor.
//!
//! The controller owns the canonical file list and report list and is the
//! only context that mutates them. Callers drive it through a cloneable
//! [`PipelineHandle`]; worker tasks report back over a bounded message
//! queue. The controller task multiplexes commands and worker messages
//! with `tokio::select!` and never suspends on file I/O itself; all
//! waiting happens inside the single worker of the active phase.
//!
//! # Example
//!
//! ```rust,ignore
//! let handle = PipelineController::spawn(analyzer, exporter, PipelineConfig::default());
//! let mut events = handle.subscribe();
//!
//! handle.start_analysis(files).await?;
//! // ... drain events until AnalysisComplete, inspect reports ...
//! handle.start_export().await?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use exportr_common::{EventBus, FileReport, PipelineEvent, PipelinePhase};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analyzer::{AnalysisError, AnalysisProgress, FileAnalyzer};
use crate::config::PipelineConfig;
use crate::exporter::{ExportError, ExportProgress, FileExporter};

use super::analysis::{AnalysisPipeline, Step};
use super::broadcaster::EventBroadcaster;
use super::export::{ExportJob, ExportPipeline, ExportStep};
use super::message::WorkerMsg;

/// Usage and sequencing errors surfaced by [`PipelineHandle`] calls.
///
/// These are the caller's mistakes, reported at the offending call; they
/// never disturb a batch already in progress. Per-file failures inside a
/// batch are not errors here; they arrive as
/// [`PipelineEvent::Error`] events.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A batch is running; wait for its completion event first.
    #[error("a batch is already in progress")]
    BatchInProgress,

    /// Export was requested but no analysis batch has completed.
    #[error("no completed analysis batch is available")]
    NoAnalysisYet,

    /// Analysis was requested with nothing to do.
    #[error("file list is empty")]
    EmptyBatch,

    /// A report is missing fields the export step needs.
    #[error("report for {file} is unusable: {detail}")]
    Consistency { file: String, detail: String },

    /// The controller task is gone; the handle is dead.
    #[error("pipeline controller is no longer running")]
    ControllerGone,
}

enum Phase {
    Idle,
    Analyzing(AnalysisPipeline),
    Exporting(ExportPipeline),
}

enum Command {
    StartAnalysis {
        files: Vec<PathBuf>,
        reply: oneshot::Sender<Result<Uuid, PipelineError>>,
    },
    StartExport {
        reply: oneshot::Sender<Result<Uuid, PipelineError>>,
    },
    Cancel,
    Shutdown,
}

/// Cloneable front door to a running [`PipelineController`].
#[derive(Clone)]
pub struct PipelineHandle {
    cmd_tx: mpsc::Sender<Command>,
    bus: EventBus,
}

impl PipelineHandle {
    /// Begin analyzing `files` in order.
    ///
    /// Discards any previously accumulated reports. Fails with
    /// [`PipelineError::BatchInProgress`] while either phase is running
    /// and with [`PipelineError::EmptyBatch`] for an empty list (a no-op:
    /// nothing is discarded, nothing is emitted). Returns the new batch
    /// id; completion is signalled by `AnalysisComplete` on the bus.
    pub async fn start_analysis(&self, files: Vec<PathBuf>) -> Result<Uuid, PipelineError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::StartAnalysis { files, reply })
            .await
            .map_err(|_| PipelineError::ControllerGone)?;
        rx.await.map_err(|_| PipelineError::ControllerGone)?
    }

    /// Export the qualifying subset of the last completed analysis batch.
    ///
    /// Fails with [`PipelineError::NoAnalysisYet`] until an analysis
    /// batch has run to completion, and with
    /// [`PipelineError::BatchInProgress`] while a batch is running. May
    /// be called again after `ExportComplete` to re-export the same
    /// reports.
    pub async fn start_export(&self) -> Result<Uuid, PipelineError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::StartExport { reply })
            .await
            .map_err(|_| PipelineError::ControllerGone)?;
        rx.await.map_err(|_| PipelineError::ControllerGone)?
    }

    /// Request cooperative cancellation of the running batch.
    ///
    /// The file currently in flight always finishes; the batch stops
    /// before the next file starts and `BatchCancelled` is published.
    /// Harmless when nothing is running.
    pub async fn cancel(&self) -> Result<(), PipelineError> {
        self.cmd_tx
            .send(Command::Cancel)
            .await
            .map_err(|_| PipelineError::ControllerGone)
    }

    /// Stop the controller task. In-flight workers are detached and
    /// their messages discarded.
    pub async fn shutdown(&self) -> Result<(), PipelineError> {
        self.cmd_tx
            .send(Command::Shutdown)
            .await
            .map_err(|_| PipelineError::ControllerGone)
    }

    /// Subscribe to pipeline events.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.bus.subscribe()
    }

    /// The bus events are published on.
    pub fn events(&self) -> &EventBus {
        &self.bus
    }
}

/// Drives the two-phase pipeline over injected collaborators.
///
/// One controller instance runs one batch at a time: never two analyze
/// workers, never two export workers, never an analyze and an export
/// worker together. The accumulated report list survives export so the
/// same analysis can be exported repeatedly; it is discarded when a new
/// analysis starts.
pub struct PipelineController {
    analyzer: Arc<dyn FileAnalyzer>,
    exporter: Arc<dyn FileExporter>,
    broadcaster: EventBroadcaster,
    cmd_rx: mpsc::Receiver<Command>,
    worker_tx: mpsc::Sender<WorkerMsg>,
    worker_rx: mpsc::Receiver<WorkerMsg>,
    phase: Phase,
    /// Reports of the last completed analysis batch, one per input file.
    reports: Option<Vec<FileReport>>,
    /// Id of the batch currently running (or last run).
    batch_id: Uuid,
    /// Cancellation flag for the current batch, checked between files.
    cancel: CancellationToken,
}

impl PipelineController {
    /// Build a controller publishing on an injected `bus`, plus its
    /// handle, without starting the actor task. Most callers want
    /// [`PipelineController::spawn`]; this form exists for sharing a bus
    /// with other publishers or embedding the controller in a
    /// caller-managed task set.
    pub fn new(
        analyzer: Arc<dyn FileAnalyzer>,
        exporter: Arc<dyn FileExporter>,
        config: PipelineConfig,
        bus: EventBus,
    ) -> (Self, PipelineHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_queue_depth);
        let (worker_tx, worker_rx) = mpsc::channel(config.worker_queue_depth);

        let handle = PipelineHandle {
            cmd_tx,
            bus: bus.clone(),
        };
        let controller = Self {
            analyzer,
            exporter,
            broadcaster: EventBroadcaster::new(bus, config.progress_throttle_ms),
            cmd_rx,
            worker_tx,
            worker_rx,
            phase: Phase::Idle,
            reports: None,
            batch_id: Uuid::nil(),
            cancel: CancellationToken::new(),
        };
        (controller, handle)
    }

    /// Build a controller with its own event bus, spawn its actor task,
    /// and return the handle.
    pub fn spawn(
        analyzer: Arc<dyn FileAnalyzer>,
        exporter: Arc<dyn FileExporter>,
        config: PipelineConfig,
    ) -> PipelineHandle {
        let bus = EventBus::new(config.event_capacity);
        let (controller, handle) = Self::new(analyzer, exporter, config, bus);
        tokio::spawn(controller.run());
        handle
    }

    /// Drive the controller until shutdown or until every handle is
    /// dropped.
    pub async fn run(mut self) {
        debug!("pipeline controller running");
        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => {
                        if !self.handle_command(cmd) {
                            break;
                        }
                    }
                    None => break,
                },
                Some(msg) = self.worker_rx.recv() => self.handle_worker(msg),
            }
        }
        debug!("pipeline controller stopped");
    }

    /// Returns false when the controller should stop.
    fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::StartAnalysis { files, reply } => {
                let _ = reply.send(self.start_analysis(files));
            }
            Command::StartExport { reply } => {
                let _ = reply.send(self.start_export());
            }
            Command::Cancel => {
                info!(batch_id = %self.batch_id, "cancellation requested");
                self.cancel.cancel();
            }
            Command::Shutdown => {
                info!("shutdown requested");
                return false;
            }
        }
        true
    }

    fn handle_worker(&mut self, msg: WorkerMsg) {
        if msg.batch_id() != self.batch_id {
            debug!("discarding worker message from superseded batch");
            return;
        }
        match msg {
            WorkerMsg::AnalysisProgressed {
                file_index,
                bytes_delta,
                total_bytes,
                ..
            } => self.on_analysis_progress(file_index, bytes_delta, total_bytes),
            WorkerMsg::AnalysisFinished {
                file_index, result, ..
            } => self.on_analysis_finished(file_index, result),
            WorkerMsg::ExportProgressed {
                file_index,
                ensemble_number,
                ..
            } => self.on_export_progress(file_index, ensemble_number),
            WorkerMsg::ExportFinished {
                file_index, result, ..
            } => self.on_export_finished(file_index, result),
        }
    }

    // ---- analysis phase --------------------------------------------------

    fn start_analysis(&mut self, files: Vec<PathBuf>) -> Result<Uuid, PipelineError> {
        if !matches!(self.phase, Phase::Idle) {
            return Err(PipelineError::BatchInProgress);
        }
        if files.is_empty() {
            debug!("analysis requested with an empty file list");
            return Err(PipelineError::EmptyBatch);
        }

        self.reports = None;
        self.batch_id = Uuid::new_v4();
        self.cancel = CancellationToken::new();

        let pipeline = AnalysisPipeline::new(files);
        info!(
            batch_id = %self.batch_id,
            files = pipeline.total(),
            "starting analysis batch"
        );
        self.broadcaster.emit_immediate(PipelineEvent::AnalysisStarted {
            batch_id: self.batch_id,
            file_count: pipeline.total(),
        });

        self.phase = Phase::Analyzing(pipeline);
        self.spawn_next_analysis();
        Ok(self.batch_id)
    }

    fn spawn_next_analysis(&self) {
        let Phase::Analyzing(pipeline) = &self.phase else {
            return;
        };
        let index = pipeline.current_index();
        let path = pipeline.current_file().to_path_buf();
        let analyzer = Arc::clone(&self.analyzer);
        let tx = self.worker_tx.clone();
        let batch_id = self.batch_id;

        debug!(
            batch_id = %batch_id,
            file = %path.display(),
            index,
            "spawning analysis worker"
        );
        tokio::spawn(async move {
            let progress = AnalysisProgress::new(batch_id, index, path.clone(), tx.clone());
            let result = analyzer.analyze(&path, &progress).await;
            let _ = tx
                .send(WorkerMsg::AnalysisFinished {
                    batch_id,
                    file_index: index,
                    result,
                })
                .await;
        });
    }

    fn on_analysis_progress(&mut self, file_index: usize, bytes_delta: u64, total_bytes: u64) {
        let Phase::Analyzing(pipeline) = &mut self.phase else {
            return;
        };
        if file_index != pipeline.current_index() {
            debug!(file_index, "stale analysis progress dropped");
            return;
        }

        let file_path = pipeline.current_file().display().to_string();
        if pipeline.record_size(total_bytes) {
            self.broadcaster.emit_immediate(PipelineEvent::FileSizeKnown {
                batch_id: self.batch_id,
                file_path: file_path.clone(),
                size_bytes: total_bytes,
            });
        }
        let bytes_read = pipeline.record_progress(bytes_delta);
        self.broadcaster.emit(PipelineEvent::FileProgress {
            batch_id: self.batch_id,
            file_path,
            bytes_read,
        });
    }

    fn on_analysis_finished(
        &mut self,
        file_index: usize,
        result: Result<FileReport, AnalysisError>,
    ) {
        let Phase::Analyzing(pipeline) = &mut self.phase else {
            debug!("analysis result arrived while not analyzing; dropped");
            return;
        };
        if file_index != pipeline.current_index() {
            debug!(file_index, "stale analysis result dropped");
            return;
        }

        let file_path = pipeline.current_file().to_path_buf();
        let report = match result {
            Ok(report) => {
                info!(
                    batch_id = %self.batch_id,
                    file = %file_path.display(),
                    ensembles = report.ensemble_count,
                    pairs = report.ensemble_pair_count,
                    "file analyzed"
                );
                report
            }
            Err(err) => {
                // One bad file never aborts the batch: record a zero-count
                // placeholder so the file is excluded from export.
                warn!(
                    batch_id = %self.batch_id,
                    file = %file_path.display(),
                    error = %err,
                    "analysis failed; recording empty report"
                );
                self.broadcaster.emit_immediate(PipelineEvent::Error {
                    batch_id: self.batch_id,
                    phase: PipelinePhase::Analysis,
                    file_path: file_path.display().to_string(),
                    message: err.to_string(),
                });
                FileReport::empty(&file_path)
            }
        };

        self.broadcaster.emit_immediate(PipelineEvent::FileAnalyzed {
            batch_id: self.batch_id,
            file_index,
            report: report.clone(),
        });

        match pipeline.record_report(report) {
            Step::Complete => {
                if let Phase::Analyzing(done) = std::mem::replace(&mut self.phase, Phase::Idle) {
                    let reports = done.into_reports();
                    info!(
                        batch_id = %self.batch_id,
                        files = reports.len(),
                        "analysis batch complete"
                    );
                    self.broadcaster.emit_immediate(PipelineEvent::AnalysisComplete {
                        batch_id: self.batch_id,
                        reports: reports.clone(),
                    });
                    self.reports = Some(reports);
                }
            }
            Step::Next(_) => {
                if self.cancel.is_cancelled() {
                    // A cancelled analysis is incomplete: its partial
                    // reports are not kept for export.
                    self.finish_cancelled(PipelinePhase::Analysis);
                } else {
                    self.spawn_next_analysis();
                }
            }
        }
    }

    // ---- export phase ----------------------------------------------------

    fn start_export(&mut self) -> Result<Uuid, PipelineError> {
        if !matches!(self.phase, Phase::Idle) {
            return Err(PipelineError::BatchInProgress);
        }
        let Some(reports) = self.reports.as_ref() else {
            return Err(PipelineError::NoAnalysisYet);
        };

        self.batch_id = Uuid::new_v4();
        self.cancel = CancellationToken::new();

        let pipeline = ExportPipeline::new(reports);
        info!(
            batch_id = %self.batch_id,
            eligible = pipeline.total(),
            skipped = reports.len() - pipeline.total(),
            "starting export batch"
        );
        self.broadcaster.emit_immediate(PipelineEvent::ExportStarted {
            batch_id: self.batch_id,
            file_count: pipeline.total(),
        });

        let batch_id = self.batch_id;
        self.phase = Phase::Exporting(pipeline);
        self.advance_export();
        Ok(batch_id)
    }

    /// Spawn the worker for the next eligible report, surfacing per-file
    /// consistency errors along the way, or finish the phase when the
    /// eligible list is exhausted.
    fn advance_export(&mut self) {
        loop {
            let step = match &mut self.phase {
                Phase::Exporting(pipeline) => pipeline.next_job(),
                _ => return,
            };
            match step {
                ExportStep::Complete => {
                    info!(batch_id = %self.batch_id, "export batch complete");
                    self.broadcaster.emit_immediate(PipelineEvent::ExportComplete {
                        batch_id: self.batch_id,
                    });
                    self.phase = Phase::Idle;
                    return;
                }
                _ if self.cancel.is_cancelled() => {
                    self.finish_cancelled(PipelinePhase::Export);
                    return;
                }
                ExportStep::Skip { file_index, file_path } => {
                    let err = PipelineError::Consistency {
                        file: file_path.display().to_string(),
                        detail: "missing ensemble delta time".to_string(),
                    };
                    warn!(
                        batch_id = %self.batch_id,
                        file = %file_path.display(),
                        file_index,
                        "skipping export: {err}"
                    );
                    self.broadcaster.emit_immediate(PipelineEvent::Error {
                        batch_id: self.batch_id,
                        phase: PipelinePhase::Export,
                        file_path: file_path.display().to_string(),
                        message: err.to_string(),
                    });
                }
                ExportStep::Run(job) => {
                    self.spawn_export_worker(job);
                    return;
                }
            }
        }
    }

    fn spawn_export_worker(&self, job: ExportJob) {
        let exporter = Arc::clone(&self.exporter);
        let tx = self.worker_tx.clone();
        let batch_id = self.batch_id;
        let ExportJob {
            file_index,
            file_path,
            range,
            delta,
        } = job;

        debug!(
            batch_id = %batch_id,
            file = %file_path.display(),
            ensembles = range.len(),
            "spawning export worker"
        );
        tokio::spawn(async move {
            let progress = ExportProgress::new(batch_id, file_index, file_path.clone(), tx.clone());
            let result = exporter.export(&file_path, range, delta, &progress).await;
            let _ = tx
                .send(WorkerMsg::ExportFinished {
                    batch_id,
                    file_index,
                    result,
                })
                .await;
        });
    }

    fn on_export_progress(&mut self, file_index: usize, ensemble_number: u64) {
        let Phase::Exporting(pipeline) = &mut self.phase else {
            return;
        };
        if file_index != pipeline.current_index() {
            debug!(file_index, "stale export progress dropped");
            return;
        }

        let ensembles_done = pipeline.record_progress();
        let file_path = pipeline.current_path().display().to_string();
        self.broadcaster.emit(PipelineEvent::ExportProgress {
            batch_id: self.batch_id,
            file_path,
            ensemble_number,
            ensembles_done,
        });
    }

    fn on_export_finished(&mut self, file_index: usize, result: Result<(), ExportError>) {
        let Phase::Exporting(pipeline) = &mut self.phase else {
            debug!("export result arrived while not exporting; dropped");
            return;
        };
        if file_index != pipeline.current_index() {
            debug!(file_index, "stale export result dropped");
            return;
        }

        let file_path = pipeline.current_path().display().to_string();
        match result {
            Ok(()) => {
                info!(batch_id = %self.batch_id, file = %file_path, "file exported");
                self.broadcaster.emit_immediate(PipelineEvent::FileExported {
                    batch_id: self.batch_id,
                    file_index,
                    file_path,
                });
            }
            Err(err) => {
                warn!(
                    batch_id = %self.batch_id,
                    file = %file_path,
                    error = %err,
                    "export failed; continuing with next file"
                );
                self.broadcaster.emit_immediate(PipelineEvent::Error {
                    batch_id: self.batch_id,
                    phase: PipelinePhase::Export,
                    file_path,
                    message: err.to_string(),
                });
            }
        }

        pipeline.advance();
        self.advance_export();
    }

    // ---- shared ----------------------------------------------------------

    fn finish_cancelled(&mut self, phase: PipelinePhase) {
        info!(batch_id = %self.batch_id, %phase, "batch cancelled");
        self.broadcaster.emit_immediate(PipelineEvent::BatchCancelled {
            batch_id: self.batch_id,
            phase,
        });
        self.phase = Phase::Idle;
    }
}
