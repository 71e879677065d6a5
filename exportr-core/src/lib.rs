//! # ExportR Core
//!
//! Two-phase sequential file-processing pipeline for ensemble recordings.
//!
//! Phase 1 analyzes an ordered batch of recording files one at a time and
//! accumulates a [`FileReport`](exportr_common::FileReport) per file.
//! Phase 2 exports the qualifying subset, again one file at a time. Both
//! phases publish progress and completion as
//! [`PipelineEvent`](exportr_common::PipelineEvent)s on a broadcast bus,
//! so callers observe everything without ever blocking on file I/O.
//!
//! The actual binary-format parsing and array writing are collaborator
//! concerns, injected through the [`FileAnalyzer`] and [`FileExporter`]
//! traits.

pub mod analyzer;
pub mod config;
pub mod exporter;
pub mod pipeline;

pub use analyzer::{AnalysisError, AnalysisProgress, FileAnalyzer};
pub use config::PipelineConfig;
pub use exporter::{ExportError, ExportProgress, FileExporter};
pub use pipeline::{PipelineController, PipelineError, PipelineHandle};
