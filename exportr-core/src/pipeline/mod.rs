//! Two-phase sequential file-processing pipeline.
//!
//! # Architecture
//!
//! ```text
//! caller ──commands──▶ PipelineController (actor task)
//!                        │        ▲
//!                        │ spawns │ WorkerMsg (bounded mpsc, FIFO)
//!                        ▼        │
//!                  one worker task at a time
//!                  (FileAnalyzer / FileExporter)
//!
//! PipelineController ──PipelineEvent──▶ EventBus ──▶ subscribers
//! ```
//!
//! Each phase is an explicit state machine (`AnalysisPipeline`,
//! `ExportPipeline`) that the controller advances only when a worker's
//! completion message arrives, so exactly one worker is alive per phase
//! at any instant. Workers own no shared state; everything they know
//! flows back as one-way `WorkerMsg`s processed in receipt order on the
//! controller's task.

mod analysis;
mod broadcaster;
mod controller;
mod export;
pub(crate) mod message;

pub use broadcaster::EventBroadcaster;
pub use controller::{PipelineController, PipelineError, PipelineHandle};
