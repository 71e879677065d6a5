//! # ExportR Common Library
//!
//! Shared code for the ExportR crates including:
//! - Analysis report types (`FileReport`)
//! - Event types (`PipelineEvent` enum) and the `EventBus`
//! - Common error types
//! - Time formatting helpers

pub mod error;
pub mod events;
pub mod human_time;
pub mod report;

pub use error::{Error, Result};
pub use events::{EventBus, PipelineEvent, PipelinePhase};
pub use report::{EnsembleRange, FileReport};
