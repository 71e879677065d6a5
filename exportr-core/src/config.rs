//! Pipeline configuration

use std::path::Path;

use exportr_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Tuning knobs for a [`PipelineController`](crate::PipelineController).
///
/// All fields have working defaults; a TOML file can override any subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Broadcast capacity for published events.
    pub event_capacity: usize,
    /// Depth of the worker-to-controller message queue. Workers reporting
    /// progress faster than the controller drains it are held back here
    /// instead of buffering without bound.
    pub worker_queue_depth: usize,
    /// Depth of the caller command queue.
    pub command_queue_depth: usize,
    /// Minimum interval between re-published progress events, in
    /// milliseconds. 0 disables throttling; milestone events are never
    /// throttled either way.
    pub progress_throttle_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            event_capacity: 256,
            worker_queue_depth: 64,
            command_queue_depth: 8,
            progress_throttle_ms: 250,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file. Missing keys fall back to
    /// their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }
}
