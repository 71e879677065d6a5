//! Event types for the ExportR pipeline
//!
//! Provides the shared `PipelineEvent` definitions and the `EventBus` the
//! controller publishes through. A presentation layer subscribes to one
//! stream and never needs to know which phase produced an event.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::report::FileReport;

/// Which phase of the pipeline an event originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Analysis,
    Export,
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelinePhase::Analysis => write!(f, "analysis"),
            PipelinePhase::Export => write!(f, "export"),
        }
    }
}

/// Events published while a batch moves through the pipeline.
///
/// Every variant carries the id of the batch it belongs to, so observers
/// can correlate events across overlapping subscriptions and discard
/// leftovers from a superseded batch.
///
/// Ordering guarantees, per file: `FileSizeKnown` (at most once) precedes
/// every `FileProgress`, progress totals never decrease, and the file's
/// completion event arrives after all of its progress events and before
/// any event of the next file.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// An analysis batch began.
    AnalysisStarted { batch_id: Uuid, file_count: usize },

    /// The size of the file currently being analyzed became known.
    FileSizeKnown {
        batch_id: Uuid,
        file_path: String,
        size_bytes: u64,
    },

    /// Bytes consumed so far from the file currently being analyzed.
    /// `bytes_read` is a running total, reset for each file.
    FileProgress {
        batch_id: Uuid,
        file_path: String,
        bytes_read: u64,
    },

    /// One file finished analysis. Emitted exactly once per input file,
    /// in input order, with a zero-count report when the analysis failed.
    FileAnalyzed {
        batch_id: Uuid,
        file_index: usize,
        report: FileReport,
    },

    /// The whole batch finished analysis; carries one report per input file.
    AnalysisComplete {
        batch_id: Uuid,
        reports: Vec<FileReport>,
    },

    /// An export batch began. `file_count` counts eligible files only.
    ExportStarted { batch_id: Uuid, file_count: usize },

    /// One ensemble was consumed during export. `ensemble_number` is the
    /// sequence number embedded in the ensemble (0 when absent);
    /// `ensembles_done` counts ensembles processed in the current file.
    ExportProgress {
        batch_id: Uuid,
        file_path: String,
        ensemble_number: u64,
        ensembles_done: u64,
    },

    /// One file finished exporting. `file_index` is the file's position
    /// in the analysis report list.
    FileExported {
        batch_id: Uuid,
        file_index: usize,
        file_path: String,
    },

    /// The whole export batch finished.
    ExportComplete { batch_id: Uuid },

    /// The batch stopped after the in-flight file because cancellation
    /// was requested.
    BatchCancelled { batch_id: Uuid, phase: PipelinePhase },

    /// A single file failed; the batch continues with the next file.
    Error {
        batch_id: Uuid,
        phase: PipelinePhase,
        file_path: String,
        message: String,
    },
}

impl PipelineEvent {
    /// Id of the batch this event belongs to.
    pub fn batch_id(&self) -> Uuid {
        match self {
            PipelineEvent::AnalysisStarted { batch_id, .. }
            | PipelineEvent::FileSizeKnown { batch_id, .. }
            | PipelineEvent::FileProgress { batch_id, .. }
            | PipelineEvent::FileAnalyzed { batch_id, .. }
            | PipelineEvent::AnalysisComplete { batch_id, .. }
            | PipelineEvent::ExportStarted { batch_id, .. }
            | PipelineEvent::ExportProgress { batch_id, .. }
            | PipelineEvent::FileExported { batch_id, .. }
            | PipelineEvent::ExportComplete { batch_id, .. }
            | PipelineEvent::BatchCancelled { batch_id, .. }
            | PipelineEvent::Error { batch_id, .. } => *batch_id,
        }
    }
}

/// Central event distribution bus for pipeline events
///
/// Wraps tokio::broadcast, providing:
/// - Non-blocking publish (slow subscribers don't block the controller)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
///
/// # Examples
///
/// ```
/// use exportr_common::events::{EventBus, PipelineEvent};
///
/// let bus = EventBus::new(100);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(PipelineEvent::ExportComplete {
///     batch_id: uuid::Uuid::new_v4(),
/// });
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity. Slow
    /// subscribers that fall more than `capacity` events behind observe a
    /// lag error and miss the overwritten events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events. Events emitted before subscription
    /// are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns `Ok(subscriber_count)`, or `Err` when no subscriber is
    /// listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PipelineEvent,
    ) -> Result<usize, broadcast::error::SendError<PipelineEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring whether anyone is listening. Progress
    /// ticks use this: it is acceptable for them to go unobserved.
    pub fn emit_lossy(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(batch_id: Uuid) -> PipelineEvent {
        PipelineEvent::ExportComplete { batch_id }
    }

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let id = Uuid::new_v4();
        bus.emit(complete(id)).unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.batch_id(), id);
    }

    #[test]
    fn emit_without_subscribers_errors_but_lossy_does_not() {
        let bus = EventBus::new(16);
        assert!(bus.emit(complete(Uuid::new_v4())).is_err());
        bus.emit_lossy(complete(Uuid::new_v4()));
    }

    #[test]
    fn subscriber_count_tracks_receivers() {
        let bus = EventBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);
        let rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(rx);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn events_serialize_with_type_tags() {
        let event = PipelineEvent::FileSizeKnown {
            batch_id: Uuid::nil(),
            file_path: "deploy_01.ens".to_string(),
            size_bytes: 1_024,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "file_size_known");
        assert_eq!(json["size_bytes"], 1_024);

        let error = PipelineEvent::Error {
            batch_id: Uuid::nil(),
            phase: PipelinePhase::Export,
            file_path: "deploy_01.ens".to_string(),
            message: "disk full".to_string(),
        };
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["phase"], "export");
    }
}
