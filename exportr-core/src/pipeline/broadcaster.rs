//! Throttled event publication.
//!
//! Progress messages can arrive once per I/O chunk or per ensemble;
//! re-publishing every one of them would swamp subscribers. Byte and
//! ensemble progress is therefore rate-limited, while milestone events
//! (start, per-file completion, batch completion, errors, cancellation)
//! are always published.

use std::time::{Duration, Instant};

use exportr_common::{EventBus, PipelineEvent};
use tokio::sync::broadcast;
use tracing::debug;

/// Event publisher with rate limiting for progress events.
pub struct EventBroadcaster {
    bus: EventBus,
    last_emission: Option<Instant>,
    throttle_interval_ms: u64,
}

impl EventBroadcaster {
    /// Create a broadcaster over `bus`. `throttle_interval_ms` is the
    /// minimum spacing between published progress events; 0 disables
    /// throttling.
    pub fn new(bus: EventBus, throttle_interval_ms: u64) -> Self {
        Self {
            bus,
            last_emission: None,
            throttle_interval_ms,
        }
    }

    /// Publish an event, rate-limiting `FileProgress` and
    /// `ExportProgress`. Returns false when the event was dropped by the
    /// throttle.
    pub fn emit(&mut self, event: PipelineEvent) -> bool {
        let throttled_kind = matches!(
            event,
            PipelineEvent::FileProgress { .. } | PipelineEvent::ExportProgress { .. }
        );

        if throttled_kind && self.throttle_interval_ms > 0 {
            if let Some(last) = self.last_emission {
                if last.elapsed() < Duration::from_millis(self.throttle_interval_ms) {
                    debug!("throttled progress event");
                    return false;
                }
            }
            self.last_emission = Some(Instant::now());
        }

        self.bus.emit_lossy(event);
        true
    }

    /// Publish an event unconditionally. Milestone events use this.
    pub fn emit_immediate(&self, event: PipelineEvent) {
        self.bus.emit_lossy(event);
    }

    /// New receiver for the underlying bus.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.bus.subscribe()
    }

    /// The underlying bus.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}
