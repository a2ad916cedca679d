//! Event bus implementations.
//!
//! - [`TracingEventBus`] writes lifecycle events to the log.
//! - [`BroadcastEventBus`] fans them out to any number of subscribers over a
//!   tokio broadcast channel.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::ports::EventBus;
use super::types::{SyncComplete, SyncFailureEvent};

/// Log-only event bus.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventBus;

impl EventBus for TracingEventBus {
    fn emit_sync_complete(&self, event: SyncComplete) {
        info!(
            success_count = event.success_count,
            total_count = event.total_count,
            "sync-complete"
        );
    }

    fn emit_sync_error(&self, event: SyncFailureEvent) {
        warn!(
            message = %event.message,
            cause = event.cause.as_deref().unwrap_or(""),
            "sync-error"
        );
    }
}

/// An event as delivered to broadcast subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SyncEvent {
    SyncComplete(SyncComplete),
    SyncError(SyncFailureEvent),
}

/// Broadcasts events to subscribers.
///
/// Slow subscribers may miss events once `capacity` is exceeded; emitting
/// never blocks and never fails when nobody is listening.
#[derive(Debug, Clone)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl BroadcastEventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    fn send(&self, event: SyncEvent) {
        // Err only means there are no receivers right now
        let _ = self.sender.send(event);
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventBus for BroadcastEventBus {
    fn emit_sync_complete(&self, event: SyncComplete) {
        self.send(SyncEvent::SyncComplete(event));
    }

    fn emit_sync_error(&self, event: SyncFailureEvent) {
        self.send(SyncEvent::SyncError(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_delivers_to_subscribers() {
        let bus = BroadcastEventBus::default();
        let mut rx = bus.subscribe();

        bus.emit_sync_complete(SyncComplete {
            success_count: 2,
            total_count: 3,
        });
        bus.emit_sync_error(SyncFailureEvent {
            message: "1 of 3 rows failed".to_string(),
            cause: None,
        });

        assert_eq!(
            rx.recv().await.unwrap(),
            SyncEvent::SyncComplete(SyncComplete {
                success_count: 2,
                total_count: 3
            })
        );
        assert!(matches!(rx.recv().await.unwrap(), SyncEvent::SyncError(_)));
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = BroadcastEventBus::new(1);
        bus.emit_sync_complete(SyncComplete {
            success_count: 0,
            total_count: 0,
        });
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(SyncEvent::SyncComplete(SyncComplete {
            success_count: 1,
            total_count: 1,
        }))
        .unwrap();
        assert_eq!(json["type"], "sync-complete");
        assert_eq!(json["success_count"], 1);
    }
}
