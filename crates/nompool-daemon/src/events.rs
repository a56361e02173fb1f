//! Event emission.
//!
//! Committed bookings, config changes and anomalies are broadcast to any
//! number of subscribers. Each subscriber has an independent buffer; a slow
//! subscriber lags and skips rather than blocking the processor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use nompool_lifecycle::effects::Effect;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// An event emitted by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event type name (e.g. "BookingRecorded", "DaemonStarted").
    pub event_type: String,
    /// Pool sequence number the event belongs to (0 for daemon events).
    pub seqno: u64,
    /// Message timestamp.
    pub timestamp: u64,
    /// Type-specific payload.
    pub payload: serde_json::Value,
}

impl Event {
    /// Event for one committed effect. Counterparty requests and transfers
    /// are already visible in the outcome line and produce no event.
    pub fn from_effect(effect: &Effect, seqno: u64, timestamp: u64) -> Option<Self> {
        let event_type = match effect {
            Effect::Booking(_) => "BookingRecorded",
            Effect::ConfigChanged { .. } => "ConfigChanged",
            Effect::ProposalRejected { .. } => "ProposalRejected",
            Effect::Anomaly { .. } => "Anomaly",
            Effect::Transfer { .. } | Effect::SendStake { .. } | Effect::RequestRecovery => {
                return None
            }
        };
        Some(Self {
            event_type: event_type.to_string(),
            seqno,
            timestamp,
            payload: serde_json::to_value(effect).unwrap_or_default(),
        })
    }
}

/// Event bus for broadcasting events to subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: Event) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events. Returns a receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Number of events emitted so far.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

/// Log notable events until the bus closes.
pub async fn monitor(mut rx: broadcast::Receiver<Event>) {
    loop {
        match rx.recv().await {
            Ok(event) => match event.event_type.as_str() {
                "Anomaly" | "PoolHalted" => {
                    tracing::error!(seqno = event.seqno, payload = %event.payload, "{}", event.event_type)
                }
                "ConfigChanged" | "ProposalRejected" => {
                    tracing::info!(seqno = event.seqno, payload = %event.payload, "{}", event.event_type)
                }
                _ => {
                    tracing::trace!(seqno = event.seqno, "{}", event.event_type)
                }
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event monitor lagging");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nompool_types::booking::{Booking, BookingKind};

    #[tokio::test]
    async fn test_emit_and_subscribe() {
        let bus = EventBus::new(100);
        let mut rx = bus.subscribe();

        bus.emit(Event {
            event_type: "DaemonStarted".to_string(),
            seqno: 0,
            timestamp: 1,
            payload: serde_json::json!({}),
        });

        let event = rx.recv().await.expect("receive event");
        assert_eq!(event.event_type, "DaemonStarted");
        assert_eq!(bus.sequence(), 1);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(10);
        bus.emit(Event {
            event_type: "DaemonStarted".to_string(),
            seqno: 0,
            timestamp: 0,
            payload: serde_json::Value::Null,
        });
        assert_eq!(bus.sequence(), 1);
    }

    #[test]
    fn test_effect_mapping() {
        let booking = Effect::Booking(Booking::credit(BookingKind::NominatorDeposit, [1; 32], 5, 9, 3));
        let event = Event::from_effect(&booking, 3, 9).expect("booking event");
        assert_eq!(event.event_type, "BookingRecorded");
        assert_eq!(event.payload["kind"], "nominator_deposit");

        assert!(Event::from_effect(&Effect::RequestRecovery, 3, 9).is_none());
    }
}
