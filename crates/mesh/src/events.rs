//! Observable accept/reject events and mesh counters.

use chronoflux_core::NodeId;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// What happened to a message at a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Passed every gate and was appended to the log
    Accepted,
    /// Forwarded to at least one neighbor
    Propagated,
    /// TMR variance exceeded the bound (Byzantine node or faulty sensor)
    ConsensusRejected,
    /// Signature or quality floor check failed
    AuthenticationRejected,
    /// Fewer than two neighbors to form a triad
    InsufficientTriad,
    /// Already processed by this node
    Duplicate,
}

/// Notification delivered to an [`EventSink`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshEvent {
    pub node_id: NodeId,
    pub kind: EventKind,
    /// Consensus value on acceptance, the offending variance on consensus
    /// rejection, the message's claimed vorticity otherwise
    pub metric_value: Option<f64>,
}

impl MeshEvent {
    pub fn new(node_id: impl Into<NodeId>, kind: EventKind, metric_value: Option<f64>) -> Self {
        Self {
            node_id: node_id.into(),
            kind,
            metric_value,
        }
    }
}

/// External monitoring hook.
pub trait EventSink: Send + Sync {
    fn notify(&self, event: &MeshEvent);
}

/// Emits every event as a structured `tracing` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn notify(&self, event: &MeshEvent) {
        let node_id = event.node_id.as_str();
        match event.kind {
            EventKind::Accepted => info!(
                node_id,
                consensus = event.metric_value,
                "Message validated by TMR"
            ),
            EventKind::ConsensusRejected => warn!(
                node_id,
                variance = event.metric_value,
                "Consensus failed (possible Byzantine node)"
            ),
            kind => debug!(node_id, ?kind, value = event.metric_value, "Mesh event"),
        }
    }
}

/// Forwards events into an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<MeshEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MeshEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn notify(&self, event: &MeshEvent) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.tx.send(event.clone());
    }
}

/// Mesh-wide counters.
#[derive(Debug, Default)]
pub struct MeshMetrics {
    gossiped: AtomicU64,
    forwarded: AtomicU64,
    accepted: AtomicU64,
    authentication_rejected: AtomicU64,
    consensus_rejected: AtomicU64,
    insufficient_triad: AtomicU64,
    duplicates: AtomicU64,
    relays_dropped: AtomicU64,
}

/// Point-in-time copy of [`MeshMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub gossiped: u64,
    pub forwarded: u64,
    pub accepted: u64,
    pub authentication_rejected: u64,
    pub consensus_rejected: u64,
    pub insufficient_triad: u64,
    pub duplicates: u64,
    pub relays_dropped: u64,
}

impl MeshMetrics {
    pub(crate) fn record(&self, kind: EventKind) {
        let counter = match kind {
            EventKind::Accepted => &self.accepted,
            EventKind::Propagated => &self.gossiped,
            EventKind::ConsensusRejected => &self.consensus_rejected,
            EventKind::AuthenticationRejected => &self.authentication_rejected,
            EventKind::InsufficientTriad => &self.insufficient_triad,
            EventKind::Duplicate => &self.duplicates,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_forwarded(&self, count: u64) {
        self.forwarded.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn relay_dropped(&self) {
        self.relays_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            gossiped: self.gossiped.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            authentication_rejected: self.authentication_rejected.load(Ordering::Relaxed),
            consensus_rejected: self.consensus_rejected.load(Ordering::Relaxed),
            insufficient_triad: self.insufficient_triad.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            relays_dropped: self.relays_dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::new();
        sink.notify(&MeshEvent::new("alpha", EventKind::Accepted, Some(0.74)));
        let event = rx.try_recv().unwrap();
        assert_eq!(event.node_id, "alpha");
        assert_eq!(event.kind, EventKind::Accepted);
        assert_eq!(event.metric_value, Some(0.74));
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.notify(&MeshEvent::new("beta", EventKind::Duplicate, None));
    }

    #[test]
    fn test_metrics_record_by_kind() {
        let metrics = MeshMetrics::default();
        metrics.record(EventKind::Accepted);
        metrics.record(EventKind::Accepted);
        metrics.record(EventKind::ConsensusRejected);
        metrics.record(EventKind::Propagated);
        metrics.add_forwarded(3);
        metrics.relay_dropped();

        let snap = metrics.snapshot();
        assert_eq!(snap.accepted, 2);
        assert_eq!(snap.consensus_rejected, 1);
        assert_eq!(snap.gossiped, 1);
        assert_eq!(snap.forwarded, 3);
        assert_eq!(snap.relays_dropped, 1);
        assert_eq!(snap.duplicates, 0);
    }

    #[test]
    fn test_event_serializes() {
        let event = MeshEvent::new("gamma", EventKind::InsufficientTriad, None);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("InsufficientTriad"));
    }
}
