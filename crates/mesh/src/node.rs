//! Mesh node state.
//!
//! A node owns its identity, key material, coherence score, message log and
//! flood-control memory. Neighbors are held as [`NodeId`]s and resolved
//! through the [`crate::registry::MeshRegistry`], so nodes never own each
//! other.

use crate::error::{MeshError, MeshResult};
use crate::sensor::{NoisySensor, Sensor, SensorContext};
use chronoflux_core::{MessageId, NodeId, TemporalMessage};
use chronoflux_crypto::NodeKeys;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Default number of message ids remembered per node
pub const DEFAULT_SEEN_CAPACITY: usize = 4096;

/// A single neuron of the mesh.
pub struct MeshNode {
    id: NodeId,
    keys: NodeKeys,
    public_key: Vec<u8>,
    /// Coherence Φ stored as `f64` bits
    coherence: AtomicU64,
    neighbors: RwLock<Vec<NodeId>>,
    log: RwLock<Vec<TemporalMessage>>,
    seen: Mutex<SeenSet>,
    sensor: Arc<dyn Sensor>,
}

impl MeshNode {
    /// Create a node with the default noisy sensor.
    pub fn new(id: impl Into<NodeId>, keys: NodeKeys, coherence: f64) -> MeshResult<Self> {
        Self::with_sensor(id, keys, coherence, Arc::new(NoisySensor::default()))
    }

    pub fn with_sensor(
        id: impl Into<NodeId>,
        keys: NodeKeys,
        coherence: f64,
        sensor: Arc<dyn Sensor>,
    ) -> MeshResult<Self> {
        check_coherence(coherence)?;
        let public_key = keys.public_key();
        Ok(Self {
            id: id.into(),
            keys,
            public_key,
            coherence: AtomicU64::new(coherence.to_bits()),
            neighbors: RwLock::new(Vec::new()),
            log: RwLock::new(Vec::new()),
            seen: Mutex::new(SeenSet::new(DEFAULT_SEEN_CAPACITY)),
            sensor,
        })
    }

    /// Override how many message ids this node remembers.
    pub fn with_seen_capacity(self, capacity: usize) -> Self {
        *self.seen.lock().unwrap_or_else(PoisonError::into_inner) = SeenSet::new(capacity);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Current coherence Φ.
    pub fn coherence(&self) -> f64 {
        f64::from_bits(self.coherence.load(Ordering::Acquire))
    }

    /// Set Φ from an external measurement or configuration.
    pub fn set_coherence(&self, coherence: f64) -> MeshResult<()> {
        check_coherence(coherence)?;
        self.coherence.store(coherence.to_bits(), Ordering::Release);
        Ok(())
    }

    /// Take this node's own reading of `metric`.
    pub fn measure(&self, metric: &str) -> f64 {
        let context = SensorContext {
            node_id: &self.id,
            coherence: self.coherence(),
        };
        self.sensor.measure(&context, metric)
    }

    /// Author a message signed with this node's key.
    pub fn sign_message(
        &self,
        timestamp: i64,
        vorticity: f64,
        phase: f64,
        content: Vec<u8>,
    ) -> TemporalMessage {
        self.keys.sign_message(timestamp, vorticity, phase, content)
    }

    /// Author a message stamped with the current Unix time.
    pub fn sign_message_now(
        &self,
        vorticity: f64,
        phase: f64,
        content: Vec<u8>,
    ) -> TemporalMessage {
        self.keys.sign_message_now(vorticity, phase, content)
    }

    /// Neighbor ids in link order.
    pub fn neighbors(&self) -> Vec<NodeId> {
        self.neighbors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn neighbor_count(&self) -> usize {
        self.neighbors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn has_neighbor(&self, id: &str) -> bool {
        self.neighbors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|n| n == id)
    }

    /// Append a neighbor id; returns false if it was already present.
    pub(crate) fn add_neighbor(&self, id: NodeId) -> bool {
        let mut neighbors = self.neighbors.write().unwrap_or_else(PoisonError::into_inner);
        if neighbors.contains(&id) {
            return false;
        }
        neighbors.push(id);
        true
    }

    pub(crate) fn remove_neighbor(&self, id: &str) -> bool {
        let mut neighbors = self.neighbors.write().unwrap_or_else(PoisonError::into_inner);
        let before = neighbors.len();
        neighbors.retain(|n| n != id);
        neighbors.len() != before
    }

    /// Append an accepted message. Single writer at a time.
    pub(crate) fn append(&self, message: TemporalMessage) {
        self.log
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }

    /// Record a message id; false if it was already seen.
    pub(crate) fn mark_seen(&self, id: MessageId) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id)
    }

    /// Drop a message id so a later retry is not treated as a duplicate.
    pub(crate) fn forget_seen(&self, id: &MessageId) {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    pub fn has_seen(&self, id: &MessageId) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    pub fn log_len(&self) -> usize {
        self.log.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Copy of the accepted messages, in append order.
    pub fn log_snapshot(&self) -> Vec<TemporalMessage> {
        self.log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn log_contains(&self, id: &MessageId) -> bool {
        self.log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|m| &m.message_id() == id)
    }
}

impl fmt::Debug for MeshNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeshNode")
            .field("id", &self.id)
            .field("coherence", &self.coherence())
            .field("neighbors", &self.neighbors())
            .field("log_len", &self.log_len())
            .finish_non_exhaustive()
    }
}

fn check_coherence(coherence: f64) -> MeshResult<()> {
    if (0.0..=1.0).contains(&coherence) {
        Ok(())
    } else {
        Err(MeshError::InvalidCoherence(coherence))
    }
}

/// Bounded FIFO memory of message ids.
#[derive(Debug)]
struct SeenSet {
    capacity: usize,
    ids: HashSet<MessageId>,
    order: VecDeque<MessageId>,
}

impl SeenSet {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            ids: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    fn insert(&mut self, id: MessageId) -> bool {
        if !self.ids.insert(id) {
            return false;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        true
    }

    fn remove(&mut self, id: &MessageId) {
        if self.ids.remove(id) {
            self.order.retain(|seen| seen != id);
        }
    }

    fn contains(&self, id: &MessageId) -> bool {
        self.ids.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::FixedSensor;

    fn node(id: &str, coherence: f64) -> MeshNode {
        MeshNode::new(id, NodeKeys::generate(), coherence).unwrap()
    }

    #[test]
    fn test_node_creation() {
        let n = node("alpha", 0.74);
        assert_eq!(n.id(), "alpha");
        assert_eq!(n.coherence(), 0.74);
        assert_eq!(n.public_key().len(), 32);
        assert_eq!(n.neighbor_count(), 0);
        assert_eq!(n.log_len(), 0);
    }

    #[test]
    fn test_rejects_invalid_coherence() {
        assert!(matches!(
            MeshNode::new("x", NodeKeys::generate(), 1.2),
            Err(MeshError::InvalidCoherence(_))
        ));
        let n = node("y", 0.5);
        assert!(n.set_coherence(f64::NAN).is_err());
        assert!(n.set_coherence(-0.1).is_err());
        assert_eq!(n.coherence(), 0.5);
        n.set_coherence(0.9).unwrap();
        assert_eq!(n.coherence(), 0.9);
    }

    #[test]
    fn test_measure_uses_own_sensor() {
        let n = MeshNode::with_sensor("g", NodeKeys::generate(), 0.74, Arc::new(FixedSensor(5.0)))
            .unwrap();
        assert_eq!(n.measure("vorticity"), 5.0);
    }

    #[test]
    fn test_default_sensor_tracks_coherence() {
        let n = node("a", 0.74);
        assert!((n.measure("vorticity") - 0.74).abs() <= 1e-5 + f64::EPSILON);
        n.set_coherence(0.2).unwrap();
        assert!((n.measure("vorticity") - 0.2).abs() <= 1e-5 + f64::EPSILON);
    }

    #[test]
    fn test_neighbor_list_is_ordered_and_unique() {
        let n = node("a", 0.8);
        assert!(n.add_neighbor("b".to_string()));
        assert!(n.add_neighbor("c".to_string()));
        assert!(!n.add_neighbor("b".to_string()));
        assert_eq!(n.neighbors(), vec!["b".to_string(), "c".to_string()]);
        assert!(n.remove_neighbor("b"));
        assert!(!n.remove_neighbor("b"));
        assert_eq!(n.neighbors(), vec!["c".to_string()]);
    }

    #[test]
    fn test_log_append_and_snapshot() {
        let n = node("a", 0.8);
        let first = n.sign_message(1, 0.8, 0.0, b"one".to_vec());
        let second = n.sign_message(2, 0.8, 0.0, b"two".to_vec());
        n.append(first.clone());
        n.append(second.clone());
        assert_eq!(n.log_snapshot(), vec![first.clone(), second]);
        assert!(n.log_contains(&first.message_id()));
    }

    #[test]
    fn test_sign_message_now_uses_node_key() {
        let n = node("a", 0.8);
        let msg = n.sign_message_now(0.8, 0.0, b"now".to_vec());
        assert_eq!(msg.public_key(), n.public_key());
        assert!(msg.timestamp() > 0);
        assert!(chronoflux_crypto::SignatureGate::default().verify(&msg));
    }

    #[test]
    fn test_seen_set_evicts_oldest() {
        let n = node("a", 0.8).with_seen_capacity(2);
        let ids: Vec<MessageId> = (0u8..3).map(|i| MessageId([i; 32])).collect();
        assert!(n.mark_seen(ids[0]));
        assert!(!n.mark_seen(ids[0]));
        assert!(n.mark_seen(ids[1]));
        assert!(n.mark_seen(ids[2]));
        assert!(!n.has_seen(&ids[0]));
        assert!(n.has_seen(&ids[1]));
        assert!(n.has_seen(&ids[2]));

        n.forget_seen(&ids[1]);
        assert!(!n.has_seen(&ids[1]));
        assert!(n.mark_seen(ids[1]));
    }

    #[test]
    fn test_concurrent_appends_are_all_recorded() {
        let n = Arc::new(node("a", 0.8));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let n = Arc::clone(&n);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let msg = n.sign_message(t * 100 + i, 0.8, 0.0, vec![t as u8]);
                        n.append(msg);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(n.log_len(), 400);
    }
}
