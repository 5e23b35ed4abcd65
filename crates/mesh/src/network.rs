//! The Chronoflux mesh: node registry plus the gossip/receive pipeline.
//!
//! `gossip` authenticates a locally authored message, logs it and hands it to
//! every neighbor whose coherence clears the cardinal threshold. Each forward
//! lands in `receive` on the neighbor, which re-checks the signature and then
//! asks a TMR triad (itself plus its first two neighbors) to re-measure the
//! metric before accepting.

use crate::error::{MeshError, MeshResult};
use crate::events::{EventKind, EventSink, MeshEvent, MeshMetrics, MetricsSnapshot, TracingSink};
use crate::gossip::{Forward, ForwardHandler, GossipPropagator};
use crate::node::MeshNode;
use crate::registry::MeshRegistry;
use crate::routing::{closest_neighbor, GeometryKey};
use crate::sensor::{NoisySensor, Sensor};
use crate::tmr::TmrValidator;
use chronoflux_core::{ChronofluxConfig, MessageId, NodeId, TemporalMessage};
use chronoflux_crypto::{KeyProvider, NodeKeys, SignatureGate};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

struct NetworkShared {
    config: ChronofluxConfig,
    registry: MeshRegistry,
    gate: SignatureGate,
    sink: Arc<dyn EventSink>,
    metrics: MeshMetrics,
    propagator: GossipPropagator,
}

/// Handle to a running mesh. Dropping it stops propagation.
pub struct MeshNetwork {
    shared: Arc<NetworkShared>,
}

impl MeshNetwork {
    /// Build a mesh on the current tokio runtime.
    pub fn new(config: ChronofluxConfig, sink: Arc<dyn EventSink>) -> MeshResult<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| MeshError::Runtime(e.to_string()))?;

        let shared = Arc::new_cyclic(|weak: &Weak<NetworkShared>| {
            let handler: Weak<dyn ForwardHandler> = weak.clone();
            let propagator = GossipPropagator::spawn_on(
                &runtime,
                handler,
                config.gossip.queue_capacity,
                config.gossip.max_in_flight,
            );
            NetworkShared {
                gate: SignatureGate::from_config(&config.gate),
                registry: MeshRegistry::new(),
                metrics: MeshMetrics::default(),
                sink,
                propagator,
                config,
            }
        });

        Ok(Self { shared })
    }

    /// Default configuration, events reported through `tracing`.
    pub fn with_defaults() -> MeshResult<Self> {
        Self::new(ChronofluxConfig::default(), Arc::new(TracingSink))
    }

    pub fn config(&self) -> &ChronofluxConfig {
        &self.shared.config
    }

    pub fn gate(&self) -> &SignatureGate {
        &self.shared.gate
    }

    pub fn registry(&self) -> &MeshRegistry {
        &self.shared.registry
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    pub fn node(&self, id: &str) -> Option<Arc<MeshNode>> {
        self.shared.registry.get(id)
    }

    /// Register a node using the configured noisy sensor.
    pub fn create_node(
        &self,
        id: impl Into<NodeId>,
        keys: NodeKeys,
        coherence: f64,
    ) -> MeshResult<Arc<MeshNode>> {
        let sensor = Arc::new(NoisySensor::new(self.shared.config.sensor.noise_amplitude));
        self.create_node_with_sensor(id, keys, coherence, sensor)
    }

    pub fn create_node_with_sensor(
        &self,
        id: impl Into<NodeId>,
        keys: NodeKeys,
        coherence: f64,
        sensor: Arc<dyn Sensor>,
    ) -> MeshResult<Arc<MeshNode>> {
        self.add_node(MeshNode::with_sensor(id, keys, coherence, sensor)?)
    }

    /// Register a node whose keys come from `provider`.
    pub fn provision_node(
        &self,
        provider: &dyn KeyProvider,
        id: impl Into<NodeId>,
        coherence: f64,
    ) -> MeshResult<Arc<MeshNode>> {
        let id = id.into();
        let keys = provider.provision(&id)?;
        self.create_node(id, keys, coherence)
    }

    /// Register a prebuilt node. Its seen set is resized to the configured
    /// capacity.
    pub fn add_node(&self, node: MeshNode) -> MeshResult<Arc<MeshNode>> {
        let node = node.with_seen_capacity(self.shared.config.gossip.seen_capacity);
        self.shared.registry.insert(node)
    }

    pub fn connect(&self, from: &str, to: &str) -> MeshResult<bool> {
        self.shared.registry.connect(from, to)
    }

    pub fn link(&self, a: &str, b: &str) -> MeshResult<()> {
        self.shared.registry.link(a, b)
    }

    pub fn remove_node(&self, id: &str) -> MeshResult<Arc<MeshNode>> {
        self.shared.registry.remove(id)
    }

    /// Originate `message` at `node_id` and fan it out.
    ///
    /// Returns the neighbors the message was handed to.
    pub async fn gossip(&self, node_id: &str, message: TemporalMessage) -> MeshResult<Vec<NodeId>> {
        let shared = &self.shared;
        let node = shared.registry.require(node_id)?;
        let message_id = message.message_id();

        shared.admit(&node, &message, message_id)?;
        node.append(message.clone());
        debug!(node_id, message_id = %message_id, "Message logged for gossip");

        let targets = shared.eligible_neighbors(&node, None);
        for target in &targets {
            shared
                .propagator
                .submit(Forward {
                    from: node_id.to_string(),
                    to: target.clone(),
                    message: message.clone(),
                })
                .await?;
        }

        if !targets.is_empty() {
            shared.metrics.add_forwarded(targets.len() as u64);
            shared.emit(node_id, EventKind::Propagated, Some(message.vorticity()));
        }
        Ok(targets)
    }

    /// Validate `message` at `node_id` as if a neighbor had forwarded it.
    ///
    /// Returns the TMR consensus value on acceptance.
    pub fn receive(&self, node_id: &str, message: &TemporalMessage) -> MeshResult<f64> {
        self.shared.receive(node_id, message, None)
    }

    /// Neighbor of `node_id` closest to `target` in hash space.
    pub fn route_by_geometry(
        &self,
        node_id: &str,
        target: &GeometryKey,
    ) -> MeshResult<Option<NodeId>> {
        let node = self.shared.registry.require(node_id)?;
        Ok(closest_neighbor(&node.neighbors(), target))
    }

    /// Forwards queued or being delivered.
    pub fn in_flight(&self) -> usize {
        self.shared.propagator.in_flight()
    }

    /// Wait until every forward, relays included, has been processed.
    pub async fn wait_idle(&self) {
        self.shared.propagator.wait_idle().await
    }
}

impl NetworkShared {
    fn emit(&self, node_id: &str, kind: EventKind, metric_value: Option<f64>) {
        self.metrics.record(kind);
        self.sink.notify(&MeshEvent::new(node_id, kind, metric_value));
    }

    /// Flood control followed by the signature gate.
    fn admit(
        &self,
        node: &MeshNode,
        message: &TemporalMessage,
        message_id: MessageId,
    ) -> MeshResult<()> {
        if !node.mark_seen(message_id) {
            debug!(node_id = node.id(), message_id = %message_id, "Duplicate message dropped");
            self.emit(node.id(), EventKind::Duplicate, None);
            return Err(MeshError::Duplicate {
                node_id: node.id().to_string(),
                message_id,
            });
        }

        if let Err(rejection) = self.gate.check(message) {
            debug!(
                node_id = node.id(),
                message_id = %message_id,
                %rejection,
                "Message failed signature gate"
            );
            self.emit(node.id(), EventKind::AuthenticationRejected, Some(message.vorticity()));
            return Err(rejection.into());
        }
        Ok(())
    }

    /// Neighbors with coherence at or above the cardinal threshold.
    fn eligible_neighbors(&self, node: &MeshNode, exclude: Option<&str>) -> Vec<NodeId> {
        let threshold = self.config.gossip.cardinal_threshold;
        self.registry
            .resolve_neighbors(node)
            .into_iter()
            .filter(|n| Some(n.id()) != exclude)
            .filter(|n| n.coherence() >= threshold)
            .map(|n| n.id().to_string())
            .collect()
    }

    fn receive(
        &self,
        node_id: &str,
        message: &TemporalMessage,
        from: Option<&str>,
    ) -> MeshResult<f64> {
        let node = self.registry.require(node_id)?;
        let message_id = message.message_id();
        self.admit(&node, message, message_id)?;

        let neighbors = self.registry.resolve_neighbors(&node);
        let (beta, gamma) = match neighbors.as_slice() {
            [beta, gamma, ..] => (beta, gamma),
            _ => {
                // Not counted as seen so the message can be retried once the
                // node has enough neighbors.
                node.forget_seen(&message_id);
                debug!(node_id, neighbors = neighbors.len(), "Insufficient neighbors for TMR");
                self.emit(node_id, EventKind::InsufficientTriad, Some(message.vorticity()));
                return Err(MeshError::InsufficientTriad {
                    node_id: node_id.to_string(),
                    neighbors: neighbors.len(),
                });
            }
        };

        let threshold = self.config.tmr.variance_threshold;
        let report = TmrValidator::with_threshold(&node, beta, gamma, threshold)
            .assess(&self.config.tmr.metric);
        if !report.passed {
            node.forget_seen(&message_id);
            warn!(
                node_id,
                message_id = %message_id,
                claimed = message.vorticity(),
                variance = report.variance,
                "Consensus failed"
            );
            self.emit(node_id, EventKind::ConsensusRejected, Some(report.variance));
            return Err(MeshError::Consensus {
                variance: report.variance,
                threshold,
            });
        }

        node.append(message.clone());
        self.emit(node_id, EventKind::Accepted, Some(report.mean));

        if self.config.gossip.relay_accepted {
            self.relay(&node, message, from);
        }
        Ok(report.mean)
    }

    /// Re-gossip an accepted message without blocking the receive path.
    fn relay(&self, node: &MeshNode, message: &TemporalMessage, from: Option<&str>) {
        let mut forwarded = 0u64;
        for target in self.eligible_neighbors(node, from) {
            let forward = Forward {
                from: node.id().to_string(),
                to: target,
                message: message.clone(),
            };
            match self.propagator.try_submit(forward) {
                Ok(()) => forwarded += 1,
                Err(e) => {
                    debug!(node_id = node.id(), error = %e, "Relay dropped");
                    self.metrics.relay_dropped();
                }
            }
        }

        if forwarded > 0 {
            self.metrics.add_forwarded(forwarded);
            self.emit(node.id(), EventKind::Propagated, Some(message.vorticity()));
        }
    }
}

impl ForwardHandler for NetworkShared {
    fn deliver(&self, forward: Forward) {
        if let Err(e) = self.receive(&forward.to, &forward.message, Some(&forward.from)) {
            debug!(from = %forward.from, to = %forward.to, error = %e, "Forward not accepted");
        }
    }
}
