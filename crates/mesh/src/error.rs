//! Error types for Chronoflux mesh operations.
//!
//! Every drop outcome of the receive/gossip pipeline has a variant here.
//! None of them is fatal to a node or to the mesh.

use chronoflux_core::{CoreError, MessageId, NodeId};
use chronoflux_crypto::{GateRejection, SigningError};
use thiserror::Error;

/// Errors that can occur in mesh operations.
#[derive(Debug, Error)]
pub enum MeshError {
    /// Signature or quality floor check failed
    #[error("Authentication failed: {0}")]
    Authentication(#[from] GateRejection),

    /// TMR readings disagree beyond the variance bound
    #[error("Consensus failed: variance {variance:.3e} exceeds threshold {threshold:.3e}")]
    Consensus { variance: f64, threshold: f64 },

    /// Not enough neighbors to form a triad
    #[error("Node {node_id} has {neighbors} neighbor(s); a triad needs 2")]
    InsufficientTriad { node_id: NodeId, neighbors: usize },

    /// Message already processed by this node
    #[error("Duplicate message {message_id} at node {node_id}")]
    Duplicate {
        node_id: NodeId,
        message_id: MessageId,
    },

    /// Node not registered
    #[error("Node not found: {node_id}")]
    NodeNotFound { node_id: NodeId },

    /// Node id already registered
    #[error("Node already registered: {node_id}")]
    DuplicateNode { node_id: NodeId },

    /// A node cannot neighbor itself
    #[error("Node {node_id} cannot be its own neighbor")]
    SelfLink { node_id: NodeId },

    /// Coherence outside [0, 1]
    #[error("Coherence must lie in [0, 1], got {0}")]
    InvalidCoherence(f64),

    /// Forward queue is full
    #[error("Gossip queue full")]
    QueueFull,

    /// Propagator has shut down
    #[error("Gossip propagator closed")]
    PropagatorClosed,

    /// Routing target is not a 32-byte hash
    #[error("Invalid routing key: {0}")]
    InvalidRouteKey(String),

    /// No tokio runtime available for the propagator
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Key material errors
    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),

    /// Configuration and other core errors
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

/// Result type for mesh operations.
pub type MeshResult<T> = Result<T, MeshError>;
