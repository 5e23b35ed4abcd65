//! Chronoflux Mesh - Byzantine-resistant gossip with TMR validation
//!
//! Every message crossing the mesh is authenticated and then independently
//! re-measured by a triad of nodes before it is accepted.
//!
//! # Core Components
//!
//! - **Signature Gate**: quality floor plus Ed25519 verification (see `chronoflux-crypto`)
//! - **TMR Validator**: blind triad snapshot and population-variance agreement check
//! - **Gossip Propagator**: bounded channel fan-out to neighbors with coherence Φ ≥ 0.72
//! - **Mesh Registry**: sole owner of nodes, with neighbors referenced by id
//! - **Route-by-Geometry**: XOR-nearest neighbor in BLAKE3 space
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use chronoflux_crypto::SeededKeyProvider;
//! use chronoflux_mesh::MeshNetwork;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mesh = MeshNetwork::with_defaults()?;
//! let keys = SeededKeyProvider::new(b"demo".to_vec());
//! for id in ["Alpha", "Beta", "Gamma"] {
//!     mesh.provision_node(&keys, id, 0.74)?;
//! }
//! mesh.link("Alpha", "Beta")?;
//! mesh.link("Alpha", "Gamma")?;
//! mesh.link("Beta", "Gamma")?;
//!
//! let alpha = mesh.node("Alpha").ok_or("missing node")?;
//! let msg = alpha.sign_message(0, 0.85, 0.0, b"temporal sync".to_vec());
//! mesh.gossip("Alpha", msg).await?;
//! mesh.wait_idle().await;
//! println!("{:?}", mesh.metrics());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod events;
pub mod gossip;
pub mod network;
pub mod node;
pub mod registry;
pub mod routing;
pub mod sensor;
pub mod tmr;

pub use error::{MeshError, MeshResult};
pub use events::{
    ChannelSink, EventKind, EventSink, MeshEvent, MeshMetrics, MetricsSnapshot, TracingSink,
};
pub use gossip::{Forward, ForwardHandler, GossipPropagator};
pub use network::MeshNetwork;
pub use node::{MeshNode, DEFAULT_SEEN_CAPACITY};
pub use registry::MeshRegistry;
pub use routing::{closest_neighbor, GeometryKey};
pub use sensor::{FixedSensor, NoisySensor, Sensor, SensorContext};
pub use tmr::{evaluate_readings, TmrReport, TmrValidator, TriadSnapshot};
