//! Core functionality for the Chronoflux mesh.
//!
//! This crate provides the fundamental types, configuration and logging
//! setup shared by the crypto and mesh crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{
    ChronofluxConfig, GateConfig, GossipConfig, LoggingConfig, SensorConfig, TmrConfig,
    DEFAULT_NOISE_AMPLITUDE, PHI_CARDINAL, QUALITY_FLOOR, TMR_VARIANCE_THRESHOLD,
};
pub use error::{CoreError, CoreResult};
pub use types::{MessageId, NodeId, TemporalMessage};
