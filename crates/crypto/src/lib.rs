//! Cryptographic primitives for the Chronoflux mesh.
//!
//! - **Node keys**: Ed25519 keypairs owned by a single node, with pluggable
//!   provisioning ([`KeyProvider`])
//! - **Signature gate**: quality floor plus signature verification applied to
//!   every inbound [`chronoflux_core::TemporalMessage`]
//!
//! # Security Principles
//!
//! - Private keys never leave the owning node and are zeroized on drop
//! - All messages must be verified before trust
//! - BLAKE3 for every integrity digest

pub mod gate;
pub mod signing;

pub use gate::{GateRejection, SignatureGate};
pub use signing::{KeyProvider, NodeKeys, OsKeyProvider, SeededKeyProvider, SigningError};
