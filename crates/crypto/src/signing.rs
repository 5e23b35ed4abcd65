//! Node key material and message signing.
//!
//! Each mesh node owns exactly one [`NodeKeys`]. The private half never leaves
//! it: callers get the public key bytes and signed [`TemporalMessage`]s.

use chronoflux_core::TemporalMessage;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroize;

/// Domain-separation context for seeded key derivation
const SEEDED_KEY_CONTEXT: &str = "chronoflux-mesh 2024 seeded node key";

/// Errors that can occur during key handling.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("Invalid key length: {len} (expected 32)")]
    InvalidKeyLength { len: usize },

    #[error("Key provisioning failed for node '{node_id}': {reason}")]
    Provisioning { node_id: String, reason: String },
}

/// Ed25519 keypair owned by a single node.
pub struct NodeKeys {
    signing_key: SigningKey,
    public_key: VerifyingKey,
}

impl NodeKeys {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Load a keypair from a 32-byte secret.
    ///
    /// # Security
    /// The intermediate copy of the secret is zeroized.
    pub fn from_bytes(secret: &[u8]) -> Result<Self, SigningError> {
        if secret.len() != 32 {
            return Err(SigningError::InvalidKeyLength { len: secret.len() });
        }

        let mut key_array = [0u8; 32];
        key_array.copy_from_slice(secret);
        let signing_key = SigningKey::from_bytes(&key_array);
        key_array.zeroize();

        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_key = signing_key.verifying_key();
        Self {
            signing_key,
            public_key,
        }
    }

    /// Public key bytes as shared with peers.
    pub fn public_key(&self) -> Vec<u8> {
        self.public_key.to_bytes().to_vec()
    }

    /// Short stable identifier of the public key, for logs.
    pub fn public_key_id(&self) -> String {
        let hash = blake3::hash(self.public_key.as_bytes());
        hex::encode(&hash.as_bytes()[..8])
    }

    /// Raw Ed25519 signature over `content`.
    pub fn sign(&self, content: &[u8]) -> Vec<u8> {
        self.signing_key.sign(content).to_bytes().to_vec()
    }

    /// Build a signed message carrying this node's public key.
    pub fn sign_message(
        &self,
        timestamp: i64,
        vorticity: f64,
        phase: f64,
        content: Vec<u8>,
    ) -> TemporalMessage {
        let signature = self.sign(&content);
        TemporalMessage::new(
            timestamp,
            vorticity,
            phase,
            content,
            signature,
            self.public_key(),
        )
    }

    /// Same as [`NodeKeys::sign_message`] stamped with the current Unix time.
    pub fn sign_message_now(
        &self,
        vorticity: f64,
        phase: f64,
        content: Vec<u8>,
    ) -> TemporalMessage {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        self.sign_message(timestamp, vorticity, phase, content)
    }
}

impl fmt::Debug for NodeKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeKeys")
            .field("public_key_id", &self.public_key_id())
            .finish_non_exhaustive()
    }
}

/// Supplies a keypair to each node at construction.
pub trait KeyProvider: Send + Sync {
    fn provision(&self, node_id: &str) -> Result<NodeKeys, SigningError>;
}

/// Fresh random keys for every node.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsKeyProvider;

impl KeyProvider for OsKeyProvider {
    fn provision(&self, node_id: &str) -> Result<NodeKeys, SigningError> {
        let keys = NodeKeys::generate();
        debug!(node_id, key_id = %keys.public_key_id(), "Provisioned random node key");
        Ok(keys)
    }
}

/// Deterministic keys derived from a shared seed and the node id.
///
/// Meant for simulations and tests, where reproducible identities matter more
/// than secrecy.
pub struct SeededKeyProvider {
    seed: Vec<u8>,
}

impl SeededKeyProvider {
    pub fn new(seed: impl Into<Vec<u8>>) -> Self {
        Self { seed: seed.into() }
    }
}

impl KeyProvider for SeededKeyProvider {
    fn provision(&self, node_id: &str) -> Result<NodeKeys, SigningError> {
        if node_id.is_empty() {
            return Err(SigningError::Provisioning {
                node_id: String::new(),
                reason: "node id must not be empty".to_string(),
            });
        }

        let mut material = Vec::with_capacity(self.seed.len() + node_id.len() + 8);
        material.extend_from_slice(&(self.seed.len() as u64).to_le_bytes());
        material.extend_from_slice(&self.seed);
        material.extend_from_slice(node_id.as_bytes());

        let mut secret = blake3::derive_key(SEEDED_KEY_CONTEXT, &material);
        material.zeroize();
        let keys = NodeKeys::from_bytes(&secret);
        secret.zeroize();
        if let Ok(keys) = &keys {
            debug!(node_id, key_id = %keys.public_key_id(), "Derived seeded node key");
        }
        keys
    }
}

impl Drop for SeededKeyProvider {
    fn drop(&mut self) {
        self.seed.zeroize();
    }
}
