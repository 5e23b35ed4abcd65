//! Core types shared by every mesh component.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a node in the mesh
pub type NodeId = String;

/// BLAKE3 digest identifying a message across the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub [u8; 32]);

impl MessageId {
    /// Hex encoding of the full digest
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// A signed assertion of a metric value at a point in time.
///
/// Messages are immutable once built. The signature covers `content` only and
/// must verify under the embedded `public_key` before any node stores the
/// message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalMessage {
    timestamp: i64,
    vorticity: f64,
    phase: f64,
    content: Vec<u8>,
    signature: Vec<u8>,
    public_key: Vec<u8>,
}

impl TemporalMessage {
    /// Assemble a message from its parts. No verification happens here.
    pub fn new(
        timestamp: i64,
        vorticity: f64,
        phase: f64,
        content: Vec<u8>,
        signature: Vec<u8>,
        public_key: Vec<u8>,
    ) -> Self {
        Self {
            timestamp,
            vorticity,
            phase,
            content,
            signature,
            public_key,
        }
    }

    /// Creation time (Unix seconds)
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Asserted metric value, also used as the quality signal
    pub fn vorticity(&self) -> f64 {
        self.vorticity
    }

    /// Auxiliary phase value
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Opaque payload covered by the signature
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Ed25519 signature over `content`
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Signer's public key
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Content-addressed identity of the whole message.
    ///
    /// Every field is hashed, variable-length fields with a length prefix, so
    /// two messages share an id only if they are identical.
    pub fn message_id(&self) -> MessageId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.timestamp.to_le_bytes());
        hasher.update(&self.vorticity.to_bits().to_le_bytes());
        hasher.update(&self.phase.to_bits().to_le_bytes());
        for field in [&self.content, &self.signature, &self.public_key] {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field);
        }
        MessageId(*hasher.finalize().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TemporalMessage {
        TemporalMessage::new(
            1_700_000_000,
            0.74,
            0.5,
            b"sync".to_vec(),
            vec![1; 64],
            vec![2; 32],
        )
    }

    #[test]
    fn test_message_id_is_stable() {
        assert_eq!(sample().message_id(), sample().message_id());
    }

    #[test]
    fn test_message_id_covers_every_field() {
        let base = sample().message_id();
        let ts = 1_700_000_000;
        let variants = [
            TemporalMessage::new(ts + 1, 0.74, 0.5, b"sync".to_vec(), vec![1; 64], vec![2; 32]),
            TemporalMessage::new(ts, 0.75, 0.5, b"sync".to_vec(), vec![1; 64], vec![2; 32]),
            TemporalMessage::new(ts, 0.74, 0.6, b"sync".to_vec(), vec![1; 64], vec![2; 32]),
            TemporalMessage::new(ts, 0.74, 0.5, b"sync!".to_vec(), vec![1; 64], vec![2; 32]),
            TemporalMessage::new(ts, 0.74, 0.5, b"sync".to_vec(), vec![3; 64], vec![2; 32]),
            TemporalMessage::new(ts, 0.74, 0.5, b"sync".to_vec(), vec![1; 64], vec![4; 32]),
        ];
        for variant in variants {
            assert_ne!(variant.message_id(), base);
        }
    }

    #[test]
    fn test_length_prefix_prevents_field_shifting() {
        let a = TemporalMessage::new(0, 0.7, 0.0, b"ab".to_vec(), b"c".to_vec(), vec![]);
        let b = TemporalMessage::new(0, 0.7, 0.0, b"a".to_vec(), b"bc".to_vec(), vec![]);
        assert_ne!(a.message_id(), b.message_id());
    }

    #[test]
    fn test_message_serde_roundtrip() {
        let msg = sample();
        let json = serde_json::to_string(&msg).unwrap();
        let back: TemporalMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
