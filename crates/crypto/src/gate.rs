//! Signature gate: the first check every message passes before touching
//! node state.
//!
//! The quality floor is evaluated before any cryptography, so low-quality
//! traffic is discarded cheaply.

use chronoflux_core::{GateConfig, TemporalMessage, QUALITY_FLOOR};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use thiserror::Error;

/// Why the gate refused a message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GateRejection {
    #[error("vorticity {vorticity} below quality floor {floor}")]
    BelowQualityFloor { vorticity: f64, floor: f64 },

    #[error("malformed public key ({len} bytes)")]
    MalformedPublicKey { len: usize },

    #[error("malformed signature ({len} bytes, expected 64)")]
    MalformedSignature { len: usize },

    #[error("signature does not verify against content")]
    InvalidSignature,
}

/// Authenticity and quality predicate over [`TemporalMessage`]s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignatureGate {
    quality_floor: f64,
}

impl SignatureGate {
    pub fn new(quality_floor: f64) -> Self {
        Self { quality_floor }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(config.quality_floor)
    }

    pub fn quality_floor(&self) -> f64 {
        self.quality_floor
    }

    /// True only if the message clears the floor and its signature verifies.
    pub fn verify(&self, message: &TemporalMessage) -> bool {
        self.check(message).is_ok()
    }

    /// Like [`SignatureGate::verify`], naming the first failed check.
    pub fn check(&self, message: &TemporalMessage) -> Result<(), GateRejection> {
        let vorticity = message.vorticity();
        // NaN compares false and is rejected here too.
        if !(vorticity >= self.quality_floor) {
            return Err(GateRejection::BelowQualityFloor {
                vorticity,
                floor: self.quality_floor,
            });
        }

        let key_bytes: &[u8; 32] = message
            .public_key()
            .try_into()
            .map_err(|_| GateRejection::MalformedPublicKey {
                len: message.public_key().len(),
            })?;
        let public_key = VerifyingKey::from_bytes(key_bytes).map_err(|_| {
            GateRejection::MalformedPublicKey {
                len: key_bytes.len(),
            }
        })?;

        let signature = Signature::from_slice(message.signature()).map_err(|_| {
            GateRejection::MalformedSignature {
                len: message.signature().len(),
            }
        })?;

        public_key
            .verify(message.content(), &signature)
            .map_err(|_| GateRejection::InvalidSignature)
    }
}

impl Default for SignatureGate {
    fn default() -> Self {
        Self::new(QUALITY_FLOOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::NodeKeys;
    use proptest::prelude::*;

    fn signed(vorticity: f64, content: &[u8]) -> (NodeKeys, TemporalMessage) {
        let keys = NodeKeys::from_bytes(&[5u8; 32]).unwrap();
        let msg = keys.sign_message(1_700_000_000, vorticity, 0.0, content.to_vec());
        (keys, msg)
    }

    fn rebuild(msg: &TemporalMessage, content: Vec<u8>, signature: Vec<u8>) -> TemporalMessage {
        TemporalMessage::new(
            msg.timestamp(),
            msg.vorticity(),
            msg.phase(),
            content,
            signature,
            msg.public_key().to_vec(),
        )
    }

    #[test]
    fn test_accepts_valid_message() {
        let (_, msg) = signed(0.74, b"Chronoflux sync");
        assert!(SignatureGate::default().verify(&msg));
    }

    #[test]
    fn test_floor_is_inclusive() {
        let (_, msg) = signed(0.7, b"edge");
        assert_eq!(SignatureGate::default().check(&msg), Ok(()));
    }

    #[test]
    fn test_rejects_below_floor_before_crypto() {
        let (_, msg) = signed(0.715, b"payload");
        // Garbage key would fail later checks, but the floor fires first.
        let msg = TemporalMessage::new(0, 0.69, 0.0, msg.content().to_vec(), vec![], vec![]);
        assert!(matches!(
            SignatureGate::default().check(&msg),
            Err(GateRejection::BelowQualityFloor { .. })
        ));
    }

    #[test]
    fn test_rejects_nan_vorticity() {
        let (_, msg) = signed(f64::NAN, b"payload");
        assert!(!SignatureGate::default().verify(&msg));
    }

    #[test]
    fn test_rejects_tampered_content() {
        let (_, msg) = signed(0.9, b"original");
        let tampered = rebuild(&msg, b"forged".to_vec(), msg.signature().to_vec());
        assert_eq!(
            SignatureGate::default().check(&tampered),
            Err(GateRejection::InvalidSignature)
        );
    }

    #[test]
    fn test_rejects_foreign_key() {
        let (_, msg) = signed(0.9, b"original");
        let other = NodeKeys::from_bytes(&[6u8; 32]).unwrap();
        let swapped = TemporalMessage::new(
            msg.timestamp(),
            msg.vorticity(),
            msg.phase(),
            msg.content().to_vec(),
            msg.signature().to_vec(),
            other.public_key(),
        );
        assert!(!SignatureGate::default().verify(&swapped));
    }

    #[test]
    fn test_rejects_malformed_lengths() {
        let (_, msg) = signed(0.9, b"original");
        let short_sig = rebuild(&msg, msg.content().to_vec(), vec![0u8; 10]);
        assert_eq!(
            SignatureGate::default().check(&short_sig),
            Err(GateRejection::MalformedSignature { len: 10 })
        );

        let short_key = TemporalMessage::new(0, 0.9, 0.0, vec![], vec![0u8; 64], vec![1u8; 5]);
        assert_eq!(
            SignatureGate::default().check(&short_key),
            Err(GateRejection::MalformedPublicKey { len: 5 })
        );
    }

    #[test]
    fn test_custom_floor() {
        let (_, msg) = signed(0.75, b"payload");
        assert!(!SignatureGate::new(0.8).verify(&msg));
        assert!(SignatureGate::new(0.5).verify(&msg));
    }

    proptest! {
        #[test]
        fn valid_messages_pass_and_are_idempotent(
            content in prop::collection::vec(any::<u8>(), 0..256),
            vorticity in 0.7f64..=1.0,
            secret in any::<[u8; 32]>(),
        ) {
            let keys = NodeKeys::from_bytes(&secret).unwrap();
            let msg = keys.sign_message(0, vorticity, 0.0, content);
            let gate = SignatureGate::default();
            prop_assert!(gate.verify(&msg));
            prop_assert_eq!(gate.verify(&msg), gate.verify(&msg));
        }

        #[test]
        fn any_signature_bit_flip_is_rejected(
            content in prop::collection::vec(any::<u8>(), 1..128),
            bit in 0usize..512,
        ) {
            let (_, msg) = signed(0.8, &content);
            let mut signature = msg.signature().to_vec();
            signature[bit / 8] ^= 1 << (bit % 8);
            let tampered = rebuild(&msg, msg.content().to_vec(), signature);
            prop_assert!(!SignatureGate::default().verify(&tampered));
        }

        #[test]
        fn any_content_bit_flip_is_rejected(
            content in prop::collection::vec(any::<u8>(), 1..128),
            index in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let (_, msg) = signed(0.8, &content);
            let mut forged = msg.content().to_vec();
            let i = index.index(forged.len());
            forged[i] ^= 1 << bit;
            let tampered = rebuild(&msg, forged, msg.signature().to_vec());
            prop_assert!(!SignatureGate::default().verify(&tampered));
        }

        #[test]
        fn below_floor_never_passes(vorticity in -10.0f64..0.7) {
            let (_, msg) = signed(vorticity, b"payload");
            prop_assert!(!SignatureGate::default().verify(&msg));
        }
    }
}
