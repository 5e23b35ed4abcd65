//! Route-by-geometry: nearest neighbor in BLAKE3 hash space.
//!
//! Every node id is placed at `BLAKE3(id)`. A routing target is any 32-byte
//! key, and the neighbor with the smallest XOR distance to it wins.

use crate::error::{MeshError, MeshResult};
use chronoflux_core::NodeId;
use std::fmt;

/// A point in the 256-bit routing space.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryKey([u8; 32]);

impl GeometryKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(hex_str: &str) -> MeshResult<Self> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| MeshError::InvalidRouteKey(format!("{hex_str}: {e}")))?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            MeshError::InvalidRouteKey(format!("expected 32 bytes, got {}", v.len()))
        })?;
        Ok(Self(bytes))
    }

    /// Key of arbitrary content.
    pub fn of_content(content: &[u8]) -> Self {
        Self(*blake3::hash(content).as_bytes())
    }

    /// Position of a node in the routing space.
    pub fn for_node(id: &str) -> Self {
        Self::of_content(id.as_bytes())
    }

    /// Bytewise XOR, compared big-endian.
    pub fn xor_distance(&self, other: &GeometryKey) -> [u8; 32] {
        let mut out = [0u8; 32];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.0[i] ^ other.0[i];
        }
        out
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for GeometryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GeometryKey({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for GeometryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Pick the candidate closest to `target`. Ties break by id.
pub fn closest_neighbor<'a, I>(candidates: I, target: &GeometryKey) -> Option<NodeId>
where
    I: IntoIterator<Item = &'a NodeId>,
{
    candidates
        .into_iter()
        .min_by(|a, b| {
            let da = GeometryKey::for_node(a).xor_distance(target);
            let db = GeometryKey::for_node(b).xor_distance(target);
            da.cmp(&db).then_with(|| a.cmp(b))
        })
        .cloned()
}
