//! Mesh registry: the single owner of every node.
//!
//! Topology is expressed as neighbor ids on each node, never as direct
//! references, so removing a node is just a registry operation.

use crate::error::{MeshError, MeshResult};
use crate::node::MeshNode;
use chronoflux_core::NodeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

#[derive(Debug, Default)]
struct RegistryInner {
    nodes: HashMap<NodeId, Arc<MeshNode>>,
    /// Insertion order of node ids
    order: Vec<NodeId>,
}

/// Stable collection of mesh nodes.
#[derive(Debug, Default)]
pub struct MeshRegistry {
    inner: RwLock<RegistryInner>,
}

impl MeshRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a node. Ids must be unique.
    pub fn insert(&self, node: MeshNode) -> MeshResult<Arc<MeshNode>> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.nodes.contains_key(node.id()) {
            return Err(MeshError::DuplicateNode {
                node_id: node.id().to_string(),
            });
        }

        let node = Arc::new(node);
        let id = node.id().to_string();
        inner.order.push(id.clone());
        inner.nodes.insert(id, Arc::clone(&node));
        debug!(node_id = node.id(), "Node registered");
        Ok(node)
    }

    pub fn get(&self, id: &str) -> Option<Arc<MeshNode>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .nodes
            .get(id)
            .cloned()
    }

    pub(crate) fn require(&self, id: &str) -> MeshResult<Arc<MeshNode>> {
        self.get(id).ok_or_else(|| MeshError::NodeNotFound {
            node_id: id.to_string(),
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .nodes
            .contains_key(id)
    }

    /// Node ids in insertion order.
    pub fn ids(&self) -> Vec<NodeId> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add `to` at the end of `from`'s neighbor list.
    ///
    /// Returns false if the link already existed.
    pub fn connect(&self, from: &str, to: &str) -> MeshResult<bool> {
        if from == to {
            return Err(MeshError::SelfLink {
                node_id: from.to_string(),
            });
        }
        let source = self.require(from)?;
        self.require(to)?;
        Ok(source.add_neighbor(to.to_string()))
    }

    /// Connect both directions.
    pub fn link(&self, a: &str, b: &str) -> MeshResult<()> {
        self.connect(a, b)?;
        self.connect(b, a)?;
        Ok(())
    }

    /// Detach a node and prune it from every neighbor list.
    pub fn remove(&self, id: &str) -> MeshResult<Arc<MeshNode>> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let removed = inner.nodes.remove(id).ok_or_else(|| MeshError::NodeNotFound {
            node_id: id.to_string(),
        })?;
        inner.order.retain(|n| n != id);
        for node in inner.nodes.values() {
            node.remove_neighbor(id);
        }
        debug!(node_id = id, "Node removed");
        Ok(removed)
    }

    /// Live neighbor handles of `node`, in link order.
    ///
    /// Ids that no longer resolve are skipped.
    pub fn resolve_neighbors(&self, node: &MeshNode) -> Vec<Arc<MeshNode>> {
        let neighbor_ids = node.neighbors();
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        neighbor_ids
            .iter()
            .filter_map(|id| inner.nodes.get(id).cloned())
            .collect()
    }
}
