//! Local and turf node collections
//!
//! - [`NodeStore`]: the device's own nodes plus the sync watermark. The only
//!   collection a device ever persists.
//! - [`TurfStore`]: deduplicated overlay of other participants' nodes,
//!   rebuilt on every turf refresh and never persisted as authoritative.

use crate::dedupe::dedupe;
use crate::id::NodeId;
use crate::node::{Epoch, Node};
use serde::{Deserialize, Serialize};

/// The device's authoritative node collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeStore {
    #[serde(default)]
    pub nodes: Vec<Node>,

    /// Epoch of the last successful remote write
    #[serde(default)]
    pub last_synced: Epoch,

    /// Epoch of the last local save
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_saved: Option<Epoch>,
}

impl NodeStore {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding `nodes`
    #[inline]
    #[must_use]
    pub fn with_nodes(nodes: Vec<Node>) -> Self {
        Self {
            nodes,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|node| &node.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Replace the node with the same id; returns false when absent
    pub fn replace(&mut self, node: Node) -> bool {
        match self.nodes.iter_mut().find(|n| n.id == node.id) {
            Some(slot) => {
                *slot = node;
                true
            }
            None => false,
        }
    }

    /// Append a node without duplicate checks
    #[inline]
    pub fn push(&mut self, node: Node) {
        self.nodes.push(node);
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Copy stamped with a candidate `last_synced`, as uploaded
    #[must_use]
    pub fn stamped(&self, last_synced: Epoch) -> Self {
        Self {
            last_synced,
            ..self.clone()
        }
    }
}

/// Read-mostly overlay of remote participants' nodes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurfStore {
    nodes: Vec<Node>,
}

impl TurfStore {
    /// Build an overlay from raw remote nodes (deduplicated on entry)
    #[must_use]
    pub fn from_nodes<I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = Node>,
    {
        Self {
            nodes: dedupe(nodes),
        }
    }

    #[inline]
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }
}
