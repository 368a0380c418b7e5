//! Derived lookup structures over the merged view
//!
//! Provides [`NodeIndex`]: id -> position and parent id -> child positions
//! (most recently updated first). Positions point into the view slice the
//! index was built from, so the index is only valid for that exact slice and
//! is rebuilt wholesale whenever the view changes.

use crate::id::NodeId;
use crate::node::{Node, NodeType};
use std::collections::HashMap;

/// Rebuildable index over a node slice
#[derive(Debug, Clone, Default)]
pub struct NodeIndex {
    /// id -> position in the view
    by_id: HashMap<NodeId, usize>,

    /// parent id -> child positions, descending `updated`
    children: HashMap<NodeId, Vec<usize>>,

    /// Length of the view the index was built for
    len: usize,
}

impl NodeIndex {
    /// Build the index for `view`
    #[must_use]
    pub fn build(view: &[Node]) -> Self {
        let mut by_id = HashMap::with_capacity(view.len());
        let mut children: HashMap<NodeId, Vec<usize>> = HashMap::new();

        for (pos, node) in view.iter().enumerate() {
            by_id.entry(node.id.clone()).or_insert(pos);
            if let Some(parent) = &node.parent_id {
                children.entry(parent.clone()).or_default().push(pos);
            }
        }

        for positions in children.values_mut() {
            positions.sort_by(|&a, &b| view[b].updated.cmp(&view[a].updated));
        }

        Self {
            by_id,
            children,
            len: view.len(),
        }
    }

    /// Whether this index was built for a view of `len` nodes
    #[inline]
    #[must_use]
    pub fn covers(&self, len: usize) -> bool {
        self.len == len
    }

    /// Number of indexed ids
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Lookup a node by id
    #[must_use]
    pub fn get<'a>(&self, view: &'a [Node], id: &NodeId) -> Option<&'a Node> {
        self.by_id.get(id).and_then(|&pos| view.get(pos))
    }

    /// Children of `parent` with the given type, most recently updated first
    #[must_use]
    pub fn children<'a>(
        &self,
        view: &'a [Node],
        parent: &NodeId,
        node_type: NodeType,
    ) -> Vec<&'a Node> {
        self.children
            .get(parent)
            .map(|positions| {
                positions
                    .iter()
                    .filter_map(|&pos| view.get(pos))
                    .filter(|node| node.is_type(node_type))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `parent` has any indexed children
    #[must_use]
    pub fn has_children(&self, parent: &NodeId) -> bool {
        self.children.get(parent).is_some_and(|c| !c.is_empty())
    }
}

/// Full scan for children, used when no index is available
#[must_use]
pub fn scan_children<'a>(view: &'a [Node], parent: &NodeId, node_type: NodeType) -> Vec<&'a Node> {
    let mut found: Vec<&Node> = view
        .iter()
        .filter(|node| node.parent_id.as_ref() == Some(parent) && node.is_type(node_type))
        .collect();
    found.sort_by(|a, b| b.updated.cmp(&a.updated));
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Address, Payload, SurveyStatus};

    fn address(id: &str) -> Node {
        Node {
            id: NodeId::new(id),
            parent_id: None,
            created: 1,
            updated: 1,
            canvasser: String::new(),
            payload: Payload::Address {
                address: Address::default(),
                latlng: None,
                multi_unit: true,
            },
        }
    }

    fn child(id: &str, parent: &str, updated: i64, unit: bool) -> Node {
        let payload = if unit {
            Payload::Unit {
                unit: id.to_string(),
            }
        } else {
            Payload::Survey {
                status: SurveyStatus::NotHome,
                survey: Default::default(),
            }
        };
        Node {
            id: NodeId::new(id),
            parent_id: Some(NodeId::new(parent)),
            created: updated,
            updated,
            canvasser: String::new(),
            payload,
        }
    }

    fn view() -> Vec<Node> {
        vec![
            address("a"),
            child("s1", "a", 5, false),
            child("u1", "a", 7, true),
            child("s2", "a", 9, false),
            child("s3", "u1", 2, false),
        ]
    }

    #[test]
    fn lookup_by_id() {
        let view = view();
        let index = NodeIndex::build(&view);
        assert_eq!(index.len(), 5);
        assert!(index.covers(5));
        assert_eq!(index.get(&view, &NodeId::new("u1")).unwrap().unit(), Some("u1"));
        assert!(index.get(&view, &NodeId::new("zz")).is_none());
    }

    #[test]
    fn children_filtered_and_ordered() {
        let view = view();
        let index = NodeIndex::build(&view);
        let surveys = index.children(&view, &NodeId::new("a"), NodeType::Survey);
        let ids: Vec<&str> = surveys.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["s2", "s1"]);

        let units = index.children(&view, &NodeId::new("a"), NodeType::Unit);
        assert_eq!(units.len(), 1);
    }

    #[test]
    fn scan_matches_index() {
        let view = view();
        let index = NodeIndex::build(&view);
        let parent = NodeId::new("a");
        let from_index: Vec<&NodeId> = index
            .children(&view, &parent, NodeType::Survey)
            .into_iter()
            .map(|n| &n.id)
            .collect();
        let from_scan: Vec<&NodeId> = scan_children(&view, &parent, NodeType::Survey)
            .into_iter()
            .map(|n| &n.id)
            .collect();
        assert_eq!(from_index, from_scan);
    }

    #[test]
    fn empty_index() {
        let index = NodeIndex::default();
        assert!(index.is_empty());
        assert!(!index.has_children(&NodeId::new("a")));
    }
}
