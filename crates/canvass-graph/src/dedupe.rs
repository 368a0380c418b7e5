//! Last-write-wins dedupe
//!
//! [`dedupe`] is the single consistency primitive used wherever two or more
//! node sets are combined: local + turf, or every participant file during
//! aggregation.

use crate::id::NodeId;
use crate::node::Node;
use std::collections::HashSet;

/// Summary of one dedupe pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupeReport {
    /// Nodes offered
    pub input: usize,
    /// Nodes kept (one per id)
    pub kept: usize,
}

impl DedupeReport {
    /// Older duplicates that were dropped
    #[inline]
    #[must_use]
    pub fn discarded(&self) -> usize {
        self.input - self.kept
    }
}

/// Keep the most recently updated node for every id
///
/// The result is ordered by descending `updated`. The sort is stable, so
/// among nodes with equal `updated` the one offered first wins: callers put
/// local nodes ahead of turf nodes to make ties prefer local.
#[must_use]
pub fn dedupe<I>(nodes: I) -> Vec<Node>
where
    I: IntoIterator<Item = Node>,
{
    dedupe_with_report(nodes).0
}

/// [`dedupe`], also reporting how many duplicates were dropped
#[must_use]
pub fn dedupe_with_report<I>(nodes: I) -> (Vec<Node>, DedupeReport)
where
    I: IntoIterator<Item = Node>,
{
    let mut nodes: Vec<Node> = nodes.into_iter().collect();
    let input = nodes.len();

    nodes.sort_by(|a, b| b.updated.cmp(&a.updated));

    let mut seen: HashSet<NodeId> = HashSet::with_capacity(nodes.len());
    nodes.retain(|node| seen.insert(node.id.clone()));

    let report = DedupeReport {
        input,
        kept: nodes.len(),
    };
    (nodes, report)
}

/// Merge local nodes with a turf overlay (local first, so ties prefer local)
#[must_use]
pub fn merge_views(local: &[Node], turf: &[Node]) -> Vec<Node> {
    dedupe(local.iter().chain(turf.iter()).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Payload, SurveyStatus};

    fn survey(id: &str, updated: i64, canvasser: &str) -> Node {
        Node {
            id: NodeId::new(id),
            parent_id: Some(NodeId::new("addr")),
            created: 0,
            updated,
            canvasser: canvasser.to_string(),
            payload: Payload::Survey {
                status: SurveyStatus::Home,
                survey: Default::default(),
            },
        }
    }

    #[test]
    fn keeps_most_recent_per_id() {
        let out = dedupe(vec![
            survey("a", 1, "old"),
            survey("b", 5, "b"),
            survey("a", 9, "new"),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id.as_str(), "a");
        assert_eq!(out[0].canvasser, "new");
        assert_eq!(out[1].id.as_str(), "b");
    }

    #[test]
    fn ties_prefer_first_offered() {
        let local = vec![survey("a", 3, "local")];
        let turf = vec![survey("a", 3, "turf")];
        let merged = merge_views(&local, &turf);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].canvasser, "local");
    }

    #[test]
    fn idempotent() {
        let once = dedupe(vec![
            survey("a", 1, "x"),
            survey("a", 2, "y"),
            survey("c", 2, "z"),
        ]);
        let twice = dedupe(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn report_counts_discards() {
        let (_, report) = dedupe_with_report(vec![
            survey("a", 1, "x"),
            survey("a", 2, "y"),
            survey("a", 3, "z"),
        ]);
        assert_eq!(report.input, 3);
        assert_eq!(report.kept, 1);
        assert_eq!(report.discarded(), 2);
    }

    #[test]
    fn empty_input() {
        assert!(dedupe(Vec::new()).is_empty());
    }
}
