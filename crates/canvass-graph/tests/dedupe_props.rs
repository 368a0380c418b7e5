use canvass_graph::{
    dedupe, merge_views, Address, KeyValueStore, LatLng, MemoryKv, Node, NodeDraft, NodeGraph,
    NodeId, Payload, SurveyAnswers, SurveyStatus,
};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

fn survey(id: u8, updated: i64) -> Node {
    Node {
        id: NodeId::new(format!("n{id}")),
        parent_id: Some(NodeId::new("addr")),
        created: 0,
        updated,
        canvasser: String::new(),
        payload: Payload::Survey {
            status: SurveyStatus::NotHome,
            survey: SurveyAnswers::new(),
        },
    }
}

/// Nodes with a small id space and globally distinct `updated` values
fn nodes_strategy() -> impl Strategy<Value = Vec<Node>> {
    proptest::collection::vec((0u8..8, 0i64..1_000), 0..40).prop_map(|raw| {
        raw.into_iter()
            .enumerate()
            .map(|(pos, (id, ts))| survey(id, ts * 100 + pos as i64))
            .collect()
    })
}

fn ids(nodes: &[Node]) -> Vec<String> {
    nodes.iter().map(|n| n.id.to_string()).collect()
}

proptest! {
    #[test]
    fn prop_dedupe_keeps_newest_once(nodes in nodes_strategy()) {
        let mut newest: HashMap<NodeId, i64> = HashMap::new();
        for node in &nodes {
            let entry = newest.entry(node.id.clone()).or_insert(node.updated);
            *entry = (*entry).max(node.updated);
        }

        let out = dedupe(nodes);
        prop_assert_eq!(out.len(), newest.len());
        for node in &out {
            prop_assert_eq!(newest[&node.id], node.updated);
        }
        prop_assert!(out.windows(2).all(|w| w[0].updated >= w[1].updated));
    }

    #[test]
    fn prop_dedupe_is_idempotent(nodes in nodes_strategy()) {
        let once = dedupe(nodes);
        let twice = dedupe(once.clone());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_dedupe_merges_associatively(a in nodes_strategy(), b in nodes_strategy()) {
        // Shift b so timestamps stay distinct across both inputs
        let b: Vec<Node> = b
            .into_iter()
            .map(|mut n| {
                n.updated = n.updated * 2 + 1;
                n
            })
            .collect();
        let a: Vec<Node> = a
            .into_iter()
            .map(|mut n| {
                n.updated *= 2;
                n
            })
            .collect();

        let flat = dedupe(a.iter().chain(b.iter()).cloned());
        let staged = dedupe(dedupe(a.clone()).into_iter().chain(dedupe(b.clone())));
        prop_assert_eq!(ids(&flat), ids(&staged));

        let merged = merge_views(&a, &b);
        prop_assert_eq!(ids(&merged), ids(&flat));
    }

    #[test]
    fn prop_add_node_is_idempotent(street in "[A-Za-z0-9 ]{1,24}", zip in "[0-9]{5}") {
        let kv = Arc::new(MemoryKv::new());
        let mut graph = NodeGraph::open(kv.clone(), "form", "Pat").unwrap();
        let draft = NodeDraft::address(
            Address::new(street, "Springfield", "IL", zip),
            LatLng::new(39.7, -89.6),
            false,
        );

        let first = graph.add_node(draft.clone()).unwrap();
        let blob = kv.get("OV_CANVASS_PINS@form").unwrap();
        let second = graph.add_node(draft).unwrap();

        prop_assert_eq!(first, second);
        prop_assert_eq!(graph.local().len(), 1);
        prop_assert_eq!(kv.get("OV_CANVASS_PINS@form").unwrap(), blob);
    }
}

#[test]
fn ties_prefer_first_offered() {
    let local = vec![survey(1, 10)];
    let mut turf_copy = survey(1, 10);
    turf_copy.canvasser = "remote".into();

    let merged = merge_views(&local, &[turf_copy]);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].canvasser, "");
}
