//! Per-form working graph
//!
//! [`NodeGraph`] owns the local [`NodeStore`], the [`TurfStore`] overlay, the
//! merged (deduplicated) view and the [`NodeIndex`] derived from it. Every
//! mutation persists the local store before returning and rebuilds the view
//! and index; readers see a fresh snapshot after each call.

use crate::dedupe::merge_views;
use crate::error::{GraphError, Result};
use crate::id::NodeId;
use crate::index::{scan_children, NodeIndex};
use crate::node::{
    now_epoch, Address, Epoch, LatLng, Node, NodeDraft, NodeType, Payload, SurveyAnswers,
    SurveyStatus,
};
use crate::codec;
use crate::storage::{keys, KeyValueStore};
use crate::store::{NodeStore, TurfStore};
use std::fmt;
use std::sync::Arc;

/// Source of epoch seconds
pub type Clock = Arc<dyn Fn() -> Epoch + Send + Sync>;

/// A single-field mutation applied by [`NodeGraph::update_node`]
#[derive(Debug, Clone, PartialEq)]
pub enum NodeField {
    Status(SurveyStatus),
    Survey(SurveyAnswers),
    MultiUnit(bool),
    Unit(String),
    Location(LatLng),
    Address(Address),
}

impl NodeField {
    /// Field name as stored
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::Survey(_) => "survey",
            Self::MultiUnit(_) => "multi_unit",
            Self::Unit(_) => "unit",
            Self::Location(_) => "latlng",
            Self::Address(_) => "address",
        }
    }

    fn apply(self, node: &mut Node) -> Result<()> {
        let field = self.name();
        match (self, &mut node.payload) {
            (Self::Status(value), Payload::Survey { status, .. }) => *status = value,
            (Self::Survey(value), Payload::Survey { survey, .. }) => *survey = value,
            (Self::MultiUnit(value), Payload::Address { multi_unit, .. }) => *multi_unit = value,
            (Self::Unit(value), Payload::Unit { unit }) => *unit = value,
            (Self::Location(value), Payload::Address { latlng, .. }) => *latlng = Some(value),
            (Self::Address(value), Payload::Address { address, .. }) => *address = value,
            (_, payload) => {
                return Err(GraphError::FieldMismatch {
                    id: node.id.clone(),
                    field,
                    node_type: payload.node_type().map_or("unknown", |t| t.as_str()),
                })
            }
        }
        Ok(())
    }
}

/// Display state of an address pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressStatus {
    /// Multi-unit building; status lives on the units
    MultiUnit,
    /// No survey taken yet
    Unvisited,
    /// Outcome of the most recent survey
    Visited(SurveyStatus),
}

/// Summary of the most recent survey below a node
#[derive(Debug, Clone, PartialEq)]
pub struct SurveySummary {
    pub full_name: Option<serde_json::Value>,
    pub party_affiliation: Option<serde_json::Value>,
    pub last_visited: Epoch,
}

/// The per-form working set: local store, turf overlay, merged view, index
pub struct NodeGraph {
    storage: Arc<dyn KeyValueStore>,
    key: String,
    canvasser: String,
    local: NodeStore,
    turf: TurfStore,
    view: Vec<Node>,
    index: Option<NodeIndex>,
    current: Option<NodeId>,
    clock: Clock,
}

impl fmt::Debug for NodeGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeGraph")
            .field("key", &self.key)
            .field("canvasser", &self.canvasser)
            .field("local", &self.local.len())
            .field("turf", &self.turf.len())
            .field("view", &self.view.len())
            .field("indexed", &self.index.is_some())
            .finish_non_exhaustive()
    }
}

impl NodeGraph {
    /// Load the graph for `form_id` from local storage (empty when absent)
    ///
    /// # Errors
    /// Returns error if storage cannot be read
    pub fn open(
        storage: Arc<dyn KeyValueStore>,
        form_id: &str,
        canvasser: impl Into<String>,
    ) -> Result<Self> {
        let key = keys::pins(form_id);
        let local = match storage.get(&key)? {
            Some(blob) => codec::decode_store(blob.as_bytes()),
            None => NodeStore::default(),
        };
        tracing::debug!(key = %key, nodes = local.len(), "opened node store");

        let mut graph = Self {
            storage,
            key,
            canvasser: canvasser.into(),
            local,
            turf: TurfStore::default(),
            view: Vec::new(),
            index: None,
            current: None,
            clock: Arc::new(now_epoch),
        };
        graph.refresh();
        Ok(graph)
    }

    /// Replace the clock (tests, replays)
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[inline]
    #[must_use]
    pub fn now(&self) -> Epoch {
        (self.clock)()
    }

    #[inline]
    #[must_use]
    pub fn storage_key(&self) -> &str {
        &self.key
    }

    #[inline]
    #[must_use]
    pub fn canvasser(&self) -> &str {
        &self.canvasser
    }

    #[inline]
    #[must_use]
    pub fn local(&self) -> &NodeStore {
        &self.local
    }

    #[inline]
    #[must_use]
    pub fn turf(&self) -> &TurfStore {
        &self.turf
    }

    /// Merged, deduplicated view (descending `updated`)
    #[inline]
    #[must_use]
    pub fn view(&self) -> &[Node] {
        &self.view
    }

    /// Select the node the user is working on
    pub fn select(&mut self, id: Option<NodeId>) {
        self.current = id;
    }

    #[inline]
    #[must_use]
    pub fn current(&self) -> Option<&NodeId> {
        self.current.as_ref()
    }

    /// Add a node to the local store
    ///
    /// Stamps `created`/`updated`, derives an id when the draft has none and
    /// persists. Adding a node whose id is already in the local store returns
    /// the stored node untouched and writes nothing.
    ///
    /// # Errors
    /// - `GraphError::InvalidParent` if the parent is missing or of the wrong type
    /// - storage errors (the store is left as it was)
    pub fn add_node(&mut self, draft: NodeDraft) -> Result<Node> {
        self.check_parent(&draft)?;

        let epoch = self.now();
        let id = match &draft.id {
            Some(id) => id.clone(),
            None => self.derive_id(epoch, &draft)?,
        };

        if let Some(existing) = self.local.get(&id) {
            tracing::debug!(id = %id.short(), "node already stored");
            return Ok(existing.clone());
        }

        let node = Node {
            id,
            parent_id: draft.parent_id,
            created: epoch,
            updated: epoch,
            canvasser: self.canvasser.clone(),
            payload: draft.payload,
        };

        self.local.push(node.clone());
        if let Err(e) = self.save(true) {
            self.local.nodes.pop();
            return Err(e);
        }
        self.refresh();

        tracing::debug!(id = %node.id.short(), node_type = ?node.node_type(), "node added");
        Ok(node)
    }

    /// Mutate one field of a node anywhere in the merged view
    ///
    /// A node that so far only exists in the turf overlay is copied into the
    /// local store on its first mutation.
    ///
    /// # Errors
    /// - `GraphError::NotFound` if no node has this id
    /// - `GraphError::FieldMismatch` if the field does not apply
    /// - storage errors (the store is left as it was)
    pub fn update_node(&mut self, id: &NodeId, field: NodeField) -> Result<Node> {
        let mut node = self
            .node(id)
            .cloned()
            .ok_or_else(|| GraphError::NotFound(id.clone()))?;
        field.apply(&mut node)?;
        node.updated = self.now();

        let previous = self.local.get(id).cloned();
        match previous {
            Some(_) => {
                self.local.replace(node.clone());
            }
            None => {
                tracing::debug!(id = %id.short(), "promoting turf node to local store");
                self.local.push(node.clone());
            }
        }

        if let Err(e) = self.save(true) {
            match previous {
                Some(old) => {
                    self.local.replace(old);
                }
                None => {
                    self.local.nodes.pop();
                }
            }
            return Err(e);
        }
        self.refresh();
        Ok(node)
    }

    /// Lookup by id across the merged view
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        match self.live_index() {
            Some(index) => index.get(&self.view, id),
            None => self.view.iter().find(|node| &node.id == id),
        }
    }

    /// All nodes of a type in the merged view
    #[must_use]
    pub fn nodes_by_type(&self, node_type: NodeType) -> Vec<&Node> {
        self.view.iter().filter(|node| node.is_type(node_type)).collect()
    }

    /// Children of `parent` with `node_type`, most recently updated first
    #[must_use]
    pub fn children(&self, parent: &NodeId, node_type: NodeType) -> Vec<&Node> {
        match self.live_index() {
            Some(index) => index.children(&self.view, parent, node_type),
            None => scan_children(&self.view, parent, node_type),
        }
    }

    /// Display state of an address pin
    #[must_use]
    pub fn address_status(&self, address: &Node) -> AddressStatus {
        if address.is_multi_unit() {
            return AddressStatus::MultiUnit;
        }
        match self.latest_survey(&address.id).and_then(Node::status) {
            Some(status) => AddressStatus::Visited(status),
            None => AddressStatus::Unvisited,
        }
    }

    /// Most recently updated survey below `parent`
    #[must_use]
    pub fn latest_survey(&self, parent: &NodeId) -> Option<&Node> {
        self.children(parent, NodeType::Survey).into_iter().next()
    }

    /// Name, party and last visit of the most recent survey below `parent`
    #[must_use]
    pub fn survey_summary(&self, parent: &NodeId) -> Option<SurveySummary> {
        let last = self.latest_survey(parent)?;
        let answers = last.answers();
        Some(SurveySummary {
            full_name: answers.and_then(|a| a.get("FullName")).cloned(),
            party_affiliation: answers.and_then(|a| a.get("PartyAffiliation")).cloned(),
            last_visited: last.updated,
        })
    }

    /// Answers of the most recent survey below `parent` that answered `question`
    #[must_use]
    pub fn latest_answers_for(&self, parent: &NodeId, question: &str) -> Option<&SurveyAnswers> {
        self.children(parent, NodeType::Survey)
            .into_iter()
            .filter_map(Node::answers)
            .find(|answers| answers.get(question).is_some_and(is_answered))
    }

    /// Replace the turf overlay and rebuild the merged view
    pub fn set_turf(&mut self, turf: TurfStore) {
        tracing::debug!(nodes = turf.len(), "turf overlay replaced");
        self.turf = turf;
        self.refresh();
    }

    /// Replace the local store wholesale (restore from a remote copy)
    ///
    /// # Errors
    /// Returns error if the store cannot be persisted
    pub fn restore(&mut self, store: NodeStore) -> Result<()> {
        let previous = std::mem::replace(&mut self.local, store);
        if let Err(e) = self.save(true) {
            self.local = previous;
            return Err(e);
        }
        self.refresh();
        Ok(())
    }

    /// Record a completed sync at `epoch`
    ///
    /// # Errors
    /// Returns error if the store cannot be persisted
    pub fn commit_synced(&mut self, epoch: Epoch) -> Result<()> {
        let previous = self.local.last_synced;
        self.local.last_synced = epoch;
        if let Err(e) = self.save(false) {
            self.local.last_synced = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Drop the index; reads fall back to scanning until the next rebuild
    pub fn invalidate_index(&mut self) {
        self.index = None;
    }

    /// Rebuild the index over the current view
    pub fn rebuild_index(&mut self) {
        self.index = Some(NodeIndex::build(&self.view));
    }

    fn live_index(&self) -> Option<&NodeIndex> {
        self.index
            .as_ref()
            .filter(|index| index.covers(self.view.len()))
    }

    fn refresh(&mut self) {
        self.view = merge_views(&self.local.nodes, self.turf.nodes());
        self.rebuild_index();
    }

    fn save(&mut self, touch: bool) -> Result<()> {
        let previous = self.local.last_saved;
        if touch {
            self.local.last_saved = Some(self.now());
        }
        let written = codec::encode_store_string(&self.local)
            .map_err(GraphError::from)
            .and_then(|blob| self.storage.set(&self.key, &blob));
        if written.is_err() {
            self.local.last_saved = previous;
        }
        written
    }

    fn check_parent(&self, draft: &NodeDraft) -> Result<()> {
        let (Some(child_type), Some(parent_id)) = (draft.payload.node_type(), &draft.parent_id)
        else {
            return Ok(());
        };
        let parent_type = self.node(parent_id).and_then(Node::node_type);
        match parent_type {
            Some(parent_type) if child_type.accepts_parent(parent_type) => Ok(()),
            _ => Err(GraphError::invalid_parent(child_type, parent_id)),
        }
    }

    fn derive_id(&self, epoch: Epoch, draft: &NodeDraft) -> Result<NodeId> {
        let content = serde_json::to_vec(draft)?;
        let stamp = epoch.to_string();
        let current = self.current.as_ref().map_or("", NodeId::as_str);
        Ok(NodeId::derive(&[stamp.as_bytes(), content.as_slice(), current.as_bytes()]))
    }
}

/// Truthiness of an answer: null, false, 0 and "" count as unanswered
#[must_use]
pub fn is_answered(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKv;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

    fn ticking_clock(start: Epoch) -> Clock {
        let tick = Arc::new(AtomicI64::new(start));
        Arc::new(move || tick.fetch_add(1, Ordering::SeqCst))
    }

    fn graph() -> (Arc<MemoryKv>, NodeGraph) {
        let kv = Arc::new(MemoryKv::new());
        let graph = NodeGraph::open(kv.clone(), "form1", "Pat")
            .unwrap()
            .with_clock(ticking_clock(1_000));
        (kv, graph)
    }

    /// Memory store whose writes can be switched off
    #[derive(Debug, Default)]
    struct FlakyKv {
        inner: MemoryKv,
        read_only: AtomicBool,
    }

    impl KeyValueStore for FlakyKv {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            if self.read_only.load(Ordering::SeqCst) {
                let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
                return Err(GraphError::storage(std::path::Path::new(key), denied));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }
    }

    fn main_street() -> NodeDraft {
        NodeDraft::address(
            Address::new("1 Main St", "Springfield", "IL", "62701"),
            LatLng::new(39.78, -89.65),
            false,
        )
    }

    #[test]
    fn add_node_stamps_and_persists() {
        let (kv, mut graph) = graph();
        let node = graph.add_node(main_street()).unwrap();
        assert_eq!(node.created, node.updated);
        assert_eq!(node.canvasser, "Pat");

        let blob = kv.get(&keys::pins("form1")).unwrap().unwrap();
        let stored = codec::decode_store(blob.as_bytes());
        assert_eq!(stored.nodes, vec![node.clone()]);
        assert!(stored.last_saved.is_some());
        assert_eq!(graph.node(&node.id), Some(&node));
    }

    #[test]
    fn add_node_is_idempotent() {
        let (kv, mut graph) = graph();
        let first = graph.add_node(main_street()).unwrap();
        let saved = kv.get(&keys::pins("form1")).unwrap();

        let second = graph.add_node(main_street()).unwrap();
        assert_eq!(first, second);
        assert_eq!(graph.local().len(), 1);
        assert_eq!(kv.get(&keys::pins("form1")).unwrap(), saved);
    }

    #[test]
    fn failed_write_keeps_the_previous_save_stamp() {
        let kv = Arc::new(FlakyKv::default());
        let mut graph = NodeGraph::open(kv.clone(), "form1", "Pat")
            .unwrap()
            .with_clock(ticking_clock(1_000));
        let address = graph.add_node(main_street()).unwrap();
        let stamp = graph.local().last_saved;
        assert!(stamp.is_some());

        kv.read_only.store(true, Ordering::SeqCst);
        let unit = graph.add_node(NodeDraft::unit(address.id.clone(), "1A"));
        assert!(matches!(unit, Err(GraphError::Storage { .. })));
        assert_eq!(graph.local().len(), 1);
        assert_eq!(graph.local().last_saved, stamp);

        let restored = graph.restore(NodeStore::new());
        assert!(restored.is_err());
        assert_eq!(graph.local().last_saved, stamp);
    }

    #[test]
    fn address_pinned_elsewhere_is_not_duplicated() {
        let (_, mut graph) = graph();
        let address = Address::new("1 Main St", "Springfield", "IL", "62701");
        let shared = Node {
            id: NodeId::new("c8a5ae812624a8428041f7543157acaf3ae467b3"),
            parent_id: None,
            created: 10,
            updated: 10,
            canvasser: "Other".into(),
            payload: Payload::Address {
                address,
                latlng: Some(LatLng::new(39.78, -89.65)),
                multi_unit: false,
            },
        };
        graph.set_turf(TurfStore::from_nodes(vec![shared.clone()]));

        let added = graph.add_node(main_street()).unwrap();
        assert_eq!(added.id, shared.id);
        assert_eq!(graph.nodes_by_type(NodeType::Address).len(), 1);
    }

    #[test]
    fn derived_ids_include_the_clock() {
        let (_, mut graph) = graph();
        let address = graph.add_node(main_street()).unwrap();
        graph.select(Some(address.id.clone()));
        let a = graph
            .add_node(NodeDraft::survey(address.id.clone(), SurveyStatus::NotHome, SurveyAnswers::new()))
            .unwrap();
        let b = graph
            .add_node(NodeDraft::survey(address.id.clone(), SurveyStatus::NotHome, SurveyAnswers::new()))
            .unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(graph.children(&address.id, NodeType::Survey).len(), 2);
    }

    #[test]
    fn rejects_bad_parents() {
        let (_, mut graph) = graph();
        let missing = graph.add_node(NodeDraft::unit(NodeId::new("nowhere"), "1A"));
        assert!(matches!(missing, Err(GraphError::InvalidParent { .. })));

        let address = graph.add_node(main_street()).unwrap();
        let unit = graph.add_node(NodeDraft::unit(address.id.clone(), "1A")).unwrap();
        let nested = graph.add_node(NodeDraft::unit(unit.id.clone(), "1A-1"));
        assert!(matches!(nested, Err(GraphError::InvalidParent { .. })));
        assert_eq!(graph.local().len(), 2);
    }

    #[test]
    fn update_promotes_turf_node() {
        let (kv, mut graph) = graph();
        let turf_node = Node {
            id: NodeId::new("turf-addr"),
            parent_id: None,
            created: 5,
            updated: 5,
            canvasser: "Other".into(),
            payload: Payload::Address {
                address: Address::new("2 Oak St", "Springfield", "IL", "62701"),
                latlng: None,
                multi_unit: false,
            },
        };
        graph.set_turf(TurfStore::from_nodes(vec![turf_node.clone()]));
        assert!(graph.local().is_empty());

        let updated = graph
            .update_node(&turf_node.id, NodeField::MultiUnit(true))
            .unwrap();
        assert!(updated.is_multi_unit());
        assert!(updated.updated > turf_node.updated);
        assert!(graph.local().contains(&turf_node.id));
        assert_eq!(
            graph.view().iter().filter(|n| n.id == turf_node.id).count(),
            1
        );
        assert!(graph.node(&turf_node.id).unwrap().is_multi_unit());

        let blob = kv.get(&keys::pins("form1")).unwrap().unwrap();
        assert_eq!(codec::decode_store(blob.as_bytes()).len(), 1);
    }

    #[test]
    fn update_rejects_field_mismatch_without_mutation() {
        let (_, mut graph) = graph();
        let address = graph.add_node(main_street()).unwrap();
        let err = graph
            .update_node(&address.id, NodeField::Status(SurveyStatus::Home))
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(graph.node(&address.id), Some(&address));
    }

    #[test]
    fn update_unknown_node() {
        let (_, mut graph) = graph();
        let err = graph
            .update_node(&NodeId::new("ghost"), NodeField::Unit("2".into()))
            .unwrap_err();
        assert!(matches!(err, GraphError::NotFound(_)));
    }

    #[test]
    fn children_fall_back_to_scan() {
        let (_, mut graph) = graph();
        let address = graph.add_node(main_street()).unwrap();
        graph.select(Some(address.id.clone()));
        graph
            .add_node(NodeDraft::survey(address.id.clone(), SurveyStatus::Home, SurveyAnswers::new()))
            .unwrap();
        graph.invalidate_index();
        assert_eq!(graph.children(&address.id, NodeType::Survey).len(), 1);
        assert!(graph.node(&address.id).is_some());
    }

    #[test]
    fn address_status_follows_latest_survey() {
        let (_, mut graph) = graph();
        let address = graph.add_node(main_street()).unwrap();
        assert_eq!(graph.address_status(&address), AddressStatus::Unvisited);

        graph.select(Some(address.id.clone()));
        graph
            .add_node(NodeDraft::survey(address.id.clone(), SurveyStatus::NotHome, SurveyAnswers::new()))
            .unwrap();
        let mut answers = SurveyAnswers::new();
        answers.insert("FullName".into(), json!("Sam Doe"));
        graph
            .add_node(NodeDraft::survey(address.id.clone(), SurveyStatus::Home, answers))
            .unwrap();

        assert_eq!(
            graph.address_status(&address),
            AddressStatus::Visited(SurveyStatus::Home)
        );
        let summary = graph.survey_summary(&address.id).unwrap();
        assert_eq!(summary.full_name, Some(json!("Sam Doe")));
        assert!(graph.latest_answers_for(&address.id, "FullName").is_some());
        assert!(graph.latest_answers_for(&address.id, "Phone").is_none());
    }

    #[test]
    fn commit_synced_keeps_last_saved() {
        let (kv, mut graph) = graph();
        graph.add_node(main_street()).unwrap();
        let saved = graph.local().last_saved;
        graph.commit_synced(4_242).unwrap();
        let blob = kv.get(&keys::pins("form1")).unwrap().unwrap();
        let stored = codec::decode_store(blob.as_bytes());
        assert_eq!(stored.last_synced, 4_242);
        assert_eq!(stored.last_saved, saved);
    }

    #[test]
    fn reopen_restores_state() {
        let (kv, mut graph) = graph();
        let node = graph.add_node(main_street()).unwrap();
        let reopened = NodeGraph::open(kv, "form1", "Pat").unwrap();
        assert_eq!(reopened.node(&node.id), Some(&node));
    }

    #[test]
    fn answer_truthiness() {
        assert!(!is_answered(&json!(null)));
        assert!(!is_answered(&json!("")));
        assert!(!is_answered(&json!(false)));
        assert!(!is_answered(&json!(0)));
        assert!(is_answered(&json!("x")));
        assert!(is_answered(&json!(true)));
    }
}
