//! Canvass Graph
//!
//! Content-addressed node graph for door-to-door canvassing.
//!
//! # Core Concepts
//!
//! - [`Node`]: address, unit or survey record; parents are referenced by id
//! - [`NodeStore`]: the device's own nodes plus the sync watermark
//! - [`TurfStore`]: deduplicated overlay of other participants' nodes
//! - [`dedupe`]: last-writer-wins merge by id on `updated`
//! - [`NodeGraph`]: per-form working set (local + turf, merged view, index)
//!
//! # Example
//!
//! ```rust,ignore
//! use canvass_graph::{Address, LatLng, MemoryKv, NodeDraft, NodeGraph};
//!
//! let mut graph = NodeGraph::open(Arc::new(MemoryKv::new()), "form-1", "Pat")?;
//! let pin = graph.add_node(NodeDraft::address(address, LatLng::new(39.7, -89.6), false))?;
//! let status = graph.address_status(&pin);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod dedupe;
mod error;
mod graph;
mod id;
mod index;
mod node;
mod store;

pub mod codec;
pub mod migrate;
pub mod storage;

pub use dedupe::{dedupe, dedupe_with_report, merge_views, DedupeReport};
pub use error::{GraphError, Result};
pub use graph::{is_answered, AddressStatus, Clock, NodeField, NodeGraph, SurveySummary};
pub use id::NodeId;
pub use index::{scan_children, NodeIndex};
pub use node::{
    now_epoch, Address, Epoch, LatLng, Node, NodeDraft, NodeType, Payload, SurveyAnswers,
    SurveyStatus,
};
pub use storage::{DirKv, KeyValueStore, MemoryKv};
pub use store::{NodeStore, TurfStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
