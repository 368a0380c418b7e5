//! Legacy per-form blob decoding
//!
//! A legacy blob is either gzip-compressed JSON wrapped in base64, or plain
//! JSON. Either way the document holds a `nodes` collection; anything that
//! fails to decode yields no nodes at all.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use canvass_graph::migrate::{self, StoreSchema};
use canvass_graph::{Node, NodeId};
use flate2::read::GzDecoder;
use indexmap::IndexMap;
use serde_json::Value;
use std::io::Read;
use tracing::{debug, warn};

/// Decoded legacy nodes keyed by id, in document order
pub type LegacyNodes = IndexMap<NodeId, Node>;

/// Decode a stored legacy blob
#[must_use]
pub fn decode_legacy_blob(raw: &str) -> LegacyNodes {
    let doc = match gunzip_base64(raw) {
        Some(doc) => doc,
        None => match serde_json::from_str::<Value>(raw) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "legacy blob is neither gzip nor json");
                return LegacyNodes::new();
            }
        },
    };
    nodes_from_doc(doc)
}

fn gunzip_base64(raw: &str) -> Option<Value> {
    let bytes = STANDARD.decode(raw.trim()).ok()?;
    let mut json = String::new();
    GzDecoder::new(bytes.as_slice())
        .read_to_string(&mut json)
        .ok()?;
    serde_json::from_str(&json).ok()
}

fn nodes_from_doc(doc: Value) -> LegacyNodes {
    if StoreSchema::detect(&doc) == StoreSchema::PinsV1 {
        return match migrate::upgrade(doc) {
            Ok(store) => store.nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
            Err(e) => {
                warn!(error = %e, "legacy pins document did not upgrade");
                LegacyNodes::new()
            }
        };
    }

    let entries: Vec<(Option<String>, Value)> = match doc {
        Value::Object(mut map) => match map.remove("nodes") {
            Some(Value::Object(nodes)) => nodes.into_iter().map(|(k, v)| (Some(k), v)).collect(),
            Some(Value::Array(nodes)) => nodes.into_iter().map(|v| (None, v)).collect(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    let mut nodes = LegacyNodes::with_capacity(entries.len());
    for (key, mut value) in entries {
        if let (Some(key), Value::Object(obj)) = (key, &mut value) {
            obj.entry("id").or_insert(Value::String(key));
        }
        match serde_json::from_value::<Node>(value) {
            Ok(node) => {
                nodes.insert(node.id.clone(), node);
            }
            Err(e) => debug!(error = %e, "skipping unreadable legacy node"),
        }
    }
    nodes
}
