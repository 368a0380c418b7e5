//! Store blob encoding
//!
//! Stores travel as JSON, both to local storage and to remote files. Decoding
//! never fails: a blob that cannot be read as any known schema becomes an
//! empty store, and the problem is only logged.

use crate::migrate;
use crate::node::Node;
use crate::store::NodeStore;

/// Encode a store as JSON bytes
///
/// # Errors
/// Returns error if serialization fails
pub fn encode_store(store: &NodeStore) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(store)
}

/// Encode a store as a JSON string
///
/// # Errors
/// Returns error if serialization fails
pub fn encode_store_string(store: &NodeStore) -> Result<String, serde_json::Error> {
    serde_json::to_string(store)
}

/// Decode a store blob of any known schema, falling back to empty
#[must_use]
pub fn decode_store(bytes: &[u8]) -> NodeStore {
    try_decode_store(bytes).unwrap_or_else(|err| {
        tracing::warn!(error = %err, len = bytes.len(), "undecodable store blob, using empty store");
        NodeStore::default()
    })
}

/// Decode a store blob, reporting why it could not be read
///
/// # Errors
/// Returns the JSON error for malformed or unrecognised blobs
pub fn try_decode_store(bytes: &[u8]) -> Result<NodeStore, serde_json::Error> {
    let doc: serde_json::Value = serde_json::from_slice(bytes)?;
    migrate::upgrade(doc)
}

/// Decode only the nodes of a store blob (empty on failure)
#[must_use]
pub fn decode_nodes(bytes: &[u8]) -> Vec<Node> {
    decode_store(bytes).nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::NodeId;
    use crate::node::Payload;

    #[test]
    fn round_trip() {
        let store = NodeStore {
            nodes: vec![Node {
                id: NodeId::new("u1"),
                parent_id: Some(NodeId::new("a1")),
                created: 1,
                updated: 2,
                canvasser: "Pat".into(),
                payload: Payload::Unit { unit: "2".into() },
            }],
            last_synced: 5,
            last_saved: Some(6),
        };
        let bytes = encode_store(&store).unwrap();
        assert_eq!(decode_store(&bytes), store);
    }

    #[test]
    fn garbage_decodes_empty() {
        assert!(decode_store(b"not json at all").is_empty());
        assert!(decode_store(b"").is_empty());
        assert!(decode_nodes(b"[1,2,3]").is_empty());
    }

    #[test]
    fn try_decode_reports_errors() {
        assert!(try_decode_store(b"{").is_err());
    }
}
