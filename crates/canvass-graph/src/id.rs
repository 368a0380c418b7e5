//! Content-derived node identifiers
//!
//! Provides [`NodeId`], the merge key of the canvassing graph. Ids are hex
//! digests over a node's defining fields, so re-deriving an id from the same
//! fields always yields the same value.

use crate::node::Address;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt::{self, Display, Formatter};

/// Identifier of a node in the canvassing graph
///
/// Stored as an opaque string so ids minted elsewhere survive round trips
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wrap an existing identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive an id from an ordered list of byte segments (SHA-1, hex)
    ///
    /// Segments are hashed as one concatenation, matching the ids already
    /// present in shared participant files.
    #[must_use]
    pub fn derive(segments: &[&[u8]]) -> Self {
        let mut hasher = Sha1::new();
        for segment in segments {
            hasher.update(segment);
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Id of an address node: digest of the JSON-encoded address tuple
    ///
    /// Two pins dropped on the same address collapse to one node.
    #[must_use]
    pub fn for_address(address: &Address) -> Self {
        let tuple = address.to_tuple();
        let json = serde_json::to_vec(&tuple).unwrap_or_default();
        Self::derive(&[&json])
    }

    /// Short string representation (first 12 chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(12)
            .map_or(self.0.len(), |(idx, _)| idx);
        &self.0[..end]
    }

    /// Check if the id is empty (placeholder/uninitialized)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn main_street() -> Address {
        Address::new("1 Main St", "Springfield", "IL", "62701")
    }

    #[test]
    fn derive_is_deterministic() {
        let a = NodeId::derive(&[b"abc", b"def"]);
        let b = NodeId::derive(&[b"abc", b"def"]);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 40);
    }

    #[test]
    fn derive_hashes_the_concatenation() {
        assert_eq!(
            NodeId::derive(&[b"a", b"bc"]).as_str(),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn derive_different_segments() {
        let a = NodeId::derive(&[b"abc"]);
        let b = NodeId::derive(&[b"abd"]);
        assert_ne!(a, b);
    }

    #[test]
    fn address_id_is_stable() {
        assert_eq!(
            NodeId::for_address(&main_street()),
            NodeId::for_address(&main_street())
        );
    }

    #[test]
    fn address_id_matches_existing_participant_files() {
        assert_eq!(
            NodeId::for_address(&main_street()).as_str(),
            "c8a5ae812624a8428041f7543157acaf3ae467b3"
        );
    }

    #[test]
    fn address_id_depends_on_every_field() {
        let base = NodeId::for_address(&main_street());
        let other_zip = NodeId::for_address(&Address::new("1 Main St", "Springfield", "IL", "62702"));
        assert_ne!(base, other_zip);
    }

    #[test]
    fn short_and_display() {
        let id = NodeId::derive(&[b"x"]);
        assert_eq!(id.short().len(), 12);
        assert!(id.to_string().starts_with(id.short()));
        assert_eq!(NodeId::new("abc").short(), "abc");
    }

    #[test]
    fn serde_is_transparent() {
        let id = NodeId::new("deadbeef");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"deadbeef\"");
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
