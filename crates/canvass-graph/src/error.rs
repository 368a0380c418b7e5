//! Error types for the canvassing graph

use crate::id::NodeId;
use crate::node::NodeType;
use std::path::Path;

/// Graph and local storage errors
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Local storage failure
    #[error("storage error at {path}: {source}")]
    Storage {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Storage backend failure without a path
    #[error("storage error: {0}")]
    Backend(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Node not present in the merged view
    #[error("node not found: {0}")]
    NotFound(NodeId),

    /// Parent missing or of a type that cannot hold the child
    #[error("invalid parent {parent} for {child_type} node")]
    InvalidParent {
        child_type: &'static str,
        parent: NodeId,
    },

    /// Field does not exist on this node type
    #[error("field {field} does not apply to {node_type} node {id}")]
    FieldMismatch {
        id: NodeId,
        field: &'static str,
        node_type: &'static str,
    },
}

impl GraphError {
    /// Wrap an I/O error with the path it concerns
    #[must_use]
    pub fn storage(path: &Path, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn invalid_parent(child: NodeType, parent: &NodeId) -> Self {
        Self::InvalidParent {
            child_type: child.as_str(),
            parent: parent.clone(),
        }
    }

    /// Whether the error left state untouched (a rejected user action)
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::InvalidParent { .. } | Self::FieldMismatch { .. }
        )
    }
}

/// Result alias for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let err = GraphError::NotFound(NodeId::new("abc"));
        assert_eq!(err.to_string(), "node not found: abc");
        assert!(err.is_validation());

        let err = GraphError::invalid_parent(NodeType::Unit, &NodeId::new("p"));
        assert!(err.to_string().contains("unit"));
    }

    #[test]
    fn storage_is_not_validation() {
        let err = GraphError::storage(
            Path::new("/tmp/x"),
            std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        );
        assert!(!err.is_validation());
        assert!(err.to_string().contains("/tmp/x"));
    }
}
