//! Error types for canvass sync

use crate::remote::RemoteError;
use crate::state::SyncState;
use canvass_graph::GraphError;

/// Sync cycle and session errors
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Remote file store failure on a path that gates the cycle
    #[error("remote operation on {path} failed: {source}")]
    Remote {
        path: String,
        #[source]
        source: RemoteError,
    },

    /// Local graph or storage failure
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Illegal sync state transition
    #[error("illegal sync transition {from:?} -> {to:?}")]
    IllegalTransition { from: SyncState, to: SyncState },

    /// A cycle is already running on this engine
    #[error("sync already in progress")]
    Busy,
}

impl SyncError {
    pub(crate) fn remote(path: &str, source: RemoteError) -> Self {
        Self::Remote {
            path: path.to_string(),
            source,
        }
    }

    /// Whether the failure came from the remote file store
    #[inline]
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}

/// Result alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
