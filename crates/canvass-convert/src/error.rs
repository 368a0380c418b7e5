//! Error types for legacy conversion

use crate::transport::TransportError;
use canvass_graph::GraphError;
use canvass_sync::SyncError;

/// Conversion pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// Network-level failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Unexpected HTTP status on a gating step
    #[error("{step} returned HTTP {status}")]
    Status { step: &'static str, status: u16 },

    /// Response lacked a required field
    #[error("{step} response is missing `{field}`")]
    MissingField {
        step: &'static str,
        field: &'static str,
    },

    /// Organization never became ready
    #[error("organization not ready after {attempts} attempts")]
    NotReady { attempts: u32 },

    /// Bearer token could not be obtained
    #[error("api token unavailable: {0}")]
    Token(String),

    /// A form's remote resources could not be created; only that form is skipped
    #[error("form {form}: {reason}")]
    FormSkipped { form: String, reason: String },

    /// The pipeline already failed; it does not resume
    #[error("conversion halted after an earlier failure")]
    Halted,

    /// A conversion is already running on this pipeline
    #[error("conversion already running")]
    Busy,

    /// The canvassing guidelines have not been accepted on this device
    #[error("canvassing guidelines disclosure not accepted")]
    DisclosurePending,

    /// Local storage failure
    #[error("storage error: {0}")]
    Storage(#[from] GraphError),

    /// Reading local forms failed
    #[error("forms error: {0}")]
    Forms(#[from] SyncError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConvertError {
    /// Whether the whole pipeline must stop
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::FormSkipped { .. })
    }

    pub(crate) fn form_skipped(form: &str, reason: impl Into<String>) -> Self {
        Self::FormSkipped {
            form: form.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result alias for conversion
pub type Result<T> = std::result::Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatality() {
        assert!(ConvertError::NotReady { attempts: 12 }.is_fatal());
        assert!(ConvertError::Status {
            step: "organization creation",
            status: 500
        }
        .is_fatal());
        assert!(!ConvertError::form_skipped("f1", "attribute creation failed").is_fatal());
    }

    #[test]
    fn messages() {
        let err = ConvertError::MissingField {
            step: "organization creation",
            field: "orgid",
        };
        assert_eq!(err.to_string(), "organization creation response is missing `orgid`");
    }
}
