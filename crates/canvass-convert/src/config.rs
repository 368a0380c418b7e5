//! Conversion configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default organization server, `{state}` is the lowercase state code
pub const DEFAULT_SERVER_TEMPLATE: &str = "https://gotv-{state}.ourvoiceusa.org";
/// Default API base path, `{orgId}` is the organization id
pub const DEFAULT_API_BASE_TEMPLATE: &str = "/HelloVoterHQ/{orgId}/api/v1";

/// Status the readiness endpoint returns while the organization is provisioning
pub const NOT_READY_STATUS: u16 = 418;

/// Conversion pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// State code the organization is created in
    pub state: String,
    pub server_template: String,
    pub api_base_template: String,
    /// Wait between readiness polls
    #[serde(with = "secs")]
    pub poll_interval: Duration,
    /// Readiness polls before giving up
    pub max_poll_attempts: u32,
    #[serde(with = "secs")]
    pub request_timeout: Duration,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            state: String::new(),
            server_template: DEFAULT_SERVER_TEMPLATE.to_string(),
            api_base_template: DEFAULT_API_BASE_TEMPLATE.to_string(),
            poll_interval: Duration::from_secs(10),
            max_poll_attempts: 12,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ConvertConfig {
    #[must_use]
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_server_template(mut self, template: impl Into<String>) -> Self {
        self.server_template = template.into();
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_max_poll_attempts(mut self, attempts: u32) -> Self {
        self.max_poll_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Server origin for the configured state
    #[must_use]
    pub fn server_url(&self) -> String {
        self.server_template
            .replace("{state}", &self.state.to_lowercase())
    }

    /// API base path for an organization
    #[must_use]
    pub fn api_base(&self, org_id: &str) -> String {
        self.api_base_template.replace("{orgId}", org_id)
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_secs())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
