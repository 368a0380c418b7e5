//! TOML configuration for the `canvass` binary

use anyhow::Context;
use canvass_convert::ConvertConfig;
use canvass_graph::LatLng;
use canvass_sync::User;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "canvass.toml";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Directory of the local key-value store
    pub storage_dir: PathBuf,
    /// Directory standing in for the shared remote file store
    pub remote_root: PathBuf,
    pub device: DeviceConfig,
    pub user: UserConfig,
    #[serde(default)]
    pub position: PositionConfig,
    #[serde(default)]
    pub convert: ConvertSection,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Free-form device metadata, sent with the conversion hello
    #[serde(default)]
    pub info: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    pub id: String,
    pub account_id: String,
    #[serde(default)]
    pub display_name: String,
}

impl UserConfig {
    #[must_use]
    pub fn to_user(&self) -> User {
        User::new(&self.id, &self.account_id).with_display_name(&self.display_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionConfig {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<PositionConfig> for LatLng {
    fn from(p: PositionConfig) -> Self {
        LatLng::new(p.latitude, p.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertSection {
    pub state: String,
    pub server_template: Option<String>,
    pub api_token: String,
    pub poll_interval_secs: u64,
    pub max_poll_attempts: u32,
}

impl Default for ConvertSection {
    fn default() -> Self {
        let defaults = ConvertConfig::default();
        Self {
            state: String::new(),
            server_template: None,
            api_token: String::new(),
            poll_interval_secs: defaults.poll_interval.as_secs(),
            max_poll_attempts: defaults.max_poll_attempts,
        }
    }
}

impl ConvertSection {
    #[must_use]
    pub fn to_convert_config(&self) -> ConvertConfig {
        let config = ConvertConfig::new(&self.state)
            .with_poll_interval(Duration::from_secs(self.poll_interval_secs))
            .with_max_poll_attempts(self.max_poll_attempts);
        match &self.server_template {
            Some(template) => config.with_server_template(template),
            None => config,
        }
    }
}

impl CliConfig {
    /// Parse a configuration document
    ///
    /// # Errors
    /// Returns error if the document is not valid configuration TOML
    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        toml::from_str(contents).context("invalid configuration")
    }

    /// Read and parse a configuration file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }
}
