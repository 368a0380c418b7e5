//! Canvass settings persisted under [`keys::SETTINGS`]

use canvass_graph::storage::keys;
use canvass_graph::KeyValueStore;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// User-controlled sync settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CanvassSettings {
    /// Refresh turf from this device's assignment and the export only
    #[serde(default)]
    pub show_only_my_turf: bool,
    /// Owner replicates the aggregated export into every sub-group folder
    #[serde(default)]
    pub share_progress: bool,
}

/// Side effects implied by a settings change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SettingsChange {
    pub refresh_turf: bool,
    pub retract_exports: bool,
}

impl CanvassSettings {
    /// Load settings (defaults when absent or unreadable)
    ///
    /// # Errors
    /// Returns error if storage cannot be read
    pub fn load(storage: &dyn KeyValueStore) -> Result<Self> {
        let Some(blob) = storage.get(keys::SETTINGS)? else {
            return Ok(Self::default());
        };
        Ok(serde_json::from_str(&blob).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "unreadable canvass settings, using defaults");
            Self::default()
        }))
    }

    /// Persist settings
    ///
    /// # Errors
    /// Returns error if serialization or storage fails
    pub fn save(&self, storage: &dyn KeyValueStore) -> Result<()> {
        storage.set(keys::SETTINGS, &serde_json::to_string(self)?)?;
        Ok(())
    }

    /// What moving from `self` to `next` requires
    #[must_use]
    pub fn diff(&self, next: &Self) -> SettingsChange {
        SettingsChange {
            refresh_turf: self.show_only_my_turf != next.show_only_my_turf,
            retract_exports: self.share_progress && !next.share_progress,
        }
    }
}
