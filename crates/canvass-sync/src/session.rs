//! Canvass session for one form
//!
//! Binds the local graph, the settings and a [`SyncEngine`] for a single
//! form and user. Opening a session with nothing stored locally restores
//! this device's last upload from the remote folder.

use crate::engine::{SyncEngine, SyncOutcome, SyncTrigger};
use crate::error::{Result, SyncError};
use crate::export::{render_csv, CsvExport};
use crate::form::{Form, User};
use crate::remote::join;
use crate::settings::CanvassSettings;
use canvass_graph::storage::keys;
use canvass_graph::{KeyValueStore, NodeGraph};
use std::sync::Arc;

/// Result of [`CanvassSession::export_csv`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub path: String,
    pub rows: usize,
}

/// A user working one form on this device
#[derive(Debug)]
pub struct CanvassSession {
    storage: Arc<dyn KeyValueStore>,
    engine: SyncEngine,
    form: Form,
    user: User,
    settings: CanvassSettings,
    graph: NodeGraph,
}

impl CanvassSession {
    /// Open the session, restoring from the remote copy when the local
    /// store is empty, then load the turf overlay
    ///
    /// # Errors
    /// Returns error if local storage cannot be read or written
    #[tracing::instrument(skip_all, fields(form = %form.id))]
    pub async fn open(
        storage: Arc<dyn KeyValueStore>,
        engine: SyncEngine,
        form: Form,
        user: User,
    ) -> Result<Self> {
        let settings = CanvassSettings::load(storage.as_ref())?;
        let stored = storage.get(&keys::pins(&form.id))?.is_some();

        let mut graph = NodeGraph::open(storage.clone(), &form.id, user.display_name.clone())?;
        if !stored {
            if let Some(store) = engine.download_own_store(&form).await {
                tracing::info!(nodes = store.len(), "restored local store from remote copy");
                graph.restore(store)?;
            }
        }

        engine.refresh_turf(&mut graph, &form, &settings).await;

        Ok(Self {
            storage,
            engine,
            form,
            user,
            settings,
            graph,
        })
    }

    #[inline]
    #[must_use]
    pub fn graph(&self) -> &NodeGraph {
        &self.graph
    }

    #[inline]
    pub fn graph_mut(&mut self) -> &mut NodeGraph {
        &mut self.graph
    }

    #[inline]
    #[must_use]
    pub fn form(&self) -> &Form {
        &self.form
    }

    #[inline]
    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> CanvassSettings {
        self.settings
    }

    #[inline]
    #[must_use]
    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Run one sync cycle
    pub async fn sync(&mut self, trigger: SyncTrigger) -> SyncOutcome {
        self.engine
            .sync(&mut self.graph, &self.form, &self.user, &self.settings, trigger)
            .await
    }

    /// Rebuild the turf overlay without uploading anything
    pub async fn refresh_turf(&mut self) -> usize {
        self.engine
            .refresh_turf(&mut self.graph, &self.form, &self.settings)
            .await
    }

    /// Persist new settings and apply their side effects
    ///
    /// Changing `show_only_my_turf` refreshes the turf. Turning
    /// `share_progress` off deletes the distributed export copies when this
    /// user owns the form; that deletion is best-effort.
    ///
    /// # Errors
    /// Returns error if the settings cannot be persisted
    pub async fn update_settings(&mut self, next: CanvassSettings) -> Result<()> {
        let change = self.settings.diff(&next);
        next.save(self.storage.as_ref())?;
        self.settings = next;

        if change.refresh_turf {
            self.refresh_turf().await;
        }
        if change.retract_exports && self.form.is_owned_by(&self.user) {
            match self.engine.retract_exports(&self.form).await {
                Ok(deleted) => tracing::info!(count = deleted.len(), "retracted shared exports"),
                Err(e) => tracing::warn!(error = %e, "could not retract shared exports"),
            }
        }
        Ok(())
    }

    /// Sync, then upload every survey as CSV to `<folder>/<form name>.csv`
    ///
    /// Uses the aggregate when this user owns the form, otherwise the merged
    /// view.
    ///
    /// # Errors
    /// Returns the sync error, or the remote error of the CSV upload
    #[tracing::instrument(skip_all, fields(form = %self.form.id))]
    pub async fn export_csv(&mut self) -> Result<ExportReport> {
        let outcome = self.sync(SyncTrigger::Background).await;
        let report = outcome.result?;

        let CsvExport { contents, rows, skipped } = match &report.aggregate {
            Some(nodes) => render_csv(nodes, &self.form),
            None => render_csv(self.graph.view(), &self.form),
        };
        if skipped > 0 {
            tracing::debug!(skipped, "orphaned surveys left out of export");
        }

        let path = join(&self.form.folder_path, &format!("{}.csv", self.form.name));
        self.engine
            .remote()
            .upload(&path, contents.into_bytes())
            .await
            .map_err(|e| SyncError::remote(&path, e))?;
        tracing::info!(path = %path, rows, "uploaded CSV export");
        Ok(ExportReport { path, rows })
    }
}
