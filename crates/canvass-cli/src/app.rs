//! Commands behind the `canvass` binary

use crate::config::CliConfig;
use anyhow::{anyhow, bail, Context};
use canvass_convert::{
    ConversionContext, ConversionPipeline, ConversionReport, HttpTransport, OrgApiClient,
    ReqwestTransport, StaticToken,
};
use canvass_graph::storage::{accept_disclosure, disclosure_accepted};
use canvass_graph::{DirKv, KeyValueStore, LatLng};
use canvass_sync::{
    load_forms, CanvassSession, CanvassSettings, ExportReport, Form, LocalDirFileStore,
    RemoteFileStore, SyncEngine, SyncOptions, SyncOutcome, SyncTrigger,
};
use std::sync::Arc;
use tracing::info;

/// Local storage and remote folder wired from configuration
#[derive(Debug)]
pub struct App {
    config: CliConfig,
    storage: Arc<dyn KeyValueStore>,
    remote: Arc<dyn RemoteFileStore>,
}

impl App {
    /// # Errors
    /// Returns error if the storage directory cannot be created
    pub fn open(config: CliConfig) -> anyhow::Result<Self> {
        let storage = DirKv::open(&config.storage_dir).with_context(|| {
            format!("failed to open storage at {}", config.storage_dir.display())
        })?;
        let remote = LocalDirFileStore::new(&config.remote_root);
        Ok(Self {
            config,
            storage: Arc::new(storage),
            remote: Arc::new(remote),
        })
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &CliConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn KeyValueStore> {
        &self.storage
    }

    /// Locally known form by id
    ///
    /// # Errors
    /// Returns error if forms cannot be read or none has this id
    pub fn form(&self, form_id: &str) -> anyhow::Result<Form> {
        load_forms(self.storage.as_ref())
            .context("failed to read local forms")?
            .into_iter()
            .find(|f| f.id == form_id)
            .ok_or_else(|| anyhow!("no local form with id {form_id}"))
    }

    /// # Errors
    /// Returns error if the form is unknown or local storage fails
    pub async fn session(&self, form_id: &str) -> anyhow::Result<CanvassSession> {
        let form = self.form(form_id)?;
        let engine = SyncEngine::new(
            self.remote.clone(),
            SyncOptions::new(&self.config.device.id),
        );
        CanvassSession::open(self.storage.clone(), engine, form, self.config.user.to_user())
            .await
            .context("failed to open canvass session")
    }

    /// Run one user-triggered sync cycle
    ///
    /// # Errors
    /// Returns error if the session cannot be opened; cycle failures are
    /// reported in the outcome
    pub async fn sync(&self, form_id: &str) -> anyhow::Result<SyncOutcome> {
        let mut session = self.session(form_id).await?;
        Ok(session.sync(SyncTrigger::User).await)
    }

    /// Sync, then upload the CSV report
    ///
    /// # Errors
    /// Returns error if the sync or the upload fails
    pub async fn export(&self, form_id: &str) -> anyhow::Result<ExportReport> {
        let mut session = self.session(form_id).await?;
        session.export_csv().await.context("export failed")
    }

    /// Load the turf overlay, returning the node count
    ///
    /// # Errors
    /// Returns error if the session cannot be opened
    pub async fn turf(&self, form_id: &str) -> anyhow::Result<usize> {
        let session = self.session(form_id).await?;
        Ok(session.graph().turf().len())
    }

    /// Change canvass settings, running their side effects
    ///
    /// # Errors
    /// Returns error if settings cannot be stored
    pub async fn settings(
        &self,
        form_id: &str,
        show_only_my_turf: Option<bool>,
        share_progress: Option<bool>,
    ) -> anyhow::Result<CanvassSettings> {
        let mut session = self.session(form_id).await?;
        let mut next = session.settings();
        if let Some(value) = show_only_my_turf {
            next.show_only_my_turf = value;
        }
        if let Some(value) = share_progress {
            next.share_progress = value;
        }
        session
            .update_settings(next)
            .await
            .context("failed to update settings")?;
        Ok(session.settings())
    }

    /// Convert legacy data with the production HTTP client
    ///
    /// # Errors
    /// Returns error if the conversion halts
    pub async fn convert(&self, accept_terms: bool) -> anyhow::Result<ConversionReport> {
        let config = self.config.convert.to_convert_config();
        let transport = ReqwestTransport::new(config.request_timeout)
            .context("failed to build http client")?;
        self.convert_with(Arc::new(transport), accept_terms).await
    }

    /// Convert legacy data over the given transport
    ///
    /// # Errors
    /// Returns error if the guidelines were not accepted or the conversion halts
    pub async fn convert_with(
        &self,
        transport: Arc<dyn HttpTransport>,
        accept_terms: bool,
    ) -> anyhow::Result<ConversionReport> {
        if self.config.convert.state.is_empty() {
            bail!("convert.state is not configured");
        }
        if !disclosure_accepted(self.storage.as_ref())? {
            if !accept_terms {
                bail!("the canvassing guidelines must be accepted first (pass --accept-terms)");
            }
            accept_disclosure(self.storage.as_ref())?;
            info!("canvassing guidelines accepted");
        }

        let client = OrgApiClient::new(
            transport,
            Arc::new(StaticToken::new(&self.config.convert.api_token)),
            self.config.convert.to_convert_config(),
        );
        let pipeline = ConversionPipeline::new(client, self.storage.clone());
        let device = &self.config.device;
        let ctx = ConversionContext::new(
            &device.id,
            &self.config.user.id,
            LatLng::from(self.config.position),
        )
        .with_device_info(device.info.clone());

        pipeline
            .run(&ctx)
            .await
            .context("Legacy data conversion failed")
    }
}
