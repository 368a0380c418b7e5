//! Sync engine
//!
//! One cycle per call, walked through [`SyncMachine`]:
//!
//! 1. upload this device's store to `<folder>/<device>.jtxt` (fatal on failure)
//! 2. owner only: aggregate every participant file, root and sub-groups,
//!    and write the deduplicated union to `<folder>/exported.jtrf`
//! 3. owner only: copy the export into every sub-group folder when progress
//!    sharing is on, or delete previously distributed copies when it is off
//! 4. rebuild the turf overlay from remote files
//! 5. commit `last_synced` locally
//!
//! Individual participant downloads are best-effort throughout.

use crate::error::{Result, SyncError};
use crate::form::{Form, User};
use crate::remote::{download_nodes, join, RemoteEntry, RemoteFileStore};
use crate::settings::CanvassSettings;
use crate::state::{SyncMachine, SyncState};
use canvass_graph::{codec, dedupe_with_report, Epoch, Node, NodeGraph, NodeStore, TurfStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Suffix of per-device raw store uploads
pub const SELF_SUFFIX: &str = ".jtxt";
/// Suffix of turf files
pub const TURF_SUFFIX: &str = ".jtrf";
/// Aggregated export written by the form owner
pub const EXPORT_FILE: &str = "exported.jtrf";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    device_id: String,
    group_marker: char,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            device_id: String::from("device"),
            group_marker: '@',
        }
    }
}

impl SyncOptions {
    #[must_use]
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            ..Self::default()
        }
    }

    /// Character that marks a sub-group folder name
    #[must_use]
    pub fn with_group_marker(mut self, marker: char) -> Self {
        self.group_marker = marker;
        self
    }

    #[inline]
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    #[inline]
    #[must_use]
    pub fn group_marker(&self) -> char {
        self.group_marker
    }

    /// `<device>.jtxt`
    #[must_use]
    pub fn self_file(&self) -> String {
        format!("{}{SELF_SUFFIX}", self.device_id)
    }

    /// `<device>.jtrf`
    #[must_use]
    pub fn turf_file(&self) -> String {
        format!("{}{TURF_SUFFIX}", self.device_id)
    }

    fn is_group(&self, entry: &RemoteEntry) -> bool {
        entry.is_folder() && entry.name.contains(self.group_marker)
    }
}

/// Who asked for the cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// Explicit user action; the outcome carries a notice
    User,
    /// Automatic; failures are only logged
    Background,
}

/// User-facing result of a user-triggered cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncNotice {
    Succeeded,
    Failed,
}

impl SyncNotice {
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Succeeded => "Data sync successful!",
            Self::Failed => "Unable to sync with the server.",
        }
    }
}

/// What a successful cycle did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Watermark committed by the cycle
    pub synced_at: Epoch,
    /// Deduplicated union written to the export (owner only)
    pub aggregate: Option<Vec<Node>>,
    /// Participant files read during aggregation
    pub sources: usize,
    /// Duplicates dropped during aggregation
    pub duplicates: usize,
    /// Sub-group export copies written
    pub distributed: Vec<String>,
    /// Sub-group export copies deleted
    pub retracted: Vec<String>,
    /// Nodes in the refreshed turf overlay
    pub turf_nodes: usize,
}

/// Result of [`SyncEngine::sync`]
#[derive(Debug)]
pub struct SyncOutcome {
    pub result: Result<SyncReport>,
    /// Present only for [`SyncTrigger::User`]
    pub notice: Option<SyncNotice>,
    /// States visited, ending in `Idle` or `Failed`
    pub trail: Vec<SyncState>,
}

impl SyncOutcome {
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

struct Aggregate {
    nodes: Vec<Node>,
    groups: Vec<RemoteEntry>,
    sources: usize,
    duplicates: usize,
}

struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives sync cycles against a remote file store
#[derive(Debug)]
pub struct SyncEngine {
    remote: Arc<dyn RemoteFileStore>,
    options: SyncOptions,
    running: AtomicBool,
}

impl SyncEngine {
    #[must_use]
    pub fn new(remote: Arc<dyn RemoteFileStore>, options: SyncOptions) -> Self {
        Self {
            remote,
            options,
            running: AtomicBool::new(false),
        }
    }

    #[inline]
    #[must_use]
    pub fn remote(&self) -> &Arc<dyn RemoteFileStore> {
        &self.remote
    }

    #[inline]
    #[must_use]
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Run one sync cycle for `form`
    ///
    /// Never returns early with an error: failures land in
    /// [`SyncOutcome::result`], and `last_synced` only moves on success.
    #[tracing::instrument(skip_all, fields(form = %form.id, trigger = ?trigger))]
    pub async fn sync(
        &self,
        graph: &mut NodeGraph,
        form: &Form,
        user: &User,
        settings: &CanvassSettings,
        trigger: SyncTrigger,
    ) -> SyncOutcome {
        let mut machine = SyncMachine::new();

        let result = match self.acquire() {
            Some(_guard) => {
                let result = self.run_cycle(&mut machine, graph, form, user, settings).await;
                if result.is_err() {
                    machine.fail();
                }
                result
            }
            None => Err(SyncError::Busy),
        };

        match &result {
            Ok(report) => info!(
                synced_at = report.synced_at,
                turf = report.turf_nodes,
                "sync cycle complete"
            ),
            Err(e) if trigger == SyncTrigger::User => error!(error = %e, "sync cycle failed"),
            Err(e) => warn!(error = %e, "background sync cycle failed"),
        }

        let notice = match trigger {
            SyncTrigger::Background => None,
            SyncTrigger::User if result.is_ok() => Some(SyncNotice::Succeeded),
            SyncTrigger::User => Some(SyncNotice::Failed),
        };

        SyncOutcome {
            result,
            notice,
            trail: machine.trail().to_vec(),
        }
    }

    fn acquire(&self) -> Option<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(&self.running))
    }

    async fn run_cycle(
        &self,
        machine: &mut SyncMachine,
        graph: &mut NodeGraph,
        form: &Form,
        user: &User,
        settings: &CanvassSettings,
    ) -> Result<SyncReport> {
        machine.advance(SyncState::UploadingSelf)?;
        let synced_at = graph.now();
        let self_path = join(&form.folder_path, &self.options.self_file());
        let blob = codec::encode_store(&graph.local().stamped(synced_at))?;
        self.remote
            .upload(&self_path, blob)
            .await
            .map_err(|e| SyncError::remote(&self_path, e))?;
        info!(path = %self_path, nodes = graph.local().len(), "uploaded device store");

        let mut report = SyncReport {
            synced_at,
            ..SyncReport::default()
        };

        if form.is_owned_by(user) {
            machine.advance(SyncState::Aggregating)?;
            let aggregate = self.aggregate(graph, form).await?;

            machine.advance(SyncState::Exporting)?;
            let export_path = join(&form.folder_path, EXPORT_FILE);
            let blob = codec::encode_store(&NodeStore::with_nodes(aggregate.nodes.clone()))?;
            self.remote
                .upload(&export_path, blob.clone())
                .await
                .map_err(|e| SyncError::remote(&export_path, e))?;
            info!(path = %export_path, nodes = aggregate.nodes.len(), "wrote aggregated export");

            if settings.share_progress {
                machine.advance(SyncState::Distributing)?;
                report.distributed = self.distribute(&aggregate.groups, &blob).await;
            } else {
                machine.advance(SyncState::Retracting)?;
                report.retracted = self.retract(&aggregate.groups).await;
            }

            report.sources = aggregate.sources;
            report.duplicates = aggregate.duplicates;
            report.aggregate = Some(aggregate.nodes);
        }

        machine.advance(SyncState::RefreshingTurf)?;
        report.turf_nodes = self.refresh_turf(graph, form, settings).await;

        graph.commit_synced(synced_at)?;
        machine.advance(SyncState::Idle)?;
        Ok(report)
    }

    /// Rebuild `graph`'s turf overlay from remote files; returns its size
    ///
    /// Restricted to this device's assignment and the export when
    /// `show_only_my_turf` is set; otherwise also every other device's raw
    /// upload in the form folder. Never touches the local store.
    pub async fn refresh_turf(
        &self,
        graph: &mut NodeGraph,
        form: &Form,
        settings: &CanvassSettings,
    ) -> usize {
        let nodes = self.collect_turf(form, settings.show_only_my_turf).await;
        let turf = TurfStore::from_nodes(nodes);
        let size = turf.len();
        graph.set_turf(turf);
        debug!(nodes = size, restricted = settings.show_only_my_turf, "turf refreshed");
        size
    }

    async fn collect_turf(&self, form: &Form, restricted: bool) -> Vec<Node> {
        let remote = self.remote.as_ref();
        let mut nodes = Vec::new();

        if !restricted {
            let own = self.options.self_file();
            match remote.list_folder(&form.folder_path).await {
                Ok(entries) => {
                    for entry in entries
                        .iter()
                        .filter(|e| e.is_file_with_suffix(SELF_SUFFIX) && e.name != own)
                    {
                        nodes.extend(download_nodes(remote, &entry.path).await);
                    }
                }
                Err(e) => warn!(folder = %form.folder_path, error = %e, "cannot list form folder for turf"),
            }
        }

        for file in [self.options.turf_file().as_str(), EXPORT_FILE] {
            nodes.extend(download_nodes(remote, &join(&form.folder_path, file)).await);
        }
        nodes
    }

    async fn aggregate(&self, graph: &NodeGraph, form: &Form) -> Result<Aggregate> {
        let remote = self.remote.as_ref();
        let folder = &form.folder_path;
        let entries = remote
            .list_folder(folder)
            .await
            .map_err(|e| SyncError::remote(folder, e))?;

        // Own nodes first so timestamp ties resolve in their favour
        let mut nodes: Vec<Node> = graph.local().nodes.clone();
        let mut sources = 0;
        let mut folders = Vec::new();

        for entry in &entries {
            if entry.is_file_with_suffix(SELF_SUFFIX) {
                nodes.extend(download_nodes(remote, &entry.path).await);
                sources += 1;
            } else if entry.is_folder() {
                folders.push(entry.clone());
            }
        }

        for sub in &folders {
            match remote.list_folder(&sub.path).await {
                Ok(children) => {
                    for child in children.iter().filter(|c| c.is_file_with_suffix(SELF_SUFFIX)) {
                        nodes.extend(download_nodes(remote, &child.path).await);
                        sources += 1;
                    }
                }
                Err(e) => warn!(folder = %sub.path, error = %e, "skipping unreadable sub-folder"),
            }
        }

        nodes.extend(self.collect_turf(form, true).await);

        let (nodes, dedupe) = dedupe_with_report(nodes);
        debug!(
            sources,
            kept = dedupe.kept,
            dropped = dedupe.discarded(),
            "aggregated participant files"
        );

        let groups = folders
            .into_iter()
            .filter(|f| self.options.is_group(f))
            .collect();

        Ok(Aggregate {
            nodes,
            groups,
            sources,
            duplicates: dedupe.discarded(),
        })
    }

    async fn distribute(&self, groups: &[RemoteEntry], blob: &[u8]) -> Vec<String> {
        let mut written = Vec::new();
        for group in groups {
            let path = join(&group.path, EXPORT_FILE);
            match self.remote.upload(&path, blob.to_vec()).await {
                Ok(()) => {
                    debug!(path = %path, "distributed export");
                    written.push(path);
                }
                Err(e) => warn!(path = %path, error = %e, "failed to distribute export"),
            }
        }
        written
    }

    async fn retract(&self, groups: &[RemoteEntry]) -> Vec<String> {
        let mut deleted = Vec::new();
        for group in groups {
            let path = join(&group.path, EXPORT_FILE);
            match self.remote.delete(&path).await {
                Ok(()) => {
                    debug!(path = %path, "retracted export copy");
                    deleted.push(path);
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!(path = %path, error = %e, "failed to retract export copy"),
            }
        }
        deleted
    }

    /// Delete every distributed export copy under `form`'s sub-groups
    ///
    /// # Errors
    /// Returns error if the form folder cannot be listed
    pub async fn retract_exports(&self, form: &Form) -> Result<Vec<String>> {
        let entries = self
            .remote
            .list_folder(&form.folder_path)
            .await
            .map_err(|e| SyncError::remote(&form.folder_path, e))?;
        let groups: Vec<RemoteEntry> = entries
            .into_iter()
            .filter(|e| self.options.is_group(e))
            .collect();
        Ok(self.retract(&groups).await)
    }

    /// This device's last upload, if present and readable
    pub async fn download_own_store(&self, form: &Form) -> Option<NodeStore> {
        let path = join(&form.folder_path, &self.options.self_file());
        let bytes = match self.remote.download(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %path, error = %e, "no remote copy of device store");
                return None;
            }
        };
        match codec::try_decode_store(&bytes) {
            Ok(store) if !store.is_empty() => Some(store),
            Ok(_) => None,
            Err(e) => {
                warn!(path = %path, error = %e, "remote device store unreadable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryFileStore;
    use canvass_graph::{Address, LatLng, MemoryKv, NodeDraft};
    use std::sync::atomic::AtomicI64;

    fn graph_at(start: Epoch) -> NodeGraph {
        let tick = Arc::new(AtomicI64::new(start));
        NodeGraph::open(Arc::new(MemoryKv::new()), "f1", "Pat")
            .unwrap()
            .with_clock(Arc::new(move || tick.fetch_add(1, Ordering::SeqCst)))
    }

    fn form() -> Form {
        Form::new("f1", "Door", "/Door").with_author("owner")
    }

    #[tokio::test]
    async fn participant_cycle_uploads_and_commits() {
        let remote = Arc::new(MemoryFileStore::new());
        let engine = SyncEngine::new(remote.clone(), SyncOptions::new("dev1"));
        let mut graph = graph_at(100);
        graph
            .add_node(NodeDraft::address(
                Address::new("1 Main St", "Springfield", "IL", "62701"),
                LatLng::new(39.7, -89.6),
                false,
            ))
            .unwrap();

        let outcome = engine
            .sync(
                &mut graph,
                &form(),
                &User::new("v1", "someone"),
                &CanvassSettings::default(),
                SyncTrigger::Background,
            )
            .await;

        let report = outcome.result.unwrap();
        assert!(outcome.notice.is_none());
        assert!(report.aggregate.is_none());
        assert_eq!(
            outcome.trail,
            vec![
                SyncState::Idle,
                SyncState::UploadingSelf,
                SyncState::RefreshingTurf,
                SyncState::Idle
            ]
        );
        assert_eq!(graph.local().last_synced, report.synced_at);

        let uploaded = codec::decode_store(&remote.get("/Door/dev1.jtxt").unwrap());
        assert_eq!(uploaded.len(), 1);
        assert_eq!(uploaded.last_synced, report.synced_at);
    }

    #[tokio::test]
    async fn failed_upload_keeps_watermark() {
        let remote = Arc::new(MemoryFileStore::new());
        remote.fail_path("/Door/dev1.jtxt");
        let engine = SyncEngine::new(remote.clone(), SyncOptions::new("dev1"));
        let mut graph = graph_at(100);

        let outcome = engine
            .sync(
                &mut graph,
                &form(),
                &User::new("v1", "owner"),
                &CanvassSettings::default(),
                SyncTrigger::User,
            )
            .await;

        assert!(outcome.result.as_ref().unwrap_err().is_remote());
        assert_eq!(outcome.notice, Some(SyncNotice::Failed));
        assert_eq!(outcome.trail.last(), Some(&SyncState::Failed));
        assert_eq!(graph.local().last_synced, 0);
        assert!(remote.uploads().iter().all(|p| p == "/Door/dev1.jtxt"));
    }

    #[test]
    fn option_file_names() {
        let options = SyncOptions::new("abc");
        assert_eq!(options.self_file(), "abc.jtxt");
        assert_eq!(options.turf_file(), "abc.jtrf");
        assert!(options.is_group(&RemoteEntry::folder("/f/team@x")));
        assert!(!options.is_group(&RemoteEntry::folder("/f/archive")));
        assert!(!options.is_group(&RemoteEntry::file("/f/a@b.jtxt")));
    }

    #[test]
    fn notice_messages() {
        assert_eq!(SyncNotice::Succeeded.message(), "Data sync successful!");
        assert_eq!(SyncNotice::Failed.message(), "Unable to sync with the server.");
    }
}
