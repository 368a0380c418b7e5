//! Canvass Sync
//!
//! Synchronizes per-form canvassing graphs through a shared remote folder.
//!
//! # Core Concepts
//!
//! - [`RemoteFileStore`]: upload/download/list/delete by path
//! - [`SyncEngine`]: one explicit-state sync cycle per call
//! - [`CanvassSession`]: one user working one form, with settings side effects
//! - [`render_csv`]: survey results as CSV
//!
//! # Remote layout
//!
//! ```text
//! <folder>/<device>.jtxt        raw store of each device
//! <folder>/<device>.jtrf        turf assigned to a device
//! <folder>/exported.jtrf        owner's aggregate
//! <folder>/<group>@.../         sub-group folders
//! <folder>/<form name>.csv      CSV export
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod engine;
mod error;
mod export;
mod form;
mod local_dir;
mod memory;
mod remote;
mod session;
mod settings;
mod state;

pub use engine::{
    SyncEngine, SyncNotice, SyncOptions, SyncOutcome, SyncReport, SyncTrigger, EXPORT_FILE,
    SELF_SUFFIX, TURF_SUFFIX,
};
pub use error::{Result, SyncError};
pub use export::{format_timestamp, render_csv, CsvExport, CSV_COLUMNS};
pub use form::{load_forms, save_forms, Form, Question, User};
pub use local_dir::LocalDirFileStore;
pub use memory::{MemoryFileStore, RemoteOp};
pub use remote::{download_nodes, join, EntryKind, RemoteEntry, RemoteError, RemoteFileStore};
pub use session::{CanvassSession, ExportReport};
pub use settings::{CanvassSettings, SettingsChange};
pub use state::{allowed_transitions, validate_transition, SyncMachine, SyncState};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
