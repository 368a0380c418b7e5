//! Canvass CLI
//!
//! Library half of the `canvass` binary: configuration, log setup and the
//! commands, so they can be driven from tests.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod app;
pub mod config;
pub mod telemetry;

pub use app::App;
pub use config::{CliConfig, DEFAULT_CONFIG_FILE};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
