//! Canvass Convert
//!
//! One-shot migration of legacy on-device canvassing data onto an
//! organization server.
//!
//! # Core Concepts
//!
//! - [`HttpTransport`]: the JSON-over-HTTP seam ([`ReqwestTransport`] in production)
//! - [`OrgApiClient`]: gating calls plus best-effort [`OrgApiClient::send`]
//! - [`decode_legacy_blob`]: base64+gzip or plain JSON node blobs
//! - [`ConversionPipeline`]: the ordered conversion run
//!
//! # Example
//!
//! ```rust,ignore
//! let client = OrgApiClient::new(
//!     Arc::new(ReqwestTransport::new(config.request_timeout)?),
//!     Arc::new(StaticToken::new(token)),
//!     config,
//! );
//! let pipeline = ConversionPipeline::new(client, storage);
//! let report = pipeline.run(&ConversionContext::new("device-1", "vol-1", here)).await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod attributes;
mod client;
mod config;
mod error;
mod fingerprint;
mod legacy;
mod pipeline;
mod token;
mod transport;

pub use attributes::{AttributeMap, DEFAULT_ATTRIBUTES};
pub use client::OrgApiClient;
pub use config::{
    ConvertConfig, DEFAULT_API_BASE_TEMPLATE, DEFAULT_SERVER_TEMPLATE, NOT_READY_STATUS,
};
pub use error::{ConvertError, Result};
pub use fingerprint::address_fingerprint;
pub use legacy::{decode_legacy_blob, LegacyNodes};
pub use pipeline::{
    continental_us, visit_status, ConversionContext, ConversionPipeline, ConversionReport,
    FormReport, PipelineStatus, SkippedForm, UNRESTRICTED_TURF,
};
pub use token::{StaticToken, TokenProvider};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport, TransportError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
