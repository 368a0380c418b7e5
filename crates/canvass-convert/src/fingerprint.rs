//! Address fingerprints
//!
//! The organization API keys addresses by the md5 of the lowercased street,
//! city and state followed by the 5-digit zip. Units and visits reference
//! their address through this value.

use canvass_graph::Address;
use md5::{Digest, Md5};

/// Fingerprint of an address (lowercase hex md5)
#[must_use]
pub fn address_fingerprint(address: &Address) -> String {
    let zip: String = address.zip.chars().take(5).collect();

    let mut hasher = Md5::new();
    hasher.update(address.street.to_lowercase().as_bytes());
    hasher.update(address.city.to_lowercase().as_bytes());
    hasher.update(address.state.to_lowercase().as_bytes());
    hasher.update(zip.as_bytes());
    hex::encode(hasher.finalize())
}
