//! Domain identity hashing
//!
//! Domain names are keyed on-chain by their ENS namehash: the name is split
//! into labels and folded right to left as
//! `node = keccak256(node || keccak256(label))`, starting from 32 zero bytes.

use crate::{DnsError, DnsResult, NodeHash};
use sha3::{Digest, Keccak256};

/// Keccak-256 digest of arbitrary bytes
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Compute the canonical identity hash of a domain name
///
/// A single trailing root dot is ignored and labels are lower-cased before
/// hashing. The empty name (the root) hashes to [`NodeHash::ZERO`]. Empty
/// labels such as in `a..b` are rejected.
pub fn namehash(name: &str) -> DnsResult<NodeHash> {
    let name = name.strip_suffix('.').unwrap_or(name);
    let mut node = [0u8; 32];
    if name.is_empty() {
        return Ok(NodeHash(node));
    }

    let normalized = name.to_ascii_lowercase();
    for label in normalized.rsplit('.') {
        if label.is_empty() {
            return Err(DnsError::invalid_name(name));
        }
        let mut hasher = Keccak256::new();
        hasher.update(node);
        hasher.update(keccak256(label.as_bytes()));
        node = hasher.finalize().into();
    }

    Ok(NodeHash(node))
}
