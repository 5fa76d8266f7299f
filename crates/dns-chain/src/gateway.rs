//! Content address resolution through an HTTP gateway

use crate::contenthash::contenthash_to_string;
use crate::multiaddr::{ContentAddress, P_P2P};
use dns_core::{DnsError, DnsResult};
use std::time::Duration;

/// Resolves content hashes to zone file text via a content gateway
#[derive(Debug, Clone)]
pub struct ContentResolver {
    /// Gateway base URL, e.g. `https://ipfs.io/`
    gateway: String,
    client: reqwest::Client,
}

impl ContentResolver {
    pub fn new(gateway: impl Into<String>, timeout: Duration) -> DnsResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DnsError::invalid_config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            gateway: gateway.into(),
            client,
        })
    }

    /// Decode a content hash into a structured address
    pub fn resolve_address(&self, contenthash: &[u8]) -> DnsResult<ContentAddress> {
        contenthash_to_string(contenthash)?.parse()
    }

    /// Build the gateway URL for an address
    ///
    /// Only addresses ending in a peer identifier can be fetched.
    pub fn request_url(&self, address: &ContentAddress) -> DnsResult<String> {
        let last = address.last_protocol();
        if last.code != P_P2P {
            return Err(DnsError::UnsupportedProtocol {
                protocol: last.name.to_string(),
            });
        }

        let url = collapse_slashes(&format!("{}{}", self.gateway, address));
        Ok(url.replace("/p2p/", "/ipfs/"))
    }

    /// Fetch the zone file text a content hash points at
    ///
    /// A single GET; the response status is not inspected, only transport
    /// and read failures are errors.
    pub async fn fetch(&self, contenthash: &[u8]) -> DnsResult<String> {
        let address = self.resolve_address(contenthash)?;
        let url = self.request_url(&address)?;

        tracing::debug!(address = %address, url = %url, "Fetching zone file");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DnsError::fetch(&url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url = %url, status = %status, "Gateway returned non-success status");
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DnsError::fetch(&url, e.to_string()))?;

        String::from_utf8(body.to_vec())
            .map_err(|e| DnsError::zone_parse(0, format!("zone file is not UTF-8: {}", e)))
    }
}

/// Collapse runs of `/` to one, except directly after a `:`
fn collapse_slashes(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    let mut previous = None;
    for c in url.chars() {
        if c == '/' && previous == Some('/') && !out.ends_with(":/") {
            continue;
        }
        out.push(c);
        previous = Some(c);
    }
    out
}
