//! Naming registry lookups and event origin attestation

use async_trait::async_trait;
use dns_core::{namehash, Address, DnsError, DnsResult, NodeHash};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Mainnet ENS registry
pub const ENS_REGISTRY_ADDRESS: &str = "0x00000000000C2E074eC69A0dFb2997BA6C7d2e1e";

/// First four bytes of `keccak256("resolver(bytes32)")`
pub const RESOLVER_SELECTOR: [u8; 4] = [0x01, 0x78, 0xb8, 0xbf];

/// Source of the resolver registered for a name
#[async_trait]
pub trait ResolverRegistry: Send + Sync {
    /// Resolver contract currently registered for `node`
    ///
    /// `name` is carried for error context only.
    async fn resolver(&self, name: &str, node: &NodeHash) -> DnsResult<Address>;
}

/// Registry reached through a JSON-RPC `eth_call`
#[derive(Debug)]
pub struct JsonRpcRegistry {
    endpoint: String,
    registry: Address,
    client: reqwest::Client,
    request_id: AtomicU64,
}

#[derive(Debug, Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl JsonRpcRegistry {
    pub fn new(endpoint: impl Into<String>, registry: Address, timeout: Duration) -> DnsResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DnsError::invalid_config(format!("Failed to build RPC client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into(),
            registry,
            client,
            request_id: AtomicU64::new(1),
        })
    }

    /// Registry client for the well-known ENS registry
    pub fn ens(endpoint: impl Into<String>, timeout: Duration) -> DnsResult<Self> {
        let registry = Address::from_str(ENS_REGISTRY_ADDRESS).map_err(DnsError::invalid_config)?;
        Self::new(endpoint, registry, timeout)
    }

    pub fn registry_address(&self) -> Address {
        self.registry
    }

    fn call_data(node: &NodeHash) -> String {
        let mut data = Vec::with_capacity(36);
        data.extend_from_slice(&RESOLVER_SELECTOR);
        data.extend_from_slice(node.as_bytes());
        format!("0x{}", hex::encode(data))
    }
}

#[async_trait]
impl ResolverRegistry for JsonRpcRegistry {
    async fn resolver(&self, name: &str, node: &NodeHash) -> DnsResult<Address> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.request_id.fetch_add(1, Ordering::Relaxed),
            method: "eth_call",
            params: json!([
                { "to": self.registry.to_string(), "data": Self::call_data(node) },
                "latest"
            ]),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| DnsError::resolver_lookup(name, e.to_string()))?;

        let response: RpcResponse = response
            .json()
            .await
            .map_err(|e| DnsError::resolver_lookup(name, format!("invalid RPC response: {}", e)))?;

        if let Some(error) = response.error {
            return Err(DnsError::resolver_lookup(
                name,
                format!("RPC error {}: {}", error.code, error.message),
            ));
        }

        let result = response
            .result
            .ok_or_else(|| DnsError::resolver_lookup(name, "RPC response has no result"))?;
        let bytes = hex::decode(result.trim_start_matches("0x"))
            .map_err(|e| DnsError::resolver_lookup(name, format!("invalid result: {}", e)))?;
        if bytes.len() < 32 {
            return Err(DnsError::resolver_lookup(
                name,
                format!("result is {} bytes, expected 32", bytes.len()),
            ));
        }

        let mut address = [0u8; 20];
        address.copy_from_slice(&bytes[12..32]);
        Ok(Address(address))
    }
}

/// Outcome of comparing an event's emitter with the registered resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginAttestation {
    pub resolver: Address,
    pub emitter: Address,
}

impl OriginAttestation {
    /// True when the event came from the domain's registered resolver
    pub fn is_valid(&self) -> bool {
        self.resolver == self.emitter
    }
}

/// Confirms events originate from the domain's registered resolver
#[derive(Clone)]
pub struct OriginAttestor {
    registry: Arc<dyn ResolverRegistry>,
}

impl OriginAttestor {
    pub fn new(registry: Arc<dyn ResolverRegistry>) -> Self {
        Self { registry }
    }

    /// Look up the resolver for `domain_name` and compare it with `emitter`
    ///
    /// The lookup is made for every call; registry state may change between
    /// events. An unset resolver is a [`DnsError::ResolverLookup`] error.
    pub async fn attest(&self, domain_name: &str, emitter: Address) -> DnsResult<OriginAttestation> {
        let node = namehash(domain_name)?;
        let resolver = self.registry.resolver(domain_name, &node).await?;

        if resolver.is_zero() {
            return Err(DnsError::resolver_lookup(domain_name, "no resolver registered"));
        }

        Ok(OriginAttestation { resolver, emitter })
    }
}

impl std::fmt::Debug for OriginAttestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OriginAttestor").finish_non_exhaustive()
    }
}
