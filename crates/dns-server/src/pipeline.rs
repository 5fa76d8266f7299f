//! Per-event zone synchronisation
//!
//! One change event runs through fetch, validation and origin attestation
//! before the zone store is touched. Any failure ends the run for that event
//! only; nothing is retried.

use crate::config::{Config, OriginPolicy};
use dns_chain::{
    ChangeEvent, ContentResolver, EventDecoder, JsonRpcRegistry, LogRecord, OriginAttestor,
    ZoneAction,
};
use dns_core::{Address, DnsError, DnsResult, NodeHash};
use dns_protocol::{ZoneFile, ZoneFileValidator};
use dns_storage::ZoneStore;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a successful pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Written { domain: String, path: PathBuf },
    /// `existed` is false when there was no zone file to remove
    Removed { domain: String, existed: bool },
}

/// Fetch, validate, attest, commit
#[derive(Debug)]
pub struct ZoneSyncPipeline {
    decoder: EventDecoder,
    resolver: ContentResolver,
    validator: ZoneFileValidator,
    attestor: OriginAttestor,
    store: ZoneStore,
    origin_policy: OriginPolicy,

    /// Atomic counters
    events_seen: AtomicU64,
    events_ignored: AtomicU64,
    updates: AtomicU64,
    removals: AtomicU64,
    commits: AtomicU64,
    origin_rejections: AtomicU64,
    failures: AtomicU64,
}

/// Pipeline statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStatistics {
    pub events_seen: u64,
    pub events_ignored: u64,
    pub updates: u64,
    pub removals: u64,
    pub commits: u64,
    pub origin_rejections: u64,
    pub failures: u64,
}

impl ZoneSyncPipeline {
    /// Build the pipeline and its network clients from configuration
    pub fn new(config: &Config) -> DnsResult<Self> {
        let resolver = ContentResolver::new(config.gateway.base_url.clone(), config.gateway_timeout())?;
        let registry = JsonRpcRegistry::new(
            config.chain.endpoint.clone(),
            config.registry_address()?,
            config.chain_timeout(),
        )?;
        let store = ZoneStore::new(&config.storage.output_dir)?;

        Ok(Self::with_components(
            resolver,
            OriginAttestor::new(Arc::new(registry)),
            store,
            config.pipeline.origin_policy,
        ))
    }

    pub fn with_components(
        resolver: ContentResolver,
        attestor: OriginAttestor,
        store: ZoneStore,
        origin_policy: OriginPolicy,
    ) -> Self {
        Self {
            decoder: EventDecoder::new(),
            resolver,
            validator: ZoneFileValidator::new(),
            attestor,
            store,
            origin_policy,
            events_seen: AtomicU64::new(0),
            events_ignored: AtomicU64::new(0),
            updates: AtomicU64::new(0),
            removals: AtomicU64::new(0),
            commits: AtomicU64::new(0),
            origin_rejections: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Decode a log record, counting it
    ///
    /// `Ok(None)` means the log is some other event.
    pub fn decode(&self, log: &LogRecord) -> DnsResult<Option<ChangeEvent>> {
        self.events_seen.fetch_add(1, Ordering::Relaxed);

        match self.decoder.decode(log) {
            Ok(Some(event)) => Ok(Some(event)),
            Ok(None) => {
                self.events_ignored.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                Err(err)
            }
        }
    }

    /// Run a decoded event to completion
    pub async fn process(&self, event: &ChangeEvent) -> DnsResult<PipelineOutcome> {
        let result = match event.action() {
            ZoneAction::Update => {
                self.updates.fetch_add(1, Ordering::Relaxed);
                self.fetch(event).await
            }
            ZoneAction::Removal => {
                self.removals.fetch_add(1, Ordering::Relaxed);
                self.clear(event).await
            }
        };

        match &result {
            Ok(_) => {
                self.commits.fetch_add(1, Ordering::Relaxed);
            }
            Err(DnsError::OriginRejected { .. }) => {
                self.origin_rejections.fetch_add(1, Ordering::Relaxed);
                self.failures.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    /// Update path: fetch the new zone file and write it
    pub async fn fetch(&self, event: &ChangeEvent) -> DnsResult<PipelineOutcome> {
        let zone = self.load_zone(&event.new_content, &event.node).await?;
        self.check_origin(&zone.domain_name, event.emitter).await?;

        let path = self.store.write(&zone.domain_name, zone.text.as_bytes()).await?;
        info!(
            domain = %zone.domain_name,
            path = %path.display(),
            records = zone.record_count,
            "Zone file updated"
        );

        Ok(PipelineOutcome::Written {
            domain: zone.domain_name,
            path,
        })
    }

    /// Removal path: validate the previous zone file, then delete it
    pub async fn clear(&self, event: &ChangeEvent) -> DnsResult<PipelineOutcome> {
        let zone = self.load_zone(&event.previous_content, &event.node).await?;
        self.check_origin(&zone.domain_name, event.emitter).await?;

        let existed = self.store.delete(&zone.domain_name).await?;
        if existed {
            info!(domain = %zone.domain_name, "Zone file removed");
        } else {
            warn!(domain = %zone.domain_name, "No zone file to remove");
        }

        Ok(PipelineOutcome::Removed {
            domain: zone.domain_name,
            existed,
        })
    }

    async fn load_zone(&self, contenthash: &[u8], node: &NodeHash) -> DnsResult<ZoneFile> {
        let text = self.resolver.fetch(contenthash).await?;
        let zone = self.validator.validate(&text, node)?;
        debug!(domain = %zone.domain_name, node = %node, "Zone file validated");
        Ok(zone)
    }

    async fn check_origin(&self, domain_name: &str, emitter: Address) -> DnsResult<()> {
        let attestation = self.attestor.attest(domain_name, emitter).await?;
        if attestation.is_valid() {
            return Ok(());
        }

        match self.origin_policy {
            OriginPolicy::Enforce => Err(DnsError::OriginRejected {
                name: domain_name.to_string(),
                resolver: attestation.resolver.to_string(),
            }),
            OriginPolicy::Warn => {
                warn!(
                    domain = %domain_name,
                    resolver = %attestation.resolver,
                    emitter = %attestation.emitter,
                    "Invalid event origin"
                );
                Ok(())
            }
        }
    }

    /// Get pipeline statistics
    pub fn get_statistics(&self) -> PipelineStatistics {
        PipelineStatistics {
            events_seen: self.events_seen.load(Ordering::Relaxed),
            events_ignored: self.events_ignored.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            origin_rejections: self.origin_rejections.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}
