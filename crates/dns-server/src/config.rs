//! Configuration management
//!
//! Settings come from an optional TOML file, then command-line flags override
//! individual values. The merged result is validated once at startup.

use clap::{Parser, ValueEnum};
use dns_chain::ENS_REGISTRY_ADDRESS;
use dns_core::{Address, DnsError, DnsResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main bridge configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub chain: ChainConfig,
    pub storage: StorageConfig,
    pub gateway: GatewayConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// JSON-RPC endpoint of the chain node
    pub endpoint: String,
    pub registry_address: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory the nameserver reads `db.<domain>` files from
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on events processed at the same time
    pub max_concurrent_tasks: usize,
    pub origin_policy: OriginPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// What to do when an event did not come from the domain's resolver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OriginPolicy {
    /// Drop the event
    #[default]
    Enforce,
    /// Log a warning and commit anyway
    Warn,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    Compact,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            registry_address: ENS_REGISTRY_ADDRESS.to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 64,
            origin_policy: OriginPolicy::Enforce,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

/// Command-line flags
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "dns-zonesync")]
#[command(about = "Keeps nameserver zone files in sync with on-chain zone hashes")]
pub struct Args {
    /// JSON-RPC endpoint of the chain node
    #[arg(long)]
    pub connection: Option<String>,

    /// Output directory for zone files
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Content gateway base URL
    #[arg(long)]
    pub gateway: Option<String>,

    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Handling of events not emitted by the domain's resolver
    #[arg(long, value_enum)]
    pub origin_policy: Option<OriginPolicy>,

    /// Maximum number of events processed concurrently
    #[arg(long)]
    pub max_tasks: Option<usize>,

    #[arg(long)]
    pub log_level: Option<String>,

    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> DnsResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DnsError::ConfigurationNotFound {
                    path: path.display().to_string(),
                }
            } else {
                DnsError::ConfigurationParseError {
                    message: format!("Failed to read {}: {}", path.display(), e),
                }
            }
        })?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> DnsResult<Self> {
        toml::from_str(content).map_err(|e| DnsError::ConfigurationParseError {
            message: e.to_string(),
        })
    }

    /// Build the effective configuration from command-line flags
    pub fn from_args(args: &Args) -> DnsResult<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    /// Override file values with any flags that were given
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(connection) = &args.connection {
            self.chain.endpoint = connection.clone();
        }
        if let Some(dir) = &args.dir {
            self.storage.output_dir = dir.clone();
        }
        if let Some(gateway) = &args.gateway {
            self.gateway.base_url = gateway.clone();
        }
        if let Some(policy) = args.origin_policy {
            self.pipeline.origin_policy = policy;
        }
        if let Some(max_tasks) = args.max_tasks {
            self.pipeline.max_concurrent_tasks = max_tasks;
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if let Some(format) = args.log_format {
            self.logging.format = format;
        }
    }

    pub fn validate(&self) -> DnsResult<()> {
        if self.chain.endpoint.is_empty() {
            return Err(DnsError::invalid_config("--connection is required"));
        }
        if self.storage.output_dir.as_os_str().is_empty() {
            return Err(DnsError::invalid_config("--dir is required"));
        }
        if self.gateway.base_url.is_empty() {
            return Err(DnsError::invalid_config("--gateway is required"));
        }

        for (what, url) in [("chain endpoint", &self.chain.endpoint), ("gateway URL", &self.gateway.base_url)] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(DnsError::invalid_config(format!("{} {} must use http or https", what, url)));
            }
        }

        if self.storage.output_dir.exists() && !self.storage.output_dir.is_dir() {
            return Err(DnsError::invalid_config(format!(
                "output path {} is not a directory",
                self.storage.output_dir.display()
            )));
        }

        self.registry_address()?;

        if self.pipeline.max_concurrent_tasks == 0 {
            return Err(DnsError::invalid_config("max_concurrent_tasks must be at least 1"));
        }
        if self.chain.request_timeout_secs == 0 || self.gateway.request_timeout_secs == 0 {
            return Err(DnsError::invalid_config("request timeouts must be at least 1 second"));
        }

        Ok(())
    }

    pub fn registry_address(&self) -> DnsResult<Address> {
        self.chain.registry_address.parse().map_err(|e| {
            DnsError::invalid_config(format!(
                "invalid registry address {}: {}",
                self.chain.registry_address, e
            ))
        })
    }

    pub fn chain_timeout(&self) -> Duration {
        Duration::from_secs(self.chain.request_timeout_secs)
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway.request_timeout_secs)
    }
}
