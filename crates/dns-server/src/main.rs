//! dns-zonesync
//!
//! Reads zone hash change logs from standard input and keeps a nameserver's
//! zone directory in step with the content they point at.

use clap::Parser;
use dns_server::{init_logging, Args, Config, ZoneSyncServer};
use std::process;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Load configuration
    let config = match Config::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    // Initialize logging
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("{}", e);
        process::exit(1);
    }

    info!(
        connection = %config.chain.endpoint,
        dir = %config.storage.output_dir.display(),
        gateway = %config.gateway.base_url,
        origin_policy = ?config.pipeline.origin_policy,
        "Starting listener"
    );

    let server = match ZoneSyncServer::new(&config) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "Failed to create zone sync server");
            process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        error!(error = %e, "Zone sync server error");
        process::exit(1);
    }
}
