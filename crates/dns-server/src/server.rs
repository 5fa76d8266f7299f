//! Event intake loop
//!
//! The external listener pipes matching logs in as newline-delimited JSON.
//! Each line is handed to the dispatcher; lines that are not JSON log records
//! are skipped. EOF, a read error or Ctrl-C stops intake and the server waits
//! for in-flight events before returning.

use crate::config::Config;
use crate::dispatcher::EventDispatcher;
use crate::pipeline::{PipelineStatistics, ZoneSyncPipeline};
use dns_chain::LogRecord;
use dns_core::DnsResult;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};

/// Zone sync bridge
pub struct ZoneSyncServer {
    dispatcher: EventDispatcher,
}

impl ZoneSyncServer {
    pub fn new(config: &Config) -> DnsResult<Self> {
        let pipeline = Arc::new(ZoneSyncPipeline::new(config)?);
        Ok(Self::with_pipeline(pipeline, config.pipeline.max_concurrent_tasks))
    }

    pub fn with_pipeline(pipeline: Arc<ZoneSyncPipeline>, max_concurrent_tasks: usize) -> Self {
        Self {
            dispatcher: EventDispatcher::new(pipeline, max_concurrent_tasks),
        }
    }

    /// Read log records from standard input until EOF or Ctrl-C
    pub async fn run(self) -> DnsResult<PipelineStatistics> {
        self.run_with_input(BufReader::new(tokio::io::stdin())).await
    }

    /// Read log records from `input` until EOF or Ctrl-C
    pub async fn run_with_input<R>(mut self, mut input: R) -> DnsResult<PipelineStatistics>
    where
        R: AsyncBufRead + Unpin,
    {
        info!("Initialised");

        let mut buf = Vec::new();
        let mut line_number = 0usize;
        loop {
            buf.clear();
            let read = tokio::select! {
                read = input.read_until(b'\n', &mut buf) => read,
                result = signal::ctrl_c() => {
                    match result {
                        Ok(()) => info!("Received shutdown signal"),
                        Err(err) => warn!(error = %err, "Unable to listen for shutdown signal"),
                    }
                    break;
                }
            };
            match read {
                Ok(0) => break,
                Ok(_) => {}
                Err(err) => {
                    warn!(line = line_number + 1, error = %err, "Failed to read input, stopping intake");
                    break;
                }
            }
            line_number += 1;

            let Ok(line) = std::str::from_utf8(&buf) else {
                warn!(line = line_number, "Skipping log record that is not valid UTF-8");
                continue;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<LogRecord>(line) {
                Ok(log) => self.dispatcher.dispatch(log).await,
                Err(err) => {
                    warn!(line = line_number, error = %err, "Skipping malformed log record");
                }
            }
        }

        info!(in_flight = self.dispatcher.in_flight(), "Waiting for in-flight events");
        self.dispatcher.drain().await;

        let stats = self.dispatcher.pipeline().get_statistics();
        info!(
            events_seen = stats.events_seen,
            events_ignored = stats.events_ignored,
            updates = stats.updates,
            removals = stats.removals,
            commits = stats.commits,
            origin_rejections = stats.origin_rejections,
            failures = stats.failures,
            "Shutdown"
        );
        Ok(stats)
    }
}
