//! Concurrent event dispatch
//!
//! Every matching event gets its own task. Tasks are unordered; a semaphore
//! caps how many run at once, and the dispatcher keeps their handles so
//! shutdown can wait for them.

use crate::pipeline::{PipelineOutcome, ZoneSyncPipeline};
use dns_chain::LogRecord;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub struct EventDispatcher {
    pipeline: Arc<ZoneSyncPipeline>,
    permits: Arc<Semaphore>,
    tasks: Vec<JoinHandle<()>>,
}

impl EventDispatcher {
    pub fn new(pipeline: Arc<ZoneSyncPipeline>, max_concurrent_tasks: usize) -> Self {
        Self {
            pipeline,
            permits: Arc::new(Semaphore::new(max_concurrent_tasks.max(1))),
            tasks: Vec::new(),
        }
    }

    pub fn pipeline(&self) -> &Arc<ZoneSyncPipeline> {
        &self.pipeline
    }

    /// Decode `log` and, if it is a zone hash change, start processing it
    ///
    /// Waits for a free permit before spawning, so intake stalls while
    /// `max_concurrent_tasks` events are in flight. Does not wait for the task.
    pub async fn dispatch(&mut self, log: LogRecord) {
        self.tasks.retain(|task| !task.is_finished());

        let event = match self.pipeline.decode(&log) {
            Ok(Some(event)) => event,
            Ok(None) => {
                debug!(address = %log.address, "Ignoring unrelated log");
                return;
            }
            Err(err) => {
                warn!(
                    stage = err.stage(),
                    category = err.category(),
                    address = %log.address,
                    error = %err,
                    "Failed to decode zone hash event"
                );
                return;
            }
        };

        let permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(err) => {
                warn!(node = %event.node, error = %err, "Dispatcher closed, event dropped");
                return;
            }
        };

        let pipeline = self.pipeline.clone();
        self.tasks.push(tokio::spawn(async move {
            let _permit = permit;

            debug!(
                node = %event.node,
                action = event.action().as_str(),
                emitter = %event.emitter,
                "Processing zone hash event"
            );

            match pipeline.process(&event).await {
                Ok(PipelineOutcome::Written { domain, .. }) => {
                    debug!(domain = %domain, node = %event.node, "Event committed");
                }
                Ok(PipelineOutcome::Removed { domain, .. }) => {
                    debug!(domain = %domain, node = %event.node, "Event committed");
                }
                Err(err) => {
                    warn!(
                        stage = err.stage(),
                        category = err.category(),
                        transient = err.is_transient(),
                        action = event.action().as_str(),
                        node = %event.node,
                        emitter = %event.emitter,
                        content = %hex::encode(event.content_reference()),
                        error = %err,
                        "Event dropped"
                    );
                }
            }
        }));
    }

    /// Number of dispatched tasks that have not finished
    pub fn in_flight(&self) -> usize {
        self.tasks.iter().filter(|task| !task.is_finished()).count()
    }

    /// Wait for every dispatched task to finish
    pub async fn drain(&mut self) {
        for task in self.tasks.drain(..) {
            if let Err(err) = task.await {
                warn!(error = %err, "Event task panicked");
            }
        }
    }
}
