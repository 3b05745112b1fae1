//! LinkHandle - runs a link target behind its own queue and worker task

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{ChannelId, LinkMessage, LinkTarget};

use crate::metrics::LinkMetrics;

/// Handle to a running link target worker
pub struct LinkHandle {
    /// Target name
    name: String,
    /// Channel the target listens on
    channel: ChannelId,
    /// Channel to send messages to worker
    tx: mpsc::Sender<LinkMessage>,
    /// Shared metrics
    metrics: Arc<LinkMetrics>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl LinkHandle {
    /// Create a new LinkHandle and spawn the worker task
    pub fn spawn<T: LinkTarget + 'static>(target: T, queue_capacity: usize) -> Self {
        let name = target.name().to_string();
        let channel = target.channel();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(LinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            link_worker(target, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            channel,
            tx,
            metrics,
            worker_handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn metrics(&self) -> &Arc<LinkMetrics> {
        &self.metrics
    }

    /// Queue a message for the target (non-blocking)
    ///
    /// Returns true if queued, false if the queue was full (message dropped)
    pub fn try_send(&self, message: LinkMessage) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(message)) => {
                self.metrics.inc_dropped_count();
                warn!(
                    link = %self.name,
                    message = message.as_str(),
                    "Link queue full, message dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(link = %self.name, "Link worker closed unexpectedly");
                false
            }
        }
    }

    /// Drain the queue and close the target
    #[instrument(name = "link_handle_shutdown", skip(self), fields(link = %self.name))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(link = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(link = %self.name, "LinkHandle shutdown complete");
    }
}

/// Worker task that hands queued messages to the target
#[instrument(
    name = "link_worker_loop",
    skip(target, rx, metrics),
    fields(link = %name)
)]
async fn link_worker<T: LinkTarget>(
    mut target: T,
    mut rx: mpsc::Receiver<LinkMessage>,
    metrics: Arc<LinkMetrics>,
    name: String,
) {
    debug!(link = %name, "Link worker started");

    while let Some(message) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match target.on_link(message).await {
            Ok(()) => metrics.inc_delivered_count(),
            Err(e) => {
                metrics.inc_failure_count();
                error!(
                    link = %name,
                    message = message.as_str(),
                    error = %e,
                    "Link handling failed"
                );
            }
        }
    }

    if let Err(e) = target.close().await {
        error!(link = %name, error = %e, "Close failed on shutdown");
    }

    debug!(link = %name, "Link worker stopped");
}
