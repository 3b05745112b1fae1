//! LinkDispatcher - fans engine link requests out to the target channels

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, instrument};

use contracts::{ChannelId, ChannelSet, DependentKind, LinkConfig, LinkMessage};
use sync_engine::AngleBaseView;

use crate::error::DispatcherError;
use crate::handle::LinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::targets::{CamLog, CamLogTarget, DependentChannel, DependentStatus, LogTarget};

/// Collaborator state that outlives the worker tasks
#[derive(Clone, Default)]
pub struct Collaborators {
    pub cam_log: Option<CamLog>,
    pub dependents: Vec<(String, Arc<DependentStatus>)>,
}

/// Builder for creating a LinkDispatcher from the link configuration
pub struct DispatcherBuilder {
    config: LinkConfig,
    view: AngleBaseView,
}

impl DispatcherBuilder {
    pub fn new(config: LinkConfig, view: AngleBaseView) -> Self {
        Self { config, view }
    }

    /// Spawn one worker per configured channel
    #[instrument(
        name = "dispatcher_builder_build",
        skip(self),
        fields(dependents = self.config.dependents.len())
    )]
    pub fn build(self) -> Result<(LinkDispatcher, Collaborators), DispatcherError> {
        let capacity = self.config.queue_capacity;
        let mut dispatcher = LinkDispatcher::new();
        let mut collaborators = Collaborators::default();

        if let Some(index) = self.config.cam_channel {
            let channel = channel_id("cam", index)?;
            let log = CamLog::new(self.config.cam_log_capacity);
            dispatcher.register(LinkHandle::spawn(
                CamLogTarget::new("cam", channel, log.clone()),
                capacity,
            ))?;
            collaborators.cam_log = Some(log);
        }

        for dependent in &self.config.dependents {
            let channel = channel_id(&dependent.name, dependent.channel)?;
            let handle = match dependent.kind {
                DependentKind::Log => {
                    LinkHandle::spawn(LogTarget::new(&dependent.name, channel), capacity)
                }
                kind => {
                    let target =
                        DependentChannel::new(&dependent.name, channel, kind, self.view.clone());
                    collaborators
                        .dependents
                        .push((dependent.name.clone(), target.status()));
                    LinkHandle::spawn(target, capacity)
                }
            };
            dispatcher.register(handle)?;
        }

        Ok((dispatcher, collaborators))
    }
}

fn channel_id(name: &str, index: u8) -> Result<ChannelId, DispatcherError> {
    ChannelId::new(index).ok_or_else(|| {
        DispatcherError::target_creation(name, format!("channel {index} out of range"))
    })
}

/// Routes link requests to the handle registered on each target channel
#[derive(Default)]
pub struct LinkDispatcher {
    handles: HashMap<ChannelId, LinkHandle>,
}

impl LinkDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handle; one target per channel
    pub fn register(&mut self, handle: LinkHandle) -> Result<(), DispatcherError> {
        let channel = handle.channel();
        if self.handles.contains_key(&channel) {
            return Err(DispatcherError::DuplicateChannel { channel });
        }
        self.handles.insert(channel, handle);
        Ok(())
    }

    pub fn channels(&self) -> ChannelSet {
        self.handles.keys().copied().collect()
    }

    /// Queue `message` for every registered channel in `targets`.
    ///
    /// Never blocks; returns how many targets accepted the message. Channels in the
    /// set without a registered target are skipped.
    pub fn notify(&self, targets: ChannelSet, message: LinkMessage) -> usize {
        targets
            .iter()
            .filter_map(|channel| self.handles.get(&channel))
            .filter(|handle| handle.try_send(message))
            .count()
    }

    /// Drain every queue and close the targets; returns the final per-target metrics
    pub async fn shutdown(self) -> Vec<(String, MetricsSnapshot)> {
        let mut metrics = Vec::with_capacity(self.handles.len());
        for (_, handle) in self.handles {
            let name = handle.name().to_string();
            let handle_metrics = Arc::clone(handle.metrics());
            handle.shutdown().await;
            metrics.push((name, handle_metrics.snapshot()));
        }
        metrics.sort_by(|a, b| a.0.cmp(&b.0));
        info!(targets = metrics.len(), "Link dispatcher shutdown complete");
        metrics
    }
}
