//! DependentChannel - output channel scheduled on the crank angle base

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{ChannelId, ContractError, DependentKind, EngPosState, LinkMessage, LinkTarget};
use sync_engine::AngleBaseView;
use tracing::{info, instrument};

/// Counters a dependent channel exposes to the host
#[derive(Debug, Default)]
pub struct DependentStatus {
    reinitializations: AtomicU64,
}

impl DependentStatus {
    pub fn reinitializations(&self) -> u64 {
        self.reinitializations.load(Ordering::Relaxed)
    }
}

/// Fuel, spark, injection or knock output driven by the published angle base.
///
/// Suspended while the crank is seeking; re-initialized when the crank stalls.
pub struct DependentChannel {
    name: String,
    channel: ChannelId,
    kind: DependentKind,
    view: AngleBaseView,
    status: Arc<DependentStatus>,
}

impl DependentChannel {
    pub fn new(
        name: impl Into<String>,
        channel: ChannelId,
        kind: DependentKind,
        view: AngleBaseView,
    ) -> Self {
        Self {
            name: name.into(),
            channel,
            kind,
            view,
            status: Arc::new(DependentStatus::default()),
        }
    }

    pub fn kind(&self) -> DependentKind {
        self.kind
    }

    pub fn status(&self) -> Arc<DependentStatus> {
        Arc::clone(&self.status)
    }

    /// No output may be scheduled without an angle base
    pub fn is_suspended(&self) -> bool {
        self.view.eng_pos() == EngPosState::Seek
    }

    /// Current crank angle estimate, None while suspended
    pub fn angle_at(&self, now: u32) -> Option<u32> {
        self.view.angle_at(now)
    }
}

impl LinkTarget for DependentChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn channel(&self) -> ChannelId {
        self.channel
    }

    #[instrument(
        name = "dependent_on_link",
        skip(self),
        fields(dependent = %self.name, kind = ?self.kind, message = message.as_str())
    )]
    async fn on_link(&mut self, message: LinkMessage) -> Result<(), ContractError> {
        if message == LinkMessage::Reinitialize {
            let count = self.status.reinitializations.fetch_add(1, Ordering::Relaxed) + 1;
            info!(
                channel = %self.channel,
                count,
                suspended = self.is_suspended(),
                "dependent channel re-initialized after crank stall"
            );
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}
