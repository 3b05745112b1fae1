//! LogTarget - logs link messages via tracing

use contracts::{ChannelId, ContractError, LinkMessage, LinkTarget};
use tracing::{info, instrument};

/// Target that only logs what it receives, for debugging
pub struct LogTarget {
    name: String,
    channel: ChannelId,
    received: u64,
}

impl LogTarget {
    /// Create a new LogTarget with the given name
    pub fn new(name: impl Into<String>, channel: ChannelId) -> Self {
        Self {
            name: name.into(),
            channel,
            received: 0,
        }
    }
}

impl LinkTarget for LogTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn channel(&self) -> ChannelId {
        self.channel
    }

    #[instrument(
        name = "log_target_on_link",
        skip(self),
        fields(link = %self.name, message = message.as_str())
    )]
    async fn on_link(&mut self, message: LinkMessage) -> Result<(), ContractError> {
        self.received += 1;
        info!(
            link = %self.name,
            channel = %self.channel,
            message = message.as_str(),
            received = self.received,
            "Link message received"
        );
        Ok(())
    }

    #[instrument(name = "log_target_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(link = %self.name, received = self.received, "LogTarget closed");
        Ok(())
    }
}
