//! LinkTarget trait - Cross-channel notifier interface
//!
//! Collaborator channels (cam logger, fuel, spark, knock) implement this trait to
//! receive link messages from the synchronization engine.

use crate::{ChannelId, ContractError, LinkMessage};

/// Receiver side of a cross-channel link.
///
/// Links are fire-and-forget: the engine never observes the result, errors are
/// only logged and counted by the dispatcher.
#[trait_variant::make(LinkTarget: Send)]
pub trait LocalLinkTarget {
    /// Target name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Channel this target listens on
    fn channel(&self) -> ChannelId;

    /// Handle one link message
    async fn on_link(&mut self, message: LinkMessage) -> Result<(), ContractError>;

    /// Release resources
    async fn close(&mut self) -> Result<(), ContractError>;
}
