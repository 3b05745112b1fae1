//! Dispatcher error types

use contracts::ChannelId;
use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Link target creation error
    #[error("failed to create link target '{name}': {message}")]
    TargetCreation { name: String, message: String },

    /// Two targets registered on one channel
    #[error("channel {channel} already has a link target")]
    DuplicateChannel { channel: ChannelId },

    /// Link target error (from contract)
    #[error("link target error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl DispatcherError {
    /// Create a target creation error
    pub fn target_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TargetCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
