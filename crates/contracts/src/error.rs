//! Layered error definitions
//!
//! Categorized by source: config / host / link / trace

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Host Interface Errors =====
    /// Host service request not valid in the current state
    #[error("host request '{request}' rejected: {reason}")]
    HostRequestRejected { request: String, reason: String },

    // ===== Link Errors =====
    /// Link target failed to handle a message
    #[error("link target '{target}' error: {message}")]
    LinkDelivery { target: String, message: String },

    // ===== Trace Errors =====
    /// Recorded trace could not be decoded
    #[error("trace format error: {message}")]
    TraceFormat { message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create host request rejection
    pub fn host_rejected(request: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::HostRequestRejected {
            request: request.into(),
            reason: reason.into(),
        }
    }

    /// Create link delivery error
    pub fn link_delivery(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LinkDelivery {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create trace format error
    pub fn trace_format(message: impl Into<String>) -> Self {
        Self::TraceFormat {
            message: message.into(),
        }
    }
}
