//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Neither a recorded trace nor a simulation section
    #[error("No trace source: pass --trace or add a [simulation] section to {path}")]
    NoTraceSource { path: String },

    /// Simulated capture timer rejected the engine's actions or a trace failed to load
    #[error("Capture binding failed: {0}")]
    Capture(#[from] ingestion::IngestionError),

    /// Host request or configuration rejected
    #[error("{0}")]
    Contract(#[from] contracts::ContractError),

    /// Link dispatcher setup error
    #[error("Link dispatcher setup failed: {0}")]
    Dispatcher(#[from] dispatcher::DispatcherError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn no_trace_source(path: impl Into<String>) -> Self {
        Self::NoTraceSource { path: path.into() }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
