//! Error types for the QKD environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Background playback task panicked or was aborted
    #[error("Task error: {0}")]
    TaskError(String),

    /// Event consumer went away while the driver was still emitting
    #[error("Event sink closed: {0}")]
    SinkClosed(String),
}

impl EnvError {
    /// Creates a task error.
    pub fn task(msg: impl Into<String>) -> Self {
        Self::TaskError(msg.into())
    }

    /// Creates a sink-closed error.
    pub fn sink_closed(what: impl std::fmt::Display) -> Self {
        Self::SinkClosed(what.to_string())
    }
}
