//! Session-level errors.

use qkd_core::QkdError;
use qkd_env::EnvError;
use thiserror::Error;

/// Errors surfaced by a session run.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The numeric pipeline rejected the request or failed
    #[error(transparent)]
    Simulation(#[from] QkdError),

    /// Playback task or event plumbing failed
    #[error(transparent)]
    Environment(#[from] EnvError),

    /// Export file could not be written
    #[error("Export failed: {0}")]
    Export(#[from] std::io::Error),

    /// Export could not be encoded
    #[error("Export encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl SessionError {
    /// True when the request itself was invalid, as opposed to a runtime failure.
    pub fn is_rejected_request(&self) -> bool {
        matches!(
            self,
            SessionError::Simulation(QkdError::EmptyMessage | QkdError::InvalidSequenceLength(_))
        )
    }
}
