//! Error types for the QKD pipeline.

use thiserror::Error;

/// Errors raised by the BB84 pipeline.
///
/// Every variant is surfaced before any partial result is produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QkdError {
    /// The request carried an empty message
    #[error("Please enter a message to encrypt")]
    EmptyMessage,

    /// Sequence length must be at least one photon
    #[error("Invalid sequence length: {0}")]
    InvalidSequenceLength(usize),

    /// Basis/bit sequences handed to the reconciler differ in length
    #[error("Sequence length mismatch: alice={alice}, bob={bob}, bits={bits}")]
    LengthMismatch {
        alice: usize,
        bob: usize,
        bits: usize,
    },

    /// A bit string contained something other than '0' or '1'
    #[error("Invalid bit character: {0:?}")]
    InvalidBit(char),

    /// Cipher was built from a key that packs to zero bytes
    #[error("Key material is empty")]
    EmptyKey,

    /// Sampling range or probability outside its domain
    #[error("Invalid distribution: {0}")]
    InvalidDistribution(String),

    /// Decrypted bytes could not be read back as text
    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl QkdError {
    /// Creates a distribution error.
    pub fn distribution(msg: impl Into<String>) -> Self {
        Self::InvalidDistribution(msg.into())
    }
}

/// Result alias used across the pipeline.
pub type Result<T> = std::result::Result<T, QkdError>;
