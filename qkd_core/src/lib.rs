//! QKD Core - Satellite BB84 key distribution pipeline
//!
//! This library models a satellite-mediated BB84 exchange between two
//! ground stations and everything that happens to the key afterwards:
//! 1. **Sifting**: random bases on both ends, keep the agreeing positions
//! 2. **Eavesdropping signal**: statistical QBER model with a detection rule
//! 3. **Key reduction**: error correction and privacy amplification as length loss
//! 4. **Use**: repeating-key XOR over the message, security assessment, timeline
//!
//! The physics is not simulated. Error correction and privacy amplification
//! only change key length and the reported security figures.

pub mod assessment;
pub mod cipher;
pub mod error;
pub mod key_reducer;
pub mod pipeline;
pub mod progress;
pub mod qber;
pub mod randomness;
pub mod reconcile;
pub mod sequence;
pub mod timeline;

// Re-export key types for convenience
pub use assessment::{ChannelSecurity, SecurityAssessment, SecurityStatus};
pub use cipher::{CipherResult, XorCipher};
pub use error::QkdError;
pub use pipeline::{QkdPipeline, SimulationConfig, SimulationRequest, SimulationResult};
pub use progress::{ProgressStep, ProgressSteps};
pub use qber::{QberMeasurement, QBER_THRESHOLD};
pub use randomness::RandomnessSource;
pub use sequence::{Basis, BasisSequence, Bit, BitSequence};
pub use timeline::{SampleStatus, SecuritySample};
