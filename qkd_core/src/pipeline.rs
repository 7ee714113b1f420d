//! End-to-end BB84 simulation pipeline.
//!
//! # Data flow
//!
//! ```text
//! RandomnessSource
//!      │
//!      ▼
//! generate_sequences ──► reconcile ──► estimate_qber ──► reduce_key
//!                                           │                │
//!                                           ▼                ▼
//!                                        assess          XorCipher
//!                                           │                │
//!                                           ▼                │
//!                                  synthesize_timeline       │
//!                                           │                │
//!                                           └──► SimulationResult ◄──┘
//! ```
//!
//! The pipeline is synchronous and never sleeps. All pacing lives in the
//! playback layer.

use crate::assessment::{assess, ChannelSecurity, SecurityStatus};
use crate::cipher::XorCipher;
use crate::error::{QkdError, Result};
use crate::key_reducer::{reduce_key, KeyReduction};
use crate::qber::estimate_qber;
use crate::randomness::RandomnessSource;
use crate::reconcile::reconcile;
use crate::sequence::{generate_sequences, DEFAULT_SEQUENCE_LENGTH};
use crate::timeline::{synthesize_timeline, SecuritySample};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Caller request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    pub message: String,
    pub simulate_interception: bool,
}

impl SimulationRequest {
    /// Creates a request.
    pub fn new(message: impl Into<String>, simulate_interception: bool) -> Self {
        Self {
            message: message.into(),
            simulate_interception,
        }
    }

    /// Rejects requests that must not start a simulation.
    pub fn validate(&self) -> Result<()> {
        if self.message.is_empty() {
            return Err(QkdError::EmptyMessage);
        }
        Ok(())
    }
}

/// Configuration for the numeric pipeline.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Photons per run (default: 1024)
    pub sequence_length: usize,

    /// Master seed; `None` draws one from OS entropy per run
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            sequence_length: DEFAULT_SEQUENCE_LENGTH,
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// Sets the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the sequence length.
    pub fn with_sequence_length(mut self, length: usize) -> Self {
        self.sequence_length = length;
        self
    }

    /// Rejects configurations that cannot produce a key.
    pub fn validate(&self) -> Result<()> {
        if self.sequence_length == 0 {
            return Err(QkdError::InvalidSequenceLength(self.sequence_length));
        }
        Ok(())
    }

    /// Creates the randomness source for one run.
    pub fn randomness(&self) -> RandomnessSource {
        match self.seed {
            Some(seed) => RandomnessSource::from_seed(seed),
            None => RandomnessSource::from_entropy(),
        }
    }
}

/// Everything a run produces, in the shape consumed by displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub original_message: String,
    pub encrypted_message_hex: String,
    pub decrypted_message: String,

    pub alice_bases: String,
    pub bob_bases: String,
    pub matching_bases: usize,
    pub matching_percentage: f64,

    pub raw_key: String,
    pub raw_key_size: usize,
    pub final_key: String,
    pub final_key_size: usize,
    pub key_reduction: KeyReduction,

    pub qber: f64,
    pub qber_threshold: f64,
    pub intercept_detected: bool,

    pub security_status: SecurityStatus,
    pub security_timeline: Vec<SecuritySample>,
    pub entropy_reduction: f64,
    pub security_parameter: u32,
    pub max_leakage: f64,
    pub channel_security: ChannelSecurity,
    pub compromise_estimate: f64,
    pub confidence_level: f64,
}

/// The numeric BB84 pipeline.
#[derive(Debug, Clone, Default)]
pub struct QkdPipeline {
    config: SimulationConfig,
}

impl QkdPipeline {
    /// Creates a pipeline with the given configuration.
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// Runs with a fresh randomness source built from the configuration.
    pub fn run(&self, request: &SimulationRequest) -> Result<SimulationResult> {
        request.validate()?;
        let mut rng = self.config.randomness();
        self.run_with(request, &mut rng)
    }

    /// Runs with a caller-supplied randomness source.
    pub fn run_with(
        &self,
        request: &SimulationRequest,
        rng: &mut RandomnessSource,
    ) -> Result<SimulationResult> {
        request.validate()?;

        info!("Starting simulation with message: '{}'", request.message);
        if request.simulate_interception {
            info!("Interception simulation enabled");
        }

        let sequences = generate_sequences(self.config.sequence_length, rng)?;
        let sifted = reconcile(&sequences.alice_bases, &sequences.bob_bases, &sequences.raw_bits)?;
        debug!(
            "Sifted {} of {} bits ({:.1}%)",
            sifted.matching_count,
            sequences.len(),
            sifted.matching_percentage
        );

        let qber = estimate_qber(request.simulate_interception, rng)?;
        debug!("QBER {:.2}% (detected={})", qber.value, qber.intercept_detected);

        let reduced = reduce_key(&sifted.raw_key, rng);
        debug!(
            "Key reduced {} -> {} bits (ec={}, pa={})",
            reduced.reduction.raw_length,
            reduced.reduction.final_length,
            reduced.reduction.error_correction_loss,
            reduced.reduction.privacy_amplification_loss
        );

        let cipher = XorCipher::from_key(&reduced.final_key)?;
        let encrypted = cipher.encrypt(&request.message);
        let decrypted_message = cipher.decrypt(&encrypted.ciphertext)?;
        debug_assert_eq!(decrypted_message, request.message);

        let assessment = assess(qber.intercept_detected, rng)?;
        let security_timeline = synthesize_timeline(qber.intercept_detected, rng)?;

        info!("Simulation completed successfully ({})", assessment.security_status);

        Ok(SimulationResult {
            original_message: request.message.clone(),
            encrypted_message_hex: encrypted.ciphertext_hex(),
            decrypted_message,
            alice_bases: sequences.alice_bases.to_string(),
            bob_bases: sequences.bob_bases.to_string(),
            matching_bases: sifted.matching_count,
            matching_percentage: sifted.matching_percentage,
            raw_key: sifted.raw_key.to_string(),
            raw_key_size: sifted.raw_key.len(),
            final_key: reduced.final_key.to_string(),
            final_key_size: reduced.final_key.len(),
            key_reduction: reduced.reduction,
            qber: qber.value,
            qber_threshold: qber.threshold,
            intercept_detected: qber.intercept_detected,
            security_status: assessment.security_status,
            security_timeline,
            entropy_reduction: assessment.entropy_reduction,
            security_parameter: assessment.security_parameter,
            max_leakage: assessment.max_leakage,
            channel_security: assessment.channel_security,
            compromise_estimate: assessment.compromise_estimate,
            confidence_level: assessment.confidence_level,
        })
    }
}
