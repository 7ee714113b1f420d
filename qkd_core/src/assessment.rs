//! Channel security assessment.
//!
//! Turns the interception verdict into the figures shown on the security
//! report: status, leakage bound, confidence and estimated compromise.

use crate::error::Result;
use crate::randomness::RandomnessSource;
use serde::{Deserialize, Serialize};

/// Confidence reported for a clean channel (percent).
pub const SECURE_CONFIDENCE: f64 = 99.9;

/// Overall verdict on the exchanged key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityStatus {
    Secure,
    Compromised,
}

impl SecurityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityStatus::Secure => "SECURE",
            SecurityStatus::Compromised => "COMPROMISED",
        }
    }
}

impl std::fmt::Display for SecurityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict on the quantum channel itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelSecurity {
    Secure,
    Insecure,
}

impl ChannelSecurity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelSecurity::Secure => "SECURE",
            ChannelSecurity::Insecure => "INSECURE",
        }
    }
}

impl std::fmt::Display for ChannelSecurity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Security figures for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SecurityAssessment {
    pub security_status: SecurityStatus,
    pub channel_security: ChannelSecurity,

    /// Estimated share of data exposed (percent); 0 on a clean channel
    pub compromise_estimate: f64,

    /// Confidence in the verdict (percent)
    pub confidence_level: f64,

    /// Entropy lost to privacy amplification (percent)
    pub entropy_reduction: f64,

    /// Security parameter in bits
    pub security_parameter: u32,

    /// Leakage bound, `2^(-security_parameter / 8)`
    pub max_leakage: f64,
}

/// Upper bound on leaked information for a security parameter.
///
/// Strictly decreasing in `security_parameter`.
pub fn max_leakage(security_parameter: u32) -> f64 {
    2f64.powf(-(security_parameter as f64) / 8.0)
}

/// Builds the assessment for a run.
///
/// Draw order is fixed: entropy reduction, security parameter, then the
/// compromise/confidence pair when interception was detected.
pub fn assess(intercept_detected: bool, rng: &mut RandomnessSource) -> Result<SecurityAssessment> {
    let entropy_reduction = rng.uniform(10.0, 20.0)?;
    let security_parameter = rng.integer(50, 200)?;

    let (security_status, channel_security, compromise_estimate, confidence_level) =
        if intercept_detected {
            (
                SecurityStatus::Compromised,
                ChannelSecurity::Insecure,
                rng.uniform(20.0, 60.0)?,
                rng.uniform(70.0, 99.0)?,
            )
        } else {
            (
                SecurityStatus::Secure,
                ChannelSecurity::Secure,
                0.0,
                SECURE_CONFIDENCE,
            )
        };

    Ok(SecurityAssessment {
        security_status,
        channel_security,
        compromise_estimate,
        confidence_level,
        entropy_reduction,
        security_parameter,
        max_leakage: max_leakage(security_parameter),
    })
}
