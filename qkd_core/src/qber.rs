//! Quantum bit error rate model and interception decision.
//!
//! The QBER is not measured from the sifted bits; it is sampled from one of
//! two bands depending on whether an interceptor was requested.

use crate::error::Result;
use crate::randomness::RandomnessSource;
use serde::{Deserialize, Serialize};

/// Published QBER threshold reported with every measurement (percent).
pub const QBER_THRESHOLD: f64 = 10.0;

/// Cutoff used for the detection decision on an unintercepted channel.
///
/// Kept separate from [`QBER_THRESHOLD`]; the two are not interchangeable.
pub const DETECTION_CUTOFF: f64 = 11.0;

/// QBER band for a clean channel (percent).
pub const CLEAN_QBER_RANGE: (f64, f64) = (2.0, 8.0);

/// QBER band when Eve is on the link (percent).
pub const INTERCEPTED_QBER_RANGE: (f64, f64) = (15.0, 25.0);

/// A sampled QBER with its detection verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QberMeasurement {
    /// QBER in percent
    pub value: f64,

    /// Always [`QBER_THRESHOLD`]
    pub threshold: f64,

    /// Whether an eavesdropper is considered detected
    pub intercept_detected: bool,
}

/// Samples the QBER and decides whether interception was detected.
pub fn estimate_qber(
    interception_requested: bool,
    rng: &mut RandomnessSource,
) -> Result<QberMeasurement> {
    let (value, intercept_detected) = if interception_requested {
        let (low, high) = INTERCEPTED_QBER_RANGE;
        (rng.uniform(low, high)?, true)
    } else {
        let (low, high) = CLEAN_QBER_RANGE;
        let value = rng.uniform(low, high)?;
        (value, value > DETECTION_CUTOFF)
    };

    Ok(QberMeasurement {
        value,
        threshold: QBER_THRESHOLD,
        intercept_detected,
    })
}
