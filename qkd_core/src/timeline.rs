//! Security timeline synthesis for playback displays.

use crate::error::Result;
use crate::randomness::RandomnessSource;
use serde::{Deserialize, Serialize};

/// Samples per timeline.
pub const TIMELINE_LENGTH: usize = 20;

/// Status attached to a timeline sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SampleStatus {
    Secure,
    Check,
    Warning,
    Alert,
}

/// One point on the security timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SecuritySample {
    pub qber: f64,
    pub status: SampleStatus,
}

/// Draws [`TIMELINE_LENGTH`] independent samples.
///
/// Intercepted: QBER in [12, 25], WARNING with p = 0.7 else ALERT.
/// Clean: QBER in [1, 8], SECURE with p = 0.9 else CHECK.
pub fn synthesize_timeline(
    intercept_detected: bool,
    rng: &mut RandomnessSource,
) -> Result<Vec<SecuritySample>> {
    let ((low, high), p_primary, primary, fallback) = if intercept_detected {
        ((12.0, 25.0), 0.7, SampleStatus::Warning, SampleStatus::Alert)
    } else {
        ((1.0, 8.0), 0.9, SampleStatus::Secure, SampleStatus::Check)
    };

    (0..TIMELINE_LENGTH)
        .map(|_| -> Result<SecuritySample> {
            let qber = rng.uniform(low, high)?;
            let status = if rng.chance(p_primary)? {
                primary
            } else {
                fallback
            };
            Ok(SecuritySample { qber, status })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_timeline() {
        let mut rng = RandomnessSource::from_seed(21);
        let timeline = synthesize_timeline(false, &mut rng).unwrap();

        assert_eq!(timeline.len(), TIMELINE_LENGTH);
        for s in &timeline {
            assert!((1.0..=8.0).contains(&s.qber));
            assert!(matches!(s.status, SampleStatus::Secure | SampleStatus::Check));
        }
    }

    #[test]
    fn test_intercepted_timeline() {
        let mut rng = RandomnessSource::from_seed(22);
        let timeline = synthesize_timeline(true, &mut rng).unwrap();

        assert_eq!(timeline.len(), TIMELINE_LENGTH);
        for s in &timeline {
            assert!((12.0..=25.0).contains(&s.qber));
            assert!(matches!(s.status, SampleStatus::Warning | SampleStatus::Alert));
        }
    }

    #[test]
    fn test_status_mix_follows_probability() {
        let mut rng = RandomnessSource::from_seed(23);
        let mut warnings = 0;
        let runs = 200;
        for _ in 0..runs {
            warnings += synthesize_timeline(true, &mut rng)
                .unwrap()
                .iter()
                .filter(|s| s.status == SampleStatus::Warning)
                .count();
        }
        let ratio = warnings as f64 / (runs * TIMELINE_LENGTH) as f64;
        assert!((0.65..0.75).contains(&ratio), "ratio={}", ratio);
    }
}
