//! Simulated error correction and privacy amplification.
//!
//! Neither step is actually run. Their cost is modeled as a fixed share of
//! the raw key length, and the final key is drawn fresh at the reduced
//! length. The final key is therefore *sized* by the sifted key but not
//! derived from its bits; this is a known approximation of the model.

use crate::randomness::RandomnessSource;
use crate::sequence::BitSequence;
use serde::{Deserialize, Serialize};

/// Share of the raw key spent on error correction.
pub const ERROR_CORRECTION_RATIO: f64 = 0.2;

/// Share of the raw key spent on privacy amplification.
pub const PRIVACY_AMPLIFICATION_RATIO: f64 = 0.1;

/// Final keys never drop below this many bits.
pub const MIN_FINAL_KEY_BITS: usize = 16;

/// Length bookkeeping for one reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyReduction {
    pub raw_length: usize,
    pub error_correction_loss: usize,
    pub privacy_amplification_loss: usize,
    pub final_length: usize,
}

impl KeyReduction {
    /// Computes the reduction for a raw key of `raw_length` bits.
    pub fn plan(raw_length: usize) -> Self {
        let error_correction_loss = (raw_length as f64 * ERROR_CORRECTION_RATIO).floor() as usize;
        let privacy_amplification_loss =
            (raw_length as f64 * PRIVACY_AMPLIFICATION_RATIO).floor() as usize;

        let remaining = raw_length
            .saturating_sub(error_correction_loss)
            .saturating_sub(privacy_amplification_loss);

        Self {
            raw_length,
            error_correction_loss,
            privacy_amplification_loss,
            final_length: remaining.max(MIN_FINAL_KEY_BITS),
        }
    }
}

/// Final key with the bookkeeping that sized it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedKey {
    pub reduction: KeyReduction,
    pub final_key: BitSequence,
}

/// Shrinks `raw_key` and draws the final key material.
pub fn reduce_key(raw_key: &BitSequence, rng: &mut RandomnessSource) -> ReducedKey {
    let reduction = KeyReduction::plan(raw_key.len());
    let final_key = BitSequence::random(reduction.final_length, rng);

    ReducedKey {
        reduction,
        final_key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_plan_typical_run() {
        // 512 sifted bits: 102 + 51 lost
        let r = KeyReduction::plan(512);
        assert_eq!(r.error_correction_loss, 102);
        assert_eq!(r.privacy_amplification_loss, 51);
        assert_eq!(r.final_length, 359);
    }

    #[test]
    fn test_plan_floors_at_minimum() {
        assert_eq!(KeyReduction::plan(0).final_length, MIN_FINAL_KEY_BITS);
        assert_eq!(KeyReduction::plan(10).final_length, MIN_FINAL_KEY_BITS);
        // 23 - 4 - 2 = 17 stays above the floor
        assert_eq!(KeyReduction::plan(23).final_length, 17);
    }

    #[test]
    fn test_final_key_is_fresh_material() {
        let raw: BitSequence = "1".repeat(400).parse().unwrap();
        let mut rng = RandomnessSource::from_seed(77);
        let reduced = reduce_key(&raw, &mut rng);

        assert_eq!(reduced.final_key.len(), reduced.reduction.final_length);
        // All-ones input would survive any bit-preserving transform
        assert!(reduced.final_key.to_string().contains('0'));
    }

    proptest! {
        #[test]
        fn prop_final_length_floor(raw_len in 0usize..4096) {
            let r = KeyReduction::plan(raw_len);
            prop_assert!(r.final_length >= MIN_FINAL_KEY_BITS);
            prop_assert!(r.final_length <= raw_len.max(MIN_FINAL_KEY_BITS));
        }
    }
}
