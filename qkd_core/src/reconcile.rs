//! Basis reconciliation (sifting).
//!
//! Alice and Bob publish their basis choices over the classical channel and
//! keep only the positions where they agree.

use crate::error::{QkdError, Result};
use crate::sequence::{BasisSequence, BitSequence};

/// Outcome of sifting.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationResult {
    /// Ascending indices where both bases agree
    pub matching_indices: Vec<usize>,

    /// Raw bits at `matching_indices`, same order
    pub raw_key: BitSequence,

    /// `matching_indices.len()`
    pub matching_count: usize,

    /// `matching_count / N * 100`
    pub matching_percentage: f64,
}

/// Compares basis sequences and extracts the raw key.
pub fn reconcile(
    alice_bases: &BasisSequence,
    bob_bases: &BasisSequence,
    raw_bits: &BitSequence,
) -> Result<ReconciliationResult> {
    let n = raw_bits.len();
    if alice_bases.len() != n || bob_bases.len() != n {
        return Err(QkdError::LengthMismatch {
            alice: alice_bases.len(),
            bob: bob_bases.len(),
            bits: n,
        });
    }

    let matching_indices: Vec<usize> = alice_bases
        .iter()
        .zip(bob_bases.iter())
        .enumerate()
        .filter(|(_, (a, b))| a == b)
        .map(|(i, _)| i)
        .collect();

    let raw_key: BitSequence = matching_indices
        .iter()
        .filter_map(|&i| raw_bits.get(i))
        .collect();

    let matching_count = matching_indices.len();
    let matching_percentage = if n == 0 {
        0.0
    } else {
        matching_count as f64 / n as f64 * 100.0
    };

    Ok(ReconciliationResult {
        matching_indices,
        raw_key,
        matching_count,
        matching_percentage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::randomness::RandomnessSource;
    use crate::sequence::{generate_sequences, Basis};
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn bases(s: &str) -> BasisSequence {
        s.chars()
            .map(|c| if c == '0' { Basis::Rectilinear } else { Basis::Diagonal })
            .collect()
    }

    #[test]
    fn test_known_sifting() {
        let alice = bases("0101");
        let bob = bases("0011");
        let bits: BitSequence = "1100".parse().unwrap();

        let result = reconcile(&alice, &bob, &bits).unwrap();
        assert_eq!(result.matching_indices, vec![0, 3]);
        assert_eq!(result.raw_key.to_string(), "10");
        assert_eq!(result.matching_count, 2);
        assert_relative_eq!(result.matching_percentage, 50.0);
    }

    #[test]
    fn test_length_mismatch() {
        let alice = bases("01");
        let bob = bases("011");
        let bits: BitSequence = "11".parse().unwrap();

        assert_eq!(
            reconcile(&alice, &bob, &bits),
            Err(QkdError::LengthMismatch { alice: 2, bob: 3, bits: 2 })
        );
    }

    #[test]
    fn test_no_agreement_gives_empty_key() {
        let result = reconcile(&bases("000"), &bases("111"), &"101".parse().unwrap()).unwrap();
        assert!(result.raw_key.is_empty());
        assert_eq!(result.matching_count, 0);
        assert_relative_eq!(result.matching_percentage, 0.0);
    }

    proptest! {
        #[test]
        fn prop_matching_count_is_agreement_count(seed in any::<u64>(), n in 1usize..512) {
            let mut rng = RandomnessSource::from_seed(seed);
            let seqs = generate_sequences(n, &mut rng).unwrap();
            let result = reconcile(&seqs.alice_bases, &seqs.bob_bases, &seqs.raw_bits).unwrap();

            let expected = (0..n)
                .filter(|&i| seqs.alice_bases.get(i) == seqs.bob_bases.get(i))
                .count();
            prop_assert_eq!(result.matching_count, expected);
            prop_assert_eq!(result.raw_key.len(), result.matching_count);
            prop_assert!(result.matching_indices.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
