//! Bit and basis sequences, and the generator that draws them.
//!
//! Sequences are built once by [`generate_sequences`] (or parsed) and are
//! read-only afterwards.

use crate::error::{QkdError, Result};
use crate::randomness::RandomnessSource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default number of photons per run.
pub const DEFAULT_SEQUENCE_LENGTH: usize = 1024;

/// Measurement orientation chosen per photon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Basis {
    /// H/V polarization
    Rectilinear,
    /// D/A polarization
    Diagonal,
}

impl Basis {
    /// Single-character rendering used in basis strings.
    pub fn symbol(self) -> char {
        match self {
            Basis::Rectilinear => '0',
            Basis::Diagonal => '1',
        }
    }

    /// Human readable label.
    pub fn label(self) -> &'static str {
        match self {
            Basis::Rectilinear => "Rectilinear (H/V)",
            Basis::Diagonal => "Diagonal (D/A)",
        }
    }
}

/// A single classical bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bit {
    Zero,
    One,
}

impl Bit {
    /// Numeric value (0 or 1).
    pub fn value(self) -> u8 {
        match self {
            Bit::Zero => 0,
            Bit::One => 1,
        }
    }

    /// Character rendering.
    pub fn symbol(self) -> char {
        match self {
            Bit::Zero => '0',
            Bit::One => '1',
        }
    }

    fn from_symbol(c: char) -> Result<Self> {
        match c {
            '0' => Ok(Bit::Zero),
            '1' => Ok(Bit::One),
            other => Err(QkdError::InvalidBit(other)),
        }
    }
}

/// Ordered, immutable sequence of bits.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BitSequence(Vec<Bit>);

impl BitSequence {
    /// Draws `length` uniform bits.
    pub fn random(length: usize, rng: &mut RandomnessSource) -> Self {
        Self((0..length).map(|_| rng.bit()).collect())
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the sequence holds no bits.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bit at `index`.
    pub fn get(&self, index: usize) -> Option<Bit> {
        self.0.get(index).copied()
    }

    /// Borrowed view of the bits.
    pub fn as_slice(&self) -> &[Bit] {
        &self.0
    }

    /// Iterates over the bits in order.
    pub fn iter(&self) -> impl Iterator<Item = Bit> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Bit> for BitSequence {
    fn from_iter<I: IntoIterator<Item = Bit>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl FromStr for BitSequence {
    type Err = QkdError;

    fn from_str(s: &str) -> Result<Self> {
        s.chars().map(Bit::from_symbol).collect::<Result<Vec<_>>>().map(Self)
    }
}

impl fmt::Display for BitSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: String = self.0.iter().map(|b| b.symbol()).collect();
        f.write_str(&rendered)
    }
}

/// Ordered, immutable sequence of basis choices.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BasisSequence(Vec<Basis>);

impl BasisSequence {
    /// Draws `length` uniform basis labels.
    pub fn random(length: usize, rng: &mut RandomnessSource) -> Self {
        Self((0..length).map(|_| rng.basis()).collect())
    }

    /// Number of basis choices.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Basis at `index`.
    pub fn get(&self, index: usize) -> Option<Basis> {
        self.0.get(index).copied()
    }

    /// Iterates over the basis choices in order.
    pub fn iter(&self) -> impl Iterator<Item = Basis> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Basis> for BasisSequence {
    fn from_iter<I: IntoIterator<Item = Basis>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for BasisSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: String = self.0.iter().map(|b| b.symbol()).collect();
        f.write_str(&rendered)
    }
}

/// Output of the sequence generator: both parties' bases and the raw bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantumSequences {
    pub alice_bases: BasisSequence,
    pub bob_bases: BasisSequence,
    pub raw_bits: BitSequence,
}

impl QuantumSequences {
    /// Shared length of all three sequences.
    pub fn len(&self) -> usize {
        self.raw_bits.len()
    }

    /// Never true for generated sequences.
    pub fn is_empty(&self) -> bool {
        self.raw_bits.is_empty()
    }
}

/// Draws Alice's bases, Bob's bases and the raw bits, in that order.
pub fn generate_sequences(length: usize, rng: &mut RandomnessSource) -> Result<QuantumSequences> {
    if length == 0 {
        return Err(QkdError::InvalidSequenceLength(length));
    }

    let alice_bases = BasisSequence::random(length, rng);
    let bob_bases = BasisSequence::random(length, rng);
    let raw_bits = BitSequence::random(length, rng);

    Ok(QuantumSequences {
        alice_bases,
        bob_bases,
        raw_bits,
    })
}
