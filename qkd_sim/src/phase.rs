//! Protocol phases and the events a playback emits.

use qkd_core::{Basis, Bit, SimulationResult};
use serde::{Deserialize, Serialize};

/// Abort decision threshold for the playback's terminal phase (percent).
///
/// Independent from the 11% detection cutoff used by the QBER model.
pub const ABORT_QBER_THRESHOLD: f64 = 10.0;

/// Protocol phases, in playback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Distribution,
    Measurement,
    Reconciliation,
    ErrorCheck,
    KeyEstablished,
    Aborted,
}

impl Phase {
    /// Returns the following phase, or `None` from a terminal phase.
    ///
    /// `key_accepted` only matters when leaving ERROR_CHECK.
    pub fn next(self, key_accepted: bool) -> Option<Phase> {
        match self {
            Phase::Distribution => Some(Phase::Measurement),
            Phase::Measurement => Some(Phase::Reconciliation),
            Phase::Reconciliation => Some(Phase::ErrorCheck),
            Phase::ErrorCheck if key_accepted => Some(Phase::KeyEstablished),
            Phase::ErrorCheck => Some(Phase::Aborted),
            Phase::KeyEstablished | Phase::Aborted => None,
        }
    }

    /// Caption for the phase.
    pub fn title(self) -> &'static str {
        match self {
            Phase::Distribution => "Phase 1: Quantum state distribution",
            Phase::Measurement => "Phase 2: Measurement & basis selection",
            Phase::Reconciliation => "Phase 3: Basis reconciliation",
            Phase::ErrorCheck => "Phase 4: Error detection & privacy amplification",
            Phase::KeyEstablished => "Phase 5: Secure key established",
            Phase::Aborted => "Phase 5: Key exchange aborted",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

/// Photon polarization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Polarization {
    Horizontal,
    Vertical,
    Diagonal,
    AntiDiagonal,
}

impl Polarization {
    pub const ALL: [Polarization; 4] = [
        Polarization::Horizontal,
        Polarization::Vertical,
        Polarization::Diagonal,
        Polarization::AntiDiagonal,
    ];

    /// State Alice prepares for a bit in a basis.
    pub fn encode(bit: Bit, basis: Basis) -> Self {
        match (basis, bit) {
            (Basis::Rectilinear, Bit::Zero) => Polarization::Horizontal,
            (Basis::Rectilinear, Bit::One) => Polarization::Vertical,
            (Basis::Diagonal, Bit::Zero) => Polarization::Diagonal,
            (Basis::Diagonal, Bit::One) => Polarization::AntiDiagonal,
        }
    }

    /// Display color.
    pub fn color(self) -> &'static str {
        match self {
            Polarization::Horizontal => "#3498DB",
            Polarization::Vertical => "#2980B9",
            Polarization::Diagonal => "#9B59B6",
            Polarization::AntiDiagonal => "#8E44AD",
        }
    }
}

/// Eve's relay on the satellite-to-Bob leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EveDetour {
    /// Basis Eve measured in
    pub eve_basis: Basis,

    /// Eve guessed wrong and resent a disturbed state
    pub perturbed: bool,
}

/// One photon pair sent from the satellite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotonEvent {
    /// Zero-based photon index
    pub index: usize,
    pub total: usize,

    pub alice_basis: Basis,
    pub alice_bit: Bit,
    pub bob_basis: Basis,

    /// Bob's bit, only revealed when the bases agree
    pub bob_bit: Option<Bit>,

    /// State leaving the satellite
    pub sent: Polarization,

    /// State arriving at Bob (differs from `sent` only after a perturbing detour)
    pub received: Polarization,

    /// Present when interception is enabled
    pub detour: Option<EveDetour>,
}

impl PhotonEvent {
    /// True when Alice's and Bob's bases agree.
    pub fn bases_match(&self) -> bool {
        self.alice_basis == self.bob_basis
    }
}

/// Direction of a classical-channel packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PacketDirection {
    AliceToBob,
    BobToAlice,
}

impl PacketDirection {
    /// Reconciliation traffic: every third packet goes Alice → Bob.
    pub fn for_packet(index: usize) -> Self {
        if index % 3 == 0 {
            PacketDirection::AliceToBob
        } else {
            PacketDirection::BobToAlice
        }
    }
}

/// Match/QBER summary shown during ERROR_CHECK.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorCheckSummary {
    /// Photons in the playback whose bases agreed
    pub matched_photons: usize,
    pub total_photons: usize,

    /// Sifting stats from the numeric result
    pub matching_bases: usize,
    pub matching_percentage: f64,

    pub qber: f64,
    pub qber_threshold: f64,
    pub above_threshold: bool,
}

impl ErrorCheckSummary {
    /// Percentage of playback photons with agreeing bases.
    pub fn photon_match_percentage(&self) -> f64 {
        if self.total_photons == 0 {
            0.0
        } else {
            self.matched_photons as f64 / self.total_photons as f64 * 100.0
        }
    }

    /// Status line in the style of the playback caption.
    pub fn status_line(&self) -> String {
        let verdict = if self.above_threshold {
            "Error rate above threshold!"
        } else {
            "Error rate acceptable"
        };
        format!(
            "Matching bases: {}/{} ({:.1}%) | Error rate: {:.1}% | {}",
            self.matched_photons,
            self.total_photons,
            self.photon_match_percentage(),
            self.qber,
            verdict
        )
    }
}

/// Event emitted by the protocol driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseEvent {
    /// A new phase started
    PhaseEntered { phase: Phase },

    /// DISTRIBUTION item
    Photon(PhotonEvent),

    /// RECONCILIATION item
    ClassicalPacket {
        index: usize,
        total: usize,
        direction: PacketDirection,
    },

    /// ERROR_CHECK verdict
    ErrorCheck(ErrorCheckSummary),

    /// KEY_ESTABLISHED item
    DataPacket { index: usize, total: usize },

    /// ABORTED notice
    BreachDetected { qber: f64 },

    /// Playback stopped before reaching a terminal phase
    Stopped { phase: Phase },
}

/// Why a playback stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopReason {
    /// Cancellation was requested
    Cancelled,
    /// Nobody is listening for events any more
    SinkClosed,
}

/// How a playback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackOutcome {
    /// Reached KEY_ESTABLISHED or ABORTED
    Completed { terminal: Phase },

    /// Stopped early; `phase` is the last phase entered (or about to be)
    Stopped { phase: Phase, reason: StopReason },
}

impl PlaybackOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, PlaybackOutcome::Completed { .. })
    }
}

/// The slice of a numeric result that the playback needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackInput {
    pub qber: f64,
    pub matching_bases: usize,
    pub matching_percentage: f64,
    pub simulate_interception: bool,
}

impl PlaybackInput {
    /// Extracts playback input from a finished result.
    pub fn from_result(result: &SimulationResult, simulate_interception: bool) -> Self {
        Self {
            qber: result.qber,
            matching_bases: result.matching_bases,
            matching_percentage: result.matching_percentage,
            simulate_interception,
        }
    }

    /// Terminal decision: accept the key iff QBER ≤ 10%.
    pub fn key_accepted(&self) -> bool {
        self.qber <= ABORT_QBER_THRESHOLD
    }
}
