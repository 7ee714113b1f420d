//! Playback configuration: item counts and pacing.

use std::time::Duration;

/// Delays between playback items.
///
/// These are presentation concerns only; the numeric result never waits on
/// them.
#[derive(Debug, Clone, PartialEq)]
pub struct PacingConfig {
    /// One flight frame of a photon
    pub photon_frame: Duration,

    /// Pause after each photon lands
    pub photon_gap: Duration,

    /// MEASUREMENT pause
    pub measurement: Duration,

    /// One frame of a classical packet
    pub packet_frame: Duration,

    /// Pause after each classical packet
    pub packet_gap: Duration,

    /// ERROR_CHECK pause
    pub error_check: Duration,

    /// One frame of an encrypted data packet
    pub data_frame: Duration,

    /// Delay per progress step
    pub progress_step: Duration,

    /// Hold on "Completed!" before results are shown
    pub progress_done: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            photon_frame: Duration::from_millis(30),
            photon_gap: Duration::from_millis(300),
            measurement: Duration::from_millis(1500),
            packet_frame: Duration::from_millis(30),
            packet_gap: Duration::from_millis(100),
            error_check: Duration::from_millis(1500),
            data_frame: Duration::from_millis(40),
            progress_step: Duration::from_millis(300),
            progress_done: Duration::from_millis(500),
        }
    }
}

impl PacingConfig {
    /// No delays at all.
    pub fn instant() -> Self {
        Self {
            photon_frame: Duration::ZERO,
            photon_gap: Duration::ZERO,
            measurement: Duration::ZERO,
            packet_frame: Duration::ZERO,
            packet_gap: Duration::ZERO,
            error_check: Duration::ZERO,
            data_frame: Duration::ZERO,
            progress_step: Duration::ZERO,
            progress_done: Duration::ZERO,
        }
    }
}

/// Configuration for a protocol playback.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackConfig {
    /// Photons shown during DISTRIBUTION (default: 20)
    pub total_photons: usize,

    /// Flight frames per photon (default: 20)
    pub photon_frames: usize,

    /// Classical packets during RECONCILIATION (default: 15)
    pub reconciliation_packets: usize,

    /// Frames per classical packet (default: 10)
    pub packet_frames: usize,

    /// Encrypted packets after KEY_ESTABLISHED (default: 10)
    pub data_packets: usize,

    /// Frames per data packet (default: 15)
    pub data_packet_frames: usize,

    /// Slices of the MEASUREMENT and ERROR_CHECK pauses (default: 15)
    pub hold_frames: usize,

    /// Delays
    pub pacing: PacingConfig,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            total_photons: 20,
            photon_frames: 20,
            reconciliation_packets: 15,
            packet_frames: 10,
            data_packets: 10,
            data_packet_frames: 15,
            hold_frames: 15,
            pacing: PacingConfig::default(),
        }
    }
}

impl PlaybackConfig {
    /// Sets the pacing.
    pub fn with_pacing(mut self, pacing: PacingConfig) -> Self {
        self.pacing = pacing;
        self
    }

    /// Default counts with no delays.
    pub fn instant() -> Self {
        Self::default().with_pacing(PacingConfig::instant())
    }
}
