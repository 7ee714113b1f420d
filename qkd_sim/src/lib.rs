//! Satellite QKD simulator: playback, sessions and scenarios
//!
//! This crate runs the numeric BB84 pipeline from `qkd_core` and plays the
//! protocol back phase by phase so a terminal (or any other consumer) can
//! animate it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        SessionRunner                         │
//! │                                                              │
//! │  prepare():  progress steps ──► QkdPipeline ──► Session      │
//! │                                                   │          │
//! │  play():                                          ▼          │
//! │  ┌─────────────────────────────┐   PhaseEvent  ┌─────────┐   │
//! │  │ ProtocolDriver (tokio task) │──────────────►│EventSink│   │
//! │  │   paced by QkdContext       │               └─────────┘   │
//! │  └──────────────▲──────────────┘                             │
//! │                 │ CancelToken                                │
//! │          PlaybackHandle                                      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pacing goes through [`qkd_env::QkdContext`]: [`SimContext`] advances a
//! virtual clock so tests and `--instant` runs finish immediately, while
//! [`qkd_env::TokioContext`] sleeps on the wall clock.
//!
//! # Usage
//!
//! ```ignore
//! use qkd_sim::{PlaybackConfig, SessionRunner, SimContext};
//! use qkd_core::{SimulationConfig, SimulationRequest};
//!
//! let mut runner = SessionRunner::new(
//!     SimContext::shared(42),
//!     SimulationConfig::default().with_seed(42),
//!     PlaybackConfig::instant(),
//! );
//! let session = runner
//!     .prepare(SimulationRequest::new("Hello Quantum World!", false), |_| {})
//!     .await?;
//! let outcome = runner.play(&session, Vec::new()).wait().await?;
//! ```

mod context;
pub mod config;
pub mod driver;
pub mod error;
pub mod exporter;
pub mod phase;
pub mod report;
pub mod runner;
pub mod scenarios;

pub use config::{PacingConfig, PlaybackConfig};
pub use context::SimContext;
pub use driver::{CancelAfterPhotons, EventSink, ProtocolDriver};
pub use error::SessionError;
pub use exporter::SessionExport;
pub use phase::{
    Phase, PhaseEvent, PhotonEvent, PlaybackInput, PlaybackOutcome, Polarization, StopReason,
};
pub use runner::{PlaybackHandle, ScenarioResult, ScenarioRunner, Session, SessionRunner};
pub use scenarios::ScenarioId;
