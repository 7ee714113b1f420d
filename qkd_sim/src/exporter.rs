//! JSON exporter for finished sessions.
//!
//! Captures everything needed to inspect or replay a run offline.

use crate::phase::{PhaseEvent, PlaybackOutcome};
use crate::runner::Session;
use qkd_core::{ProgressStep, SimulationRequest, SimulationResult};
use qkd_env::RunId;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Complete session export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionExport {
    /// Run identity
    pub run_id: RunId,

    /// Seed used (replays the run with `--seed`)
    pub seed: u64,

    /// Session start, milliseconds since the Unix epoch
    pub started_at: u64,

    pub request: SimulationRequest,

    /// Progress reports, in order
    pub progress: Vec<ProgressStep>,

    pub result: SimulationResult,

    /// Recorded playback events
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub events: Vec<PhaseEvent>,

    /// Playback outcome, absent when playback was skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<PlaybackOutcome>,
}

impl SessionExport {
    /// Creates an export from a prepared session.
    pub fn new(session: &Session) -> Self {
        Self {
            run_id: session.run_id,
            seed: session.seed,
            started_at: session.started_at,
            request: session.request.clone(),
            progress: session.progress.clone(),
            result: session.result.clone(),
            events: Vec::new(),
            outcome: None,
        }
    }

    /// Adds an event.
    pub fn add_event(&mut self, event: PhaseEvent) {
        self.events.push(event);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, outcome: Option<PlaybackOutcome>) {
        self.outcome = outcome;
    }

    /// Serializes to pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaybackConfig;
    use crate::context::SimContext;
    use crate::phase::Phase;
    use crate::runner::SessionRunner;
    use qkd_core::SimulationConfig;

    async fn session() -> Session {
        SessionRunner::new(
            SimContext::shared(42),
            SimulationConfig::default().with_seed(42),
            PlaybackConfig::instant(),
        )
        .prepare(SimulationRequest::new("Hello Quantum World!", false), |_| {})
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_export_json_shape() {
        let session = session().await;
        let mut export = SessionExport::new(&session);
        export.add_event(PhaseEvent::PhaseEntered {
            phase: Phase::Distribution,
        });
        export.finalize(Some(PlaybackOutcome::Completed {
            terminal: Phase::KeyEstablished,
        }));

        let json: serde_json::Value = serde_json::from_str(&export.to_json().unwrap()).unwrap();
        assert_eq!(json["seed"], 42);
        assert_eq!(json["started_at"], 1_704_067_200_000u64);
        assert_eq!(json["request"]["simulateInterception"], false);
        assert_eq!(json["progress"].as_array().unwrap().len(), 14);
        assert_eq!(json["result"]["securityStatus"], "SECURE");
        assert_eq!(json["events"][0]["type"], "PHASE_ENTERED");
        assert_eq!(json["outcome"]["outcome"], "COMPLETED");
        assert_eq!(json["outcome"]["terminal"], "KEY_ESTABLISHED");
    }

    #[tokio::test]
    async fn test_skipped_playback_omits_events() {
        let export = SessionExport::new(&session().await);
        let json: serde_json::Value = serde_json::from_str(&export.to_json().unwrap()).unwrap();
        assert!(json.get("events").is_none());
        assert!(json.get("outcome").is_none());
    }

    #[tokio::test]
    async fn test_write_and_read_back() {
        let session = session().await;
        let export = SessionExport::new(&session);
        let path = std::env::temp_dir().join(format!("qkd-export-{}.json", session.run_id));

        export.write_to_file(&path).unwrap();
        let read: SessionExport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(read.result.final_key, session.result.final_key);
        assert_eq!(read.result.encrypted_message_hex, session.result.encrypted_message_hex);
        assert_eq!(read.run_id, session.run_id);
        assert_eq!(read.progress.len(), session.progress.len());
        assert_eq!(read.progress[13].label, "Completed!");
    }
}
