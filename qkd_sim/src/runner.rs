//! Session and scenario runners.
//!
//! A session has two halves:
//! 1. [`SessionRunner::prepare`] reports the progress steps and runs the
//!    numeric pipeline. This half is synchronous in effect and cannot be
//!    cancelled; it either produces a [`Session`] or fails validation.
//! 2. [`SessionRunner::play`] spawns the [`ProtocolDriver`] as a background
//!    task and returns a [`PlaybackHandle`] with start/cancel/await semantics.
//!
//! [`ScenarioRunner`] strings both halves together for the canned scenarios
//! and checks their assertions.

use crate::config::PlaybackConfig;
use crate::driver::{CancelAfterPhotons, EventSink, ProtocolDriver};
use crate::error::SessionError;
use crate::phase::{Phase, PhaseEvent, PlaybackInput, PlaybackOutcome, StopReason};
use crate::scenarios::ScenarioId;

use qkd_core::{
    ChannelSecurity, ProgressStep, ProgressSteps, QkdError, QkdPipeline, RandomnessSource,
    SecurityStatus, SimulationConfig, SimulationRequest, SimulationResult,
};
use qkd_env::{CancelToken, EnvError, QkdContext, RunId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Stream id used to derive the playback's randomness from the run seed.
pub const PLAYBACK_STREAM: u64 = 1;

/// Message used by the canned scenarios.
pub const SCENARIO_MESSAGE: &str = "Hello Quantum World!";

/// Photon after which the stopped-playback scenario cancels.
pub const SCENARIO_STOP_AFTER: usize = 5;

/// Handle to a playback running on the tokio runtime.
pub struct PlaybackHandle {
    cancel: CancelToken,
    task: JoinHandle<PlaybackOutcome>,
}

impl PlaybackHandle {
    /// Spawns `driver` and returns its handle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<Ctx, S>(driver: ProtocolDriver<Ctx>, input: PlaybackInput, mut sink: S) -> Self
    where
        Ctx: QkdContext,
        S: EventSink + 'static,
    {
        let cancel = driver.cancel_token();
        let task = tokio::spawn(async move { driver.run(input, &mut sink).await });
        Self { cancel, task }
    }

    /// Requests a stop. The driver halts at its next checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token shared with the running driver.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Waits for the playback to end.
    pub async fn wait(self) -> Result<PlaybackOutcome, EnvError> {
        self.task
            .await
            .map_err(|e| EnvError::task(format!("playback task failed: {}", e)))
    }
}

/// A prepared run: identity, progress and the numeric result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub run_id: RunId,
    pub seed: u64,

    /// Wall-clock start in milliseconds since the Unix epoch
    pub started_at: u64,

    pub request: SimulationRequest,
    pub progress: Vec<ProgressStep>,
    pub result: SimulationResult,
}

impl Session {
    /// Playback input for this session.
    pub fn playback_input(&self) -> PlaybackInput {
        PlaybackInput::from_result(&self.result, self.request.simulate_interception)
    }
}

/// Runs sessions against a context.
pub struct SessionRunner<Ctx: QkdContext> {
    context: Arc<Ctx>,
    simulation: SimulationConfig,
    playback: PlaybackConfig,

    /// Cancel token of the most recently started playback
    active: Option<CancelToken>,
}

impl<Ctx: QkdContext> SessionRunner<Ctx> {
    /// Creates a runner.
    pub fn new(context: Arc<Ctx>, simulation: SimulationConfig, playback: PlaybackConfig) -> Self {
        Self {
            context,
            simulation,
            playback,
            active: None,
        }
    }

    pub fn simulation_config(&self) -> &SimulationConfig {
        &self.simulation
    }

    pub fn playback_config(&self) -> &PlaybackConfig {
        &self.playback
    }

    /// Reports progress and runs the numeric pipeline.
    ///
    /// The request and configuration are validated before anything is
    /// reported, so a rejected run leaves no partial state behind.
    pub async fn prepare<F>(
        &self,
        request: SimulationRequest,
        mut on_progress: F,
    ) -> Result<Session, SessionError>
    where
        F: FnMut(&ProgressStep),
    {
        request.validate()?;
        self.simulation.validate()?;

        let mut rng = self.simulation.randomness();
        let seed = rng.seed();
        let run_id = match self.simulation.seed {
            Some(seed) => RunId::from_seed(seed),
            None => RunId::new(),
        };
        let started_at = self
            .context
            .system_time()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        info!("[{}] Session started (seed={})", run_id, seed);

        let pacing = &self.playback.pacing;
        let mut progress = Vec::with_capacity(ProgressSteps::total() + 1);
        for step in ProgressSteps::new() {
            debug!("[{}] {:>3.0}% {}", run_id, step.percent, step.label);
            on_progress(&step);
            progress.push(step);
            self.context.sleep(pacing.progress_step).await;
        }

        let result = QkdPipeline::new(self.simulation.clone()).run_with(&request, &mut rng)?;

        let done = ProgressSteps::completed();
        on_progress(&done);
        progress.push(done);
        self.context.sleep(pacing.progress_done).await;

        Ok(Session {
            run_id,
            seed,
            started_at,
            request,
            progress,
            result,
        })
    }

    /// Creates the driver for a session without starting it.
    pub fn driver(&self, session: &Session) -> ProtocolDriver<Ctx> {
        let rng = RandomnessSource::from_seed(session.seed).derive(PLAYBACK_STREAM);
        ProtocolDriver::new(self.context.clone(), self.playback.clone(), rng)
    }

    /// Starts the playback for a session in the background.
    ///
    /// Any playback this runner started before is stopped first.
    pub fn play<S: EventSink + 'static>(&mut self, session: &Session, sink: S) -> PlaybackHandle {
        self.play_stopping_after(session, sink, None)
    }

    /// Like [`play`](Self::play), but requests a stop once `photons` photon
    /// events have been delivered.
    pub fn play_stopping_after<S: EventSink + 'static>(
        &mut self,
        session: &Session,
        sink: S,
        photons: Option<usize>,
    ) -> PlaybackHandle {
        if let Some(previous) = self.active.take() {
            previous.cancel();
        }
        let driver = self.driver(session);
        let token = driver.cancel_token();
        self.active = Some(token.clone());
        info!("[{}] Playback started", session.run_id);

        let input = session.playback_input();
        match photons {
            Some(limit) => {
                PlaybackHandle::start(driver, input, CancelAfterPhotons::new(sink, limit, token))
            }
            None => PlaybackHandle::start(driver, input, sink),
        }
    }

    /// Stops the current playback, if any.
    pub fn stop(&mut self) {
        if let Some(token) = self.active.take() {
            token.cancel();
        }
        info!("Simulation stopped");
    }
}

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// How the playback ended, when one ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<PlaybackOutcome>,

    /// Events recorded during playback
    pub event_count: usize,

    /// Failure message if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// Runs the canned scenarios.
pub struct ScenarioRunner<Ctx: QkdContext> {
    context: Arc<Ctx>,
    seed: u64,
    playback: PlaybackConfig,
}

impl<Ctx: QkdContext> ScenarioRunner<Ctx> {
    /// Creates a scenario runner.
    pub fn new(context: Arc<Ctx>, seed: u64) -> Self {
        Self {
            context,
            seed,
            playback: PlaybackConfig::default(),
        }
    }

    /// Sets the playback configuration.
    pub fn with_playback(mut self, playback: PlaybackConfig) -> Self {
        self.playback = playback;
        self
    }

    fn session_runner(&self) -> SessionRunner<Ctx> {
        SessionRunner::new(
            self.context.clone(),
            SimulationConfig::default().with_seed(self.seed),
            self.playback.clone(),
        )
    }

    /// Runs a scenario and returns the result.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let checked = match scenario {
            ScenarioId::SecureChannel => self.run_channel(false).await,
            ScenarioId::Interception => self.run_channel(true).await,
            ScenarioId::StoppedPlayback => self.run_stopped_playback().await,
            ScenarioId::EmptyMessage => self.run_empty_message().await,
        };

        match checked {
            Ok((outcome, event_count)) => ScenarioResult {
                scenario,
                seed: self.seed,
                passed: true,
                outcome,
                event_count,
                failure_reason: None,
            },
            Err(reason) => {
                warn!("Scenario {} failed: {}", scenario.name(), reason);
                ScenarioResult {
                    scenario,
                    seed: self.seed,
                    passed: false,
                    outcome: None,
                    event_count: 0,
                    failure_reason: Some(reason),
                }
            }
        }
    }

    /// Scenarios A and B: full run with or without Eve.
    async fn run_channel(
        &self,
        intercept: bool,
    ) -> Result<(Option<PlaybackOutcome>, usize), String> {
        let mut runner = self.session_runner();
        let session = runner
            .prepare(SimulationRequest::new(SCENARIO_MESSAGE, intercept), |_| {})
            .await
            .map_err(|e| e.to_string())?;
        let result = &session.result;

        check(
            result.decrypted_message == SCENARIO_MESSAGE,
            "decrypted message differs from original",
        )?;
        check(result.final_key_size >= 16, "final key shorter than 16 bits")?;
        check(result.security_timeline.len() == 20, "timeline is not 20 samples")?;

        let expected_terminal = if intercept {
            check(result.intercept_detected, "interception not detected")?;
            check(
                result.security_status == SecurityStatus::Compromised,
                "status should be COMPROMISED",
            )?;
            check(
                result.channel_security == ChannelSecurity::Insecure,
                "channel should be INSECURE",
            )?;
            check(
                (15.0..=25.0).contains(&result.qber),
                format!("qber {:.2} outside [15, 25]", result.qber),
            )?;
            Phase::Aborted
        } else {
            check(!result.intercept_detected, "false interception alarm")?;
            check(
                result.security_status == SecurityStatus::Secure,
                "status should be SECURE",
            )?;
            check(
                (2.0..=8.0).contains(&result.qber),
                format!("qber {:.2} outside [2, 8]", result.qber),
            )?;
            Phase::KeyEstablished
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = runner.play(&session, tx);
        let mut event_count = 0;
        while rx.recv().await.is_some() {
            event_count += 1;
        }
        let outcome = handle.wait().await.map_err(|e| e.to_string())?;
        check(
            outcome
                == PlaybackOutcome::Completed {
                    terminal: expected_terminal,
                },
            format!("playback ended as {:?}", outcome),
        )?;

        Ok((Some(outcome), event_count))
    }

    /// Scenario C: stop after the fifth photon.
    async fn run_stopped_playback(&self) -> Result<(Option<PlaybackOutcome>, usize), String> {
        let runner = self.session_runner();
        let request = SimulationRequest::new(SCENARIO_MESSAGE, false);
        let session = runner
            .prepare(request.clone(), |_| {})
            .await
            .map_err(|e| e.to_string())?;

        let driver = runner.driver(&session);
        let mut sink = CancelAfterPhotons::new(Vec::new(), SCENARIO_STOP_AFTER, driver.cancel_token());
        let outcome = driver.run(session.playback_input(), &mut sink).await;
        let events = sink.into_inner();

        check(
            outcome
                == PlaybackOutcome::Stopped {
                    phase: Phase::Distribution,
                    reason: StopReason::Cancelled,
                },
            format!("playback ended as {:?}", outcome),
        )?;

        let photons = events
            .iter()
            .filter(|e| matches!(e, PhaseEvent::Photon(_)))
            .count();
        check(
            photons == SCENARIO_STOP_AFTER,
            format!("{} photon events after stop", photons),
        )?;
        check(
            !events.iter().any(|e| matches!(
                e,
                PhaseEvent::PhaseEntered { phase } if *phase != Phase::Distribution
            )),
            "entered a phase after DISTRIBUTION",
        )?;

        let replay = QkdPipeline::new(runner.simulation_config().clone())
            .run(&request)
            .map_err(|e| e.to_string())?;
        check(replay == session.result, "numeric result changed")?;

        Ok((Some(outcome), events.len()))
    }

    /// Empty message is rejected before any progress is reported.
    async fn run_empty_message(&self) -> Result<(Option<PlaybackOutcome>, usize), String> {
        let runner = self.session_runner();
        let mut reported = 0usize;
        let prepared = runner
            .prepare(SimulationRequest::new("", false), |_| reported += 1)
            .await;

        match prepared {
            Err(SessionError::Simulation(QkdError::EmptyMessage)) => {
                check(reported == 0, "progress reported for a rejected request")?;
                Ok((None, 0))
            }
            Err(e) => Err(format!("unexpected error: {}", e)),
            Ok(_) => Err("empty message was accepted".to_string()),
        }
    }
}

fn check(condition: bool, reason: impl Into<String>) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(reason.into())
    }
}
