//! Protocol playback driver.
//!
//! Walks the five BB84 phases for a result that has already been computed,
//! emitting one event per item so a renderer can animate it.
//!
//! # State machine
//!
//! ```text
//! DISTRIBUTION ──► MEASUREMENT ──► RECONCILIATION ──► ERROR_CHECK ─┬─► KEY_ESTABLISHED
//!                                                                   └─► ABORTED
//! ```
//!
//! Every phase boundary and every inner item (photon, flight frame, packet,
//! packet frame, pause slice) checks the [`CancelToken`] first. A stop request therefore
//! lands before the next item is emitted, never halfway through one.
//!
//! The driver draws its own photon bases and bits from a derived
//! [`RandomnessSource`]. Those draws are cosmetic: the authoritative QBER and
//! key come from the numeric pipeline via [`PlaybackInput`].

use crate::config::PlaybackConfig;
use crate::phase::{
    ErrorCheckSummary, EveDetour, PacketDirection, Phase, PhaseEvent, PhotonEvent,
    PlaybackInput, PlaybackOutcome, Polarization, StopReason, ABORT_QBER_THRESHOLD,
};
use qkd_core::RandomnessSource;
use qkd_env::{CancelToken, EnvError, QkdContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Consumer of playback events.
pub trait EventSink: Send {
    /// Delivers one event. An error means the consumer is gone.
    fn emit(&mut self, event: PhaseEvent) -> Result<(), EnvError>;
}

impl EventSink for mpsc::UnboundedSender<PhaseEvent> {
    fn emit(&mut self, event: PhaseEvent) -> Result<(), EnvError> {
        self.send(event)
            .map_err(|_| EnvError::sink_closed("playback channel"))
    }
}

impl EventSink for Vec<PhaseEvent> {
    fn emit(&mut self, event: PhaseEvent) -> Result<(), EnvError> {
        self.push(event);
        Ok(())
    }
}

/// Sink adapter that requests cancellation after N photon events.
///
/// A limit of zero cancels immediately, so no photon is delivered.
/// Used by the `--stop-after` CLI flag and the stopped-playback scenario.
pub struct CancelAfterPhotons<S> {
    inner: S,
    limit: usize,
    seen: usize,
    cancel: CancelToken,
}

impl<S: EventSink> CancelAfterPhotons<S> {
    pub fn new(inner: S, limit: usize, cancel: CancelToken) -> Self {
        if limit == 0 {
            cancel.cancel();
        }
        Self {
            inner,
            limit,
            seen: 0,
            cancel,
        }
    }

    /// Returns the wrapped sink.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: EventSink> EventSink for CancelAfterPhotons<S> {
    fn emit(&mut self, event: PhaseEvent) -> Result<(), EnvError> {
        let is_photon = matches!(event, PhaseEvent::Photon(_));
        self.inner.emit(event)?;
        if is_photon {
            self.seen += 1;
            if self.seen >= self.limit {
                self.cancel.cancel();
            }
        }
        Ok(())
    }
}

/// Internal early-exit signal.
type Step = Result<(), StopReason>;

/// Running tally of the DISTRIBUTION phase.
#[derive(Debug, Default)]
struct PhotonTally {
    sent: usize,
    matched: usize,
}

/// Drives one playback.
pub struct ProtocolDriver<Ctx: QkdContext> {
    context: Arc<Ctx>,
    config: PlaybackConfig,
    cancel: CancelToken,
    rng: RandomnessSource,
}

impl<Ctx: QkdContext> ProtocolDriver<Ctx> {
    /// Creates a driver.
    ///
    /// `rng` should be derived from the run's source so playback draws never
    /// shift the numeric result.
    pub fn new(context: Arc<Ctx>, config: PlaybackConfig, rng: RandomnessSource) -> Self {
        Self {
            context,
            config,
            cancel: CancelToken::new(),
            rng,
        }
    }

    /// Uses an existing token instead of a fresh one.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops this driver.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Plays all phases for `input`, or until cancelled.
    pub async fn run<S: EventSink + ?Sized>(
        mut self,
        input: PlaybackInput,
        sink: &mut S,
    ) -> PlaybackOutcome {
        info!("Animation started");
        let key_accepted = input.key_accepted();
        let mut tally = PhotonTally::default();
        let mut phase = Phase::Distribution;

        loop {
            if let Err(reason) = self.enter(phase, sink) {
                return self.stopped(phase, reason, sink);
            }

            let step = match phase {
                Phase::Distribution => self.distribute(&input, &mut tally, sink).await,
                Phase::Measurement => self.hold(self.config.pacing.measurement).await,
                Phase::Reconciliation => self.exchange_bases(sink).await,
                Phase::ErrorCheck => self.check_errors(&input, &tally, sink).await,
                Phase::KeyEstablished => self.transfer_data(sink).await,
                Phase::Aborted => emit(sink, PhaseEvent::BreachDetected { qber: input.qber }),
            };
            if let Err(reason) = step {
                return self.stopped(phase, reason, sink);
            }

            match phase.next(key_accepted) {
                Some(next) => phase = next,
                None => {
                    info!("Playback finished: {}", phase.title());
                    return PlaybackOutcome::Completed { terminal: phase };
                }
            }
        }
    }

    fn checkpoint(&self) -> Step {
        if self.cancel.is_cancelled() {
            Err(StopReason::Cancelled)
        } else {
            Ok(())
        }
    }

    fn enter<S: EventSink + ?Sized>(&self, phase: Phase, sink: &mut S) -> Step {
        self.checkpoint()?;
        debug!("{}", phase.title());
        emit(sink, PhaseEvent::PhaseEntered { phase })
    }

    async fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            self.context.sleep(duration).await;
        }
    }

    /// Animates `frames` frames, checking for cancellation before each.
    async fn animate(&self, frames: usize, frame: Duration) -> Step {
        for _ in 0..frames {
            self.checkpoint()?;
            self.pause(frame).await;
        }
        Ok(())
    }

    /// Waits out a phase pause in `hold_frames` slices.
    async fn hold(&self, total: Duration) -> Step {
        let frames = self.config.hold_frames.max(1);
        self.animate(frames, total / frames as u32).await
    }

    async fn distribute<S: EventSink + ?Sized>(
        &mut self,
        input: &PlaybackInput,
        tally: &mut PhotonTally,
        sink: &mut S,
    ) -> Step {
        let total = self.config.total_photons;
        for index in 0..total {
            self.checkpoint()?;

            let photon = self.prepare_photon(index, total, input.simulate_interception);
            tally.sent += 1;
            if photon.bases_match() {
                tally.matched += 1;
            }
            emit(sink, PhaseEvent::Photon(photon))?;

            self.animate(self.config.photon_frames, self.config.pacing.photon_frame)
                .await?;
            self.pause(self.config.pacing.photon_gap).await;
        }
        Ok(())
    }

    fn prepare_photon(&mut self, index: usize, total: usize, intercept: bool) -> PhotonEvent {
        let alice_basis = self.rng.basis();
        let bob_basis = self.rng.basis();
        let alice_bit = self.rng.bit();
        let sent = Polarization::encode(alice_bit, alice_basis);

        let (received, detour) = if intercept {
            let eve_basis = self.rng.basis();
            let perturbed = eve_basis != alice_basis;
            let received = if perturbed {
                self.rng
                    .choose(&Polarization::ALL)
                    .copied()
                    .unwrap_or(sent)
            } else {
                sent
            };
            (
                received,
                Some(EveDetour {
                    eve_basis,
                    perturbed,
                }),
            )
        } else {
            (sent, None)
        };

        let bob_bit = (bob_basis == alice_basis).then_some(alice_bit);

        PhotonEvent {
            index,
            total,
            alice_basis,
            alice_bit,
            bob_basis,
            bob_bit,
            sent,
            received,
            detour,
        }
    }

    async fn exchange_bases<S: EventSink + ?Sized>(&mut self, sink: &mut S) -> Step {
        let total = self.config.reconciliation_packets;
        for index in 0..total {
            self.checkpoint()?;
            emit(
                sink,
                PhaseEvent::ClassicalPacket {
                    index,
                    total,
                    direction: PacketDirection::for_packet(index),
                },
            )?;
            self.animate(self.config.packet_frames, self.config.pacing.packet_frame)
                .await?;
            self.pause(self.config.pacing.packet_gap).await;
        }
        Ok(())
    }

    async fn check_errors<S: EventSink + ?Sized>(
        &mut self,
        input: &PlaybackInput,
        tally: &PhotonTally,
        sink: &mut S,
    ) -> Step {
        let summary = ErrorCheckSummary {
            matched_photons: tally.matched,
            total_photons: tally.sent,
            matching_bases: input.matching_bases,
            matching_percentage: input.matching_percentage,
            qber: input.qber,
            qber_threshold: ABORT_QBER_THRESHOLD,
            above_threshold: !input.key_accepted(),
        };
        debug!("{}", summary.status_line());
        emit(sink, PhaseEvent::ErrorCheck(summary))?;
        self.hold(self.config.pacing.error_check).await
    }

    async fn transfer_data<S: EventSink + ?Sized>(&mut self, sink: &mut S) -> Step {
        let total = self.config.data_packets;
        for index in 0..total {
            self.checkpoint()?;
            emit(sink, PhaseEvent::DataPacket { index, total })?;
            self.animate(self.config.data_packet_frames, self.config.pacing.data_frame)
                .await?;
            self.pause(self.config.pacing.packet_gap).await;
        }
        Ok(())
    }

    fn stopped<S: EventSink + ?Sized>(
        &self,
        phase: Phase,
        reason: StopReason,
        sink: &mut S,
    ) -> PlaybackOutcome {
        match reason {
            StopReason::Cancelled => {
                info!("Animation stopped during {}", phase.title());
                // Best effort: the consumer may already be gone
                let _ = sink.emit(PhaseEvent::Stopped { phase });
            }
            StopReason::SinkClosed => {
                warn!("Event consumer closed during {}", phase.title());
            }
        }
        PlaybackOutcome::Stopped { phase, reason }
    }
}

fn emit<S: EventSink + ?Sized>(sink: &mut S, event: PhaseEvent) -> Step {
    sink.emit(event).map_err(|_| StopReason::SinkClosed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimContext;
    use proptest::prelude::*;
    use qkd_env::TokioContext;

    /// Records events and cancels after the first one matching `trigger`.
    struct CancelOn<F> {
        events: Vec<PhaseEvent>,
        cancel: CancelToken,
        trigger: F,
        fired_at: Option<tokio::time::Instant>,
    }

    impl<F: Fn(&PhaseEvent) -> bool + Send> CancelOn<F> {
        fn new(cancel: CancelToken, trigger: F) -> Self {
            Self {
                events: Vec::new(),
                cancel,
                trigger,
                fired_at: None,
            }
        }
    }

    impl<F: Fn(&PhaseEvent) -> bool + Send> EventSink for CancelOn<F> {
        fn emit(&mut self, event: PhaseEvent) -> Result<(), EnvError> {
            let fire = self.fired_at.is_none() && (self.trigger)(&event);
            self.events.push(event);
            if fire {
                self.fired_at = Some(tokio::time::Instant::now());
                self.cancel.cancel();
            }
            Ok(())
        }
    }

    fn input(qber: f64, intercept: bool) -> PlaybackInput {
        PlaybackInput {
            qber,
            matching_bases: 512,
            matching_percentage: 50.0,
            simulate_interception: intercept,
        }
    }

    fn driver(seed: u64) -> ProtocolDriver<SimContext> {
        ProtocolDriver::new(
            SimContext::shared(seed),
            PlaybackConfig::instant(),
            RandomnessSource::from_seed(seed),
        )
    }

    fn phases(events: &[PhaseEvent]) -> Vec<Phase> {
        events
            .iter()
            .filter_map(|e| match e {
                PhaseEvent::PhaseEntered { phase } => Some(*phase),
                _ => None,
            })
            .collect()
    }

    fn photon_count(events: &[PhaseEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, PhaseEvent::Photon(_)))
            .count()
    }

    #[tokio::test]
    async fn test_clean_playback_establishes_key() {
        let mut events = Vec::new();
        let outcome = driver(1).run(input(4.2, false), &mut events).await;

        assert_eq!(
            outcome,
            PlaybackOutcome::Completed {
                terminal: Phase::KeyEstablished
            }
        );
        assert_eq!(
            phases(&events),
            vec![
                Phase::Distribution,
                Phase::Measurement,
                Phase::Reconciliation,
                Phase::ErrorCheck,
                Phase::KeyEstablished
            ]
        );
        assert_eq!(photon_count(&events), 20);
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, PhaseEvent::DataPacket { .. }))
                .count(),
            10
        );
        // No Eve without interception
        assert!(events.iter().all(|e| match e {
            PhaseEvent::Photon(p) => p.detour.is_none() && p.sent == p.received,
            _ => true,
        }));
    }

    #[tokio::test]
    async fn test_intercepted_playback_aborts() {
        let mut events = Vec::new();
        let outcome = driver(2).run(input(18.0, true), &mut events).await;

        assert_eq!(
            outcome,
            PlaybackOutcome::Completed {
                terminal: Phase::Aborted
            }
        );
        assert!(events.contains(&PhaseEvent::BreachDetected { qber: 18.0 }));
        assert!(!events
            .iter()
            .any(|e| matches!(e, PhaseEvent::DataPacket { .. })));

        for event in &events {
            if let PhaseEvent::Photon(p) = event {
                let detour = p.detour.expect("interception adds a detour");
                if !detour.perturbed {
                    assert_eq!(p.sent, p.received);
                }
                assert_eq!(detour.perturbed, detour.eve_basis != p.alice_basis);
            }
        }
    }

    #[tokio::test]
    async fn test_error_check_uses_authoritative_qber() {
        let mut events = Vec::new();
        driver(3).run(input(10.0, false), &mut events).await;

        let summary = events
            .iter()
            .find_map(|e| match e {
                PhaseEvent::ErrorCheck(s) => Some(*s),
                _ => None,
            })
            .unwrap();
        assert_eq!(summary.qber, 10.0);
        assert_eq!(summary.qber_threshold, 10.0);
        assert!(!summary.above_threshold);
        assert_eq!(summary.total_photons, 20);
        assert_eq!(summary.matching_bases, 512);
        assert_eq!(
            summary.matched_photons,
            events
                .iter()
                .filter(|e| matches!(e, PhaseEvent::Photon(p) if p.bases_match()))
                .count()
        );
    }

    #[tokio::test]
    async fn test_bob_bit_revealed_only_on_match() {
        let mut events = Vec::new();
        driver(4).run(input(3.0, false), &mut events).await;

        for event in &events {
            if let PhaseEvent::Photon(p) = event {
                if p.bases_match() {
                    assert_eq!(p.bob_bit, Some(p.alice_bit));
                } else {
                    assert_eq!(p.bob_bit, None);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_reconciliation_packet_directions() {
        let mut events = Vec::new();
        driver(5).run(input(3.0, false), &mut events).await;

        let directions: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                PhaseEvent::ClassicalPacket { direction, .. } => Some(*direction),
                _ => None,
            })
            .collect();
        assert_eq!(directions.len(), 15);
        assert_eq!(directions[0], PacketDirection::AliceToBob);
        assert_eq!(directions[1], PacketDirection::BobToAlice);
        assert_eq!(directions[3], PacketDirection::AliceToBob);
    }

    #[tokio::test]
    async fn test_cancel_mid_distribution() {
        let d = driver(6);
        let mut sink = CancelAfterPhotons::new(Vec::new(), 5, d.cancel_token());
        let outcome = d.run(input(3.0, false), &mut sink).await;
        let events = sink.into_inner();

        assert_eq!(
            outcome,
            PlaybackOutcome::Stopped {
                phase: Phase::Distribution,
                reason: StopReason::Cancelled
            }
        );
        assert_eq!(photon_count(&events), 5);
        assert_eq!(phases(&events), vec![Phase::Distribution]);
        assert_eq!(
            events.last(),
            Some(&PhaseEvent::Stopped {
                phase: Phase::Distribution
            })
        );
    }

    #[tokio::test]
    async fn test_zero_photon_limit_delivers_nothing() {
        let d = driver(13);
        let mut sink = CancelAfterPhotons::new(Vec::new(), 0, d.cancel_token());
        let outcome = d.run(input(3.0, false), &mut sink).await;

        assert_eq!(
            outcome,
            PlaybackOutcome::Stopped {
                phase: Phase::Distribution,
                reason: StopReason::Cancelled
            }
        );
        assert_eq!(
            sink.into_inner(),
            vec![PhaseEvent::Stopped {
                phase: Phase::Distribution
            }]
        );
    }

    #[tokio::test]
    async fn test_cancel_mid_reconciliation() {
        let d = driver(14);
        let mut sink = CancelOn::new(d.cancel_token(), |e| {
            matches!(e, PhaseEvent::ClassicalPacket { index: 4, .. })
        });
        let outcome = d.run(input(3.0, false), &mut sink).await;
        let events = sink.events;

        assert_eq!(
            outcome,
            PlaybackOutcome::Stopped {
                phase: Phase::Reconciliation,
                reason: StopReason::Cancelled
            }
        );
        let packets: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                PhaseEvent::ClassicalPacket { index, .. } => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(packets, vec![0, 1, 2, 3, 4]);
        assert_eq!(
            phases(&events),
            vec![Phase::Distribution, Phase::Measurement, Phase::Reconciliation]
        );
        assert!(!events.iter().any(|e| matches!(e, PhaseEvent::ErrorCheck(_))));
        assert_eq!(
            events.last(),
            Some(&PhaseEvent::Stopped {
                phase: Phase::Reconciliation
            })
        );
    }

    #[tokio::test]
    async fn test_cancel_mid_data_transfer() {
        let d = driver(15);
        let mut sink = CancelOn::new(d.cancel_token(), |e| {
            matches!(e, PhaseEvent::DataPacket { index: 3, .. })
        });
        let outcome = d.run(input(3.0, false), &mut sink).await;
        let events = sink.events;

        assert_eq!(
            outcome,
            PlaybackOutcome::Stopped {
                phase: Phase::KeyEstablished,
                reason: StopReason::Cancelled
            }
        );
        let packets: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                PhaseEvent::DataPacket { index, .. } => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(packets, vec![0, 1, 2, 3]);
        assert_eq!(phases(&events).last(), Some(&Phase::KeyEstablished));
        assert_eq!(
            events.last(),
            Some(&PhaseEvent::Stopped {
                phase: Phase::KeyEstablished
            })
        );
    }

    #[tokio::test]
    async fn test_cancel_during_measurement_skips_pause() {
        let ctx = SimContext::shared(16);
        let d = ProtocolDriver::new(
            ctx.clone(),
            PlaybackConfig::default(),
            RandomnessSource::from_seed(16),
        );
        let mut sink = CancelOn::new(d.cancel_token(), |e| {
            matches!(e, PhaseEvent::PhaseEntered { phase: Phase::Measurement })
        });
        let outcome = d.run(input(3.0, false), &mut sink).await;

        assert_eq!(
            outcome,
            PlaybackOutcome::Stopped {
                phase: Phase::Measurement,
                reason: StopReason::Cancelled
            }
        );
        // Distribution only: 20 * (20 * 30ms + 300ms), none of the 1.5s hold
        assert_eq!(ctx.now(), Duration::from_secs(18));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_check_hold_stops_within_a_slice() {
        let d = ProtocolDriver::new(
            TokioContext::shared(),
            PlaybackConfig::default(),
            RandomnessSource::from_seed(17),
        );
        let mut sink = CancelOn::new(d.cancel_token(), |e| matches!(e, PhaseEvent::ErrorCheck(_)));
        let outcome = d.run(input(3.0, false), &mut sink).await;

        assert_eq!(
            outcome,
            PlaybackOutcome::Stopped {
                phase: Phase::ErrorCheck,
                reason: StopReason::Cancelled
            }
        );
        let fired_at = sink.fired_at.expect("error check was emitted");
        assert!(fired_at.elapsed() < Duration::from_millis(100));
    }

    proptest! {
        #[test]
        fn prop_stop_after_k_photons(k in 0usize..=20, seed in any::<u64>()) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            let (outcome, events) = rt.block_on(async {
                let d = driver(seed);
                let mut sink = CancelAfterPhotons::new(Vec::new(), k, d.cancel_token());
                let outcome = d.run(input(3.0, false), &mut sink).await;
                (outcome, sink.into_inner())
            });

            prop_assert_eq!(photon_count(&events), k);
            prop_assert_eq!(
                outcome,
                PlaybackOutcome::Stopped {
                    phase: Phase::Distribution,
                    reason: StopReason::Cancelled
                }
            );
            prop_assert!(phases(&events).iter().all(|p| *p == Phase::Distribution));
            prop_assert_eq!(
                events.last(),
                Some(&PhaseEvent::Stopped { phase: Phase::Distribution })
            );
        }
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let d = driver(7);
        d.cancel_token().cancel();
        let mut events = Vec::new();
        let outcome = d.run(input(3.0, false), &mut events).await;

        assert!(!outcome.is_completed());
        assert_eq!(
            events,
            vec![PhaseEvent::Stopped {
                phase: Phase::Distribution
            }]
        );
    }

    #[tokio::test]
    async fn test_closed_channel_stops_playback() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut tx = tx;
        let outcome = driver(8).run(input(3.0, false), &mut tx).await;

        assert_eq!(
            outcome,
            PlaybackOutcome::Stopped {
                phase: Phase::Distribution,
                reason: StopReason::SinkClosed
            }
        );
    }

    #[tokio::test]
    async fn test_playback_is_reproducible() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        driver(9).run(input(18.0, true), &mut a).await;
        driver(9).run(input(18.0, true), &mut b).await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_virtual_time_accumulates_pacing() {
        let ctx = SimContext::shared(10);
        let d = ProtocolDriver::new(
            ctx.clone(),
            PlaybackConfig::default(),
            RandomnessSource::from_seed(10),
        );
        let mut events = Vec::new();
        d.run(input(3.0, false), &mut events).await;

        // 20 photons * (20 * 30ms + 300ms) alone is 18s of virtual time
        assert!(ctx.now() >= Duration::from_secs(18));
    }
}
