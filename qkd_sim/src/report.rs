//! Text rendering of results and playback events for the terminal.

use crate::phase::{PacketDirection, PhaseEvent, PlaybackOutcome, Polarization, StopReason};
use qkd_core::{ProgressStep, SimulationResult};
use std::fmt;

/// Hex ciphertext preview length
const CIPHERTEXT_PREVIEW: usize = 50;

/// Basis string preview length
const BASES_PREVIEW: usize = 20;

/// Key preview length (bits)
const KEY_PREVIEW: usize = 64;

/// Returns at most `max` characters of `text`, with an ellipsis when cut.
fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// "Summary" section.
pub struct Summary<'a>(pub &'a SimulationResult);

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.0;
        writeln!(f, "Simulation Results Summary")?;
        writeln!(f, "=========================")?;
        writeln!(f)?;
        writeln!(f, "Original Message: {}", r.original_message)?;
        writeln!(
            f,
            "Encrypted Message: {}",
            preview(&r.encrypted_message_hex, CIPHERTEXT_PREVIEW)
        )?;
        writeln!(f, "Decrypted Message: {}", r.decrypted_message)?;
        writeln!(f)?;
        writeln!(f, "Key Generation:")?;
        writeln!(f, "  - Raw Key Size: {} bits", r.raw_key_size)?;
        writeln!(f, "  - Final Key Size: {} bits", r.final_key_size)?;
        writeln!(f, "  - QBER: {:.2}%", r.qber)?;
        writeln!(f)?;
        writeln!(f, "Security Status: {}", r.security_status)
    }
}

/// "Details" section.
pub struct Details<'a>(pub &'a SimulationResult);

impl fmt::Display for Details<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.0;
        let reduction = &r.key_reduction;
        writeln!(f, "Quantum Key Distribution Details")?;
        writeln!(f, "================================")?;
        writeln!(f)?;
        writeln!(f, "Quantum Protocol: BB84")?;
        writeln!(f, "Channel Type: Satellite-to-Ground")?;
        writeln!(f)?;
        writeln!(f, "Basis Reconciliation:")?;
        writeln!(f, "  - Alice's Bases: {}", preview(&r.alice_bases, BASES_PREVIEW))?;
        writeln!(f, "  - Bob's Bases: {}", preview(&r.bob_bases, BASES_PREVIEW))?;
        writeln!(
            f,
            "  - Matching Bases: {} ({:.1}%)",
            r.matching_bases, r.matching_percentage
        )?;
        writeln!(f)?;
        writeln!(f, "Key Reduction:")?;
        writeln!(
            f,
            "  - Error correction: -{} bits",
            reduction.error_correction_loss
        )?;
        writeln!(
            f,
            "  - Privacy amplification: -{} bits",
            reduction.privacy_amplification_loss
        )?;
        writeln!(f)?;
        writeln!(f, "Key Sample (first {} bits):", KEY_PREVIEW)?;
        writeln!(f, "  - Raw Key: {}", preview(&r.raw_key, KEY_PREVIEW))?;
        writeln!(f, "  - Final Key: {}", preview(&r.final_key, KEY_PREVIEW))
    }
}

/// "Security" section.
pub struct Security<'a>(pub &'a SimulationResult);

impl fmt::Display for Security<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.0;
        writeln!(f, "Security Analysis")?;
        writeln!(f, "================")?;
        writeln!(f)?;

        if r.intercept_detected {
            writeln!(f, "⚠️ SECURITY ALERT: Possible intercept detected ⚠️")?;
            writeln!(f)?;
            write_qber(f, r)?;
            writeln!(f, "  - Status: Above threshold (potential eavesdropping)")?;
            writeln!(f)?;
            writeln!(f, "Interception Assessment:")?;
            writeln!(
                f,
                "  - Estimated data compromised: {:.1}%",
                r.compromise_estimate
            )?;
            writeln!(f, "  - Confidence level: {:.1}%", r.confidence_level)?;
            writeln!(f)?;
            writeln!(f, "Security Recommendation:")?;
            writeln!(f, "  - Abort key and restart QKD with new parameters")?;
            writeln!(f, "  - Investigate potential security breach")
        } else {
            writeln!(f, "✓ Secure Communication Channel ✓")?;
            writeln!(f)?;
            write_qber(f, r)?;
            writeln!(
                f,
                "  - Status: Below threshold (no evidence of eavesdropping)"
            )?;
            writeln!(f)?;
            writeln!(f, "Privacy Amplification:")?;
            writeln!(
                f,
                "  - Estimated entropy reduction: {:.1}%",
                r.entropy_reduction
            )?;
            writeln!(f, "  - Security parameter: {} bits", r.security_parameter)?;
            writeln!(f)?;
            writeln!(f, "Information Leakage Estimate:")?;
            writeln!(f, "  - Maximum leakage: < {:.8} bits", r.max_leakage)?;
            writeln!(f, "  - Channel security: {}", r.channel_security)
        }
    }
}

fn write_qber(f: &mut fmt::Formatter<'_>, r: &SimulationResult) -> fmt::Result {
    writeln!(f, "QBER Analysis:")?;
    writeln!(f, "  - Measured QBER: {:.2}%", r.qber)?;
    writeln!(f, "  - Threshold QBER: {:.2}%", r.qber_threshold)
}

/// All three sections, separated by blank lines.
pub fn render_report(result: &SimulationResult) -> String {
    format!(
        "{}\n{}\n{}",
        Summary(result),
        Details(result),
        Security(result)
    )
}

/// One progress line, e.g. `[ 23%] Measuring quantum states...`.
pub fn progress_line(step: &ProgressStep) -> String {
    format!("[{:>3.0}%] {}", step.percent, step.label)
}

fn polarization_symbol(p: Polarization) -> &'static str {
    match p {
        Polarization::Horizontal => "H",
        Polarization::Vertical => "V",
        Polarization::Diagonal => "D",
        Polarization::AntiDiagonal => "A",
    }
}

/// One line describing a playback event.
pub fn event_line(event: &PhaseEvent) -> String {
    match event {
        PhaseEvent::PhaseEntered { phase } => phase.title().to_string(),
        PhaseEvent::Photon(p) => {
            let bob_bit = p
                .bob_bit
                .map(|b| b.symbol().to_string())
                .unwrap_or_else(|| "?".to_string());
            let mut line = format!(
                "  Photon {}/{}: Alice {} bit {} -> Bob {} bit {} | sent {} received {}",
                p.index + 1,
                p.total,
                p.alice_basis.label(),
                p.alice_bit.symbol(),
                p.bob_basis.label(),
                bob_bit,
                polarization_symbol(p.sent),
                polarization_symbol(p.received),
            );
            if let Some(detour) = p.detour {
                let verdict = if detour.perturbed { "perturbed" } else { "undetected" };
                line.push_str(&format!(
                    " | Eve basis {} ({})",
                    detour.eve_basis.label(),
                    verdict
                ));
            }
            line
        }
        PhaseEvent::ClassicalPacket {
            index,
            total,
            direction,
        } => {
            let arrow = match direction {
                PacketDirection::AliceToBob => "Alice -> Bob",
                PacketDirection::BobToAlice => "Bob -> Alice",
            };
            format!("  Basis packet {}/{}: {}", index + 1, total, arrow)
        }
        PhaseEvent::ErrorCheck(summary) => format!("  {}", summary.status_line()),
        PhaseEvent::DataPacket { index, total } => {
            format!("  Encrypted packet {}/{}: Alice -> Bob", index + 1, total)
        }
        PhaseEvent::BreachDetected { qber } => format!(
            "  Security breach detected! Error rate {:.1}% exceeds threshold",
            qber
        ),
        PhaseEvent::Stopped { phase } => format!("  Playback stopped during {}", phase.title()),
    }
}

/// One line describing how a playback ended.
pub fn outcome_line(outcome: &PlaybackOutcome) -> String {
    match outcome {
        PlaybackOutcome::Completed { terminal } => format!("Playback complete: {}", terminal),
        PlaybackOutcome::Stopped {
            phase,
            reason: StopReason::Cancelled,
        } => format!("Playback stopped in {}", phase),
        PlaybackOutcome::Stopped {
            phase,
            reason: StopReason::SinkClosed,
        } => format!("Playback abandoned in {} (consumer closed)", phase),
    }
}
