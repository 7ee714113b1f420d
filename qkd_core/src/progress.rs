//! Progress steps reported while a simulation is prepared.

use serde::{Deserialize, Serialize};

/// Step labels, in emission order.
pub const PROGRESS_STEPS: [&str; 13] = [
    "Generating entangled photon pairs...",
    "Distributing quantum states...",
    "Measuring quantum states...",
    "Performing basis reconciliation...",
    "Estimating quantum bit error rate...",
    "Error correction in progress...",
    "Privacy amplification...",
    "Generating final key...",
    "Encrypting message...",
    "Transmitting data...",
    "Decrypting message...",
    "Verifying security...",
    "Finalizing results...",
];

/// Label shown once every step has been reported.
pub const COMPLETED_LABEL: &str = "Completed!";

/// One progress report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressStep {
    /// Zero-based step index
    pub index: usize,
    pub total: usize,
    pub label: String,
    /// `index / total * 100`, so the first step reports 0%
    pub percent: f64,
}

/// One-shot iterator over the progress steps.
///
/// Deliberately not `Clone`: a run reports its steps exactly once.
#[derive(Debug)]
pub struct ProgressSteps {
    next: usize,
}

impl ProgressSteps {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Number of steps.
    pub fn total() -> usize {
        PROGRESS_STEPS.len()
    }

    /// The terminal report at 100%.
    pub fn completed() -> ProgressStep {
        ProgressStep {
            index: Self::total(),
            total: Self::total(),
            label: COMPLETED_LABEL.to_string(),
            percent: 100.0,
        }
    }
}

impl Default for ProgressSteps {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for ProgressSteps {
    type Item = ProgressStep;

    fn next(&mut self) -> Option<ProgressStep> {
        let label = PROGRESS_STEPS.get(self.next)?;
        let total = Self::total();
        let step = ProgressStep {
            index: self.next,
            total,
            label: label.to_string(),
            percent: self.next as f64 / total as f64 * 100.0,
        };
        self.next += 1;
        Some(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thirteen_ordered_steps() {
        let steps: Vec<_> = ProgressSteps::new().collect();
        assert_eq!(steps.len(), 13);
        assert_eq!(steps[0].label, "Generating entangled photon pairs...");
        assert_eq!(steps[12].label, "Finalizing results...");
        assert!(steps.iter().enumerate().all(|(i, s)| s.index == i && s.total == 13));
        assert_eq!(steps[0].percent, 0.0);
    }

    #[test]
    fn test_not_restartable() {
        let mut steps = ProgressSteps::new();
        for _ in steps.by_ref() {}
        assert!(steps.next().is_none());
    }

    #[test]
    fn test_completed_marker() {
        let done = ProgressSteps::completed();
        assert_eq!(done.label, COMPLETED_LABEL);
        assert_eq!(done.percent, 100.0);
    }
}
