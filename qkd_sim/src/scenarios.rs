//! Canned end-to-end scenarios.

use serde::{Deserialize, Serialize};

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// QKD-A: clean channel, key established
    SecureChannel,

    /// QKD-B: Eve on the channel, key exchange aborted
    Interception,

    /// QKD-C: playback stopped after the fifth photon
    StoppedPlayback,

    /// QKD-D: empty message rejected before any work
    EmptyMessage,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::SecureChannel,
            ScenarioId::Interception,
            ScenarioId::StoppedPlayback,
            ScenarioId::EmptyMessage,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::SecureChannel => "secure_channel",
            ScenarioId::Interception => "interception",
            ScenarioId::StoppedPlayback => "stopped_playback",
            ScenarioId::EmptyMessage => "empty_message",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::SecureChannel => {
                "No interception: message round-trips, key >= 16 bits, SECURE, KEY_ESTABLISHED"
            }
            ScenarioId::Interception => {
                "Eve intercepts: QBER in [15, 25], COMPROMISED, playback ends ABORTED"
            }
            ScenarioId::StoppedPlayback => {
                "Stop after photon 5 of 20: no later photon or phase, result unchanged"
            }
            ScenarioId::EmptyMessage => "Empty message rejected with no progress reported",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "secure_channel" | "securechannel" | "secure" | "qkd-a" => Ok(ScenarioId::SecureChannel),
            "interception" | "intercept" | "eve" | "qkd-b" => Ok(ScenarioId::Interception),
            "stopped_playback" | "stoppedplayback" | "stop" | "qkd-c" => {
                Ok(ScenarioId::StoppedPlayback)
            }
            "empty_message" | "emptymessage" | "empty" | "qkd-d" => Ok(ScenarioId::EmptyMessage),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
            assert!(!scenario.description().is_empty());
        }
        assert!(ScenarioId::StoppedPlayback.description().contains("photon 5"));
    }

    #[test]
    fn test_aliases() {
        assert_eq!("QKD-B".parse::<ScenarioId>(), Ok(ScenarioId::Interception));
        assert_eq!("stop".parse::<ScenarioId>(), Ok(ScenarioId::StoppedPlayback));
        assert!("split_brain".parse::<ScenarioId>().is_err());
    }
}
