//! Intent labels assigned to path-classification turns.
//!
//! The weight table is a fixed constant: outcomes are only comparable across
//! sessions (and across deployments) while every label keeps its weight.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Smallest weight any label carries.
pub const MIN_WEIGHT: u32 = 1;

/// Largest weight any label carries.
pub const MAX_WEIGHT: u32 = 3;

/// Discrete judgment of what a participant's response was trying to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentLabel {
    /// Hands the decision to someone else
    Defer,
    /// Pulls out of the situation
    Withdraw,
    /// Gives ground to keep the peace
    Accommodate,
    /// Asks questions before committing
    Probe,
    /// Trades concessions
    Negotiate,
    /// Moves the conversation elsewhere
    Redirect,
    /// Raises the stakes
    Escalate,
    /// Sets the terms of the discussion
    Frame,
}

impl IntentLabel {
    /// Every label, in table order.
    pub const ALL: [Self; 8] = [
        Self::Defer,
        Self::Withdraw,
        Self::Accommodate,
        Self::Probe,
        Self::Negotiate,
        Self::Redirect,
        Self::Escalate,
        Self::Frame,
    ];

    /// Fixed weight of this label, always within `MIN_WEIGHT..=MAX_WEIGHT`.
    pub const fn weight(self) -> u32 {
        match self {
            Self::Defer | Self::Withdraw | Self::Accommodate => 1,
            Self::Probe | Self::Negotiate | Self::Redirect => 2,
            Self::Escalate | Self::Frame => 3,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Defer => "defer",
            Self::Withdraw => "withdraw",
            Self::Accommodate => "accommodate",
            Self::Probe => "probe",
            Self::Negotiate => "negotiate",
            Self::Redirect => "redirect",
            Self::Escalate => "escalate",
            Self::Frame => "frame",
        }
    }
}

impl fmt::Display for IntentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown intent label: {0}")]
pub struct UnknownLabel(pub String);

impl FromStr for IntentLabel {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|label| label.as_str() == normalized)
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_table() {
        assert_eq!(IntentLabel::Defer.weight(), 1);
        assert_eq!(IntentLabel::Withdraw.weight(), 1);
        assert_eq!(IntentLabel::Accommodate.weight(), 1);
        assert_eq!(IntentLabel::Probe.weight(), 2);
        assert_eq!(IntentLabel::Negotiate.weight(), 2);
        assert_eq!(IntentLabel::Redirect.weight(), 2);
        assert_eq!(IntentLabel::Escalate.weight(), 3);
        assert_eq!(IntentLabel::Frame.weight(), 3);
    }

    #[test]
    fn test_weights_within_bounds() {
        for label in IntentLabel::ALL {
            assert!((MIN_WEIGHT..=MAX_WEIGHT).contains(&label.weight()));
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Escalate".parse::<IntentLabel>(), Ok(IntentLabel::Escalate));
        assert_eq!("  FRAME ".parse::<IntentLabel>(), Ok(IntentLabel::Frame));
        assert!("shrug".parse::<IntentLabel>().is_err());
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&IntentLabel::Accommodate).unwrap();
        assert_eq!(json, "\"accommodate\"");
    }
}
