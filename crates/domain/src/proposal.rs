//! State proposals — what a producer wants an actuator to do.
//!
//! Proposals are ephemeral: produced by collaborators (manual override,
//! alert subsystem, rule automation, schedules), consumed by the priority
//! resolver, never persisted. The last winning proposal per actuator *is*
//! the resolved state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::actuator::{ActuatorRef, ActuatorState};
use crate::time::Timestamp;

/// Who is asking for a state change.
///
/// The ordering is a hard invariant of the arbitration policy. It is
/// encoded in [`priority`](Self::priority) as an exhaustive match so that a
/// new source is a compile-time case, never a silent default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalSource {
    Emergency,
    Manual,
    Alert,
    Logic,
    Timer,
    Schedule,
    Default,
}

impl ProposalSource {
    /// Fixed arbitration priority, highest wins.
    #[must_use]
    pub fn priority(self) -> u8 {
        match self {
            Self::Emergency => 100,
            Self::Manual => 90,
            Self::Alert => 80,
            Self::Logic => 70,
            Self::Timer => 60,
            Self::Schedule => 50,
            Self::Default => 0,
        }
    }
}

impl fmt::Display for ProposalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Emergency => "emergency",
            Self::Manual => "manual",
            Self::Alert => "alert",
            Self::Logic => "logic",
            Self::Timer => "timer",
            Self::Schedule => "schedule",
            Self::Default => "default",
        };
        f.write_str(name)
    }
}

/// One producer's request for an actuator state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateProposal {
    pub state: ActuatorState,
    pub source: ProposalSource,
    /// Free-text justification, shown in logs and diagnostics.
    pub reason: String,
    pub timestamp: Timestamp,
}

impl StateProposal {
    /// Build a proposal from a source, carrying its fixed priority.
    #[must_use]
    pub fn new(
        state: ActuatorState,
        source: ProposalSource,
        reason: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            state,
            source,
            reason: reason.into(),
            timestamp,
        }
    }

    /// The synthetic proposal returned when no producer has an opinion:
    /// off, [`ProposalSource::Default`], priority 0.
    #[must_use]
    pub fn fallback_default(timestamp: Timestamp) -> Self {
        Self::new(
            ActuatorState::Off,
            ProposalSource::Default,
            "no active proposal",
            timestamp,
        )
    }

    /// Priority inherited from the source.
    #[must_use]
    pub fn priority(&self) -> u8 {
        self.source.priority()
    }
}

/// The authoritative command forwarded to a field controller once
/// arbitration has picked a winner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorCommand {
    pub target: ActuatorRef,
    pub state: ActuatorState,
    pub source: ProposalSource,
    pub reason: String,
    pub issued_at: Timestamp,
}

impl ActuatorCommand {
    /// Turn a winning proposal into the outbound command for `target`.
    #[must_use]
    pub fn from_proposal(target: ActuatorRef, proposal: &StateProposal) -> Self {
        Self {
            target,
            state: proposal.state,
            source: proposal.source,
            reason: proposal.reason.clone(),
            issued_at: proposal.timestamp,
        }
    }
}
