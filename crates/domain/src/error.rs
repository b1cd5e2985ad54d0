//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`EngineError`] via `#[from]`. Data-quality problems (stale, missing,
//! out-of-range samples) are **not** errors — they resolve to a condition's
//! fallback value and never surface here.

use crate::id::{ControllerId, RuleId};
use crate::actuator::ActuatorRef;

/// Top-level error for the edgehub engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// The concurrent-process ceiling would be exceeded.
    #[error("process capacity exceeded (limit {limit})")]
    CapacityExceeded { limit: usize },

    /// A process was started for a rule that is missing or disabled.
    #[error("rule {id} is unavailable")]
    RuleUnavailable { id: RuleId },

    /// An evaluation or remote fetch exceeded its bound.
    #[error("timeout")]
    Timeout(#[from] TimeoutError),

    /// Outbound command delivery failed. Retry is the transport's concern.
    #[error("command delivery failed")]
    CommandDelivery(#[from] CommandDeliveryError),

    /// The referenced device could not be routed to any controller.
    #[error("no controller known for {0}")]
    UnknownController(String),

    /// Backup persistence failed.
    #[error("backup store error: {0}")]
    Backup(String),
}

/// Domain invariant violations raised by builders and constructors.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("rule must have at least one condition, timer, or event")]
    EmptyRule,
    #[error("cross-controller rule must have at least one action")]
    NoActions,
    #[error("timer window minutes must be below 1440, got {0}")]
    MinutesOutOfRange(u16),
}

/// A bounded operation that did not finish in time.
#[derive(Debug, thiserror::Error)]
#[error("{operation} did not finish within {}ms", timeout.as_millis())]
pub struct TimeoutError {
    /// Human-readable description of what timed out.
    pub operation: String,
    /// The bound that was exceeded.
    pub timeout: std::time::Duration,
}

impl TimeoutError {
    /// Timeout while evaluating a process.
    #[must_use]
    pub fn evaluation(rule: RuleId, timeout: std::time::Duration) -> Self {
        Self {
            operation: format!("evaluation of rule {rule}"),
            timeout,
        }
    }
}

/// Failure to deliver an outbound actuator command.
///
/// Logged and surfaced to the caller; never auto-retried by the engine.
#[derive(Debug, thiserror::Error)]
#[error("delivery to {target} via {controller} failed: {detail}")]
pub struct CommandDeliveryError {
    pub target: ActuatorRef,
    pub controller: ControllerId,
    pub detail: String,
}
