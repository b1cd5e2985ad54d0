//! Logic process — the runtime instance of a rule under evaluation.
//!
//! A process exists only while its rule is enabled and started. It carries
//! the evaluation bookkeeping the scheduler and the stats endpoint need:
//! counters, the last computed state, and bounded trigger/diagnostic
//! histories.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::actuator::{ActuatorRef, ActuatorState};
use crate::id::{ProcessId, RuleId};
use crate::rule::LogicRule;
use crate::time::Timestamp;

/// Lifecycle state of a process. The only legal transition is
/// `Running → Stopped`; a stopped process is removed from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Running,
    Stopped,
}

/// One state flip produced by an evaluation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRecord {
    pub at: Timestamp,
    pub state: ActuatorState,
    pub reason: String,
}

/// One caught evaluation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    pub at: Timestamp,
    pub message: String,
    /// Whether this failure forced the failsafe state.
    pub failsafe_applied: bool,
}

/// Runtime instance bound 1:1 to a running [`LogicRule`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicProcess {
    pub id: ProcessId,
    pub rule_id: RuleId,
    pub actuator: ActuatorRef,
    pub status: ProcessStatus,
    pub started_at: Timestamp,
    pub last_evaluation: Option<Timestamp>,
    pub evaluation_count: u64,
    /// Cumulative evaluation wall time, for the average in the stats view.
    pub total_evaluation_ms: u64,
    /// Result of the latest trustworthy evaluation, if any.
    pub current_state: Option<ActuatorState>,
    /// Per-condition memory for the `MaintainLast` fallback, indexed like
    /// the rule's condition list.
    pub last_condition_results: Vec<Option<bool>>,
    trigger_history: VecDeque<TriggerRecord>,
    diagnostics: VecDeque<DiagnosticRecord>,
    history_bound: usize,
}

impl LogicProcess {
    /// Spawn a process for `rule`, bounding both histories to
    /// `history_bound` entries.
    #[must_use]
    pub fn spawn(rule: &LogicRule, history_bound: usize, started_at: Timestamp) -> Self {
        Self {
            id: ProcessId::new(),
            rule_id: rule.id,
            actuator: rule.actuator.clone(),
            status: ProcessStatus::Running,
            started_at,
            last_evaluation: None,
            evaluation_count: 0,
            total_evaluation_ms: 0,
            current_state: None,
            last_condition_results: vec![None; rule.conditions.len()],
            trigger_history: VecDeque::new(),
            diagnostics: VecDeque::new(),
            history_bound,
        }
    }

    /// Record a completed evaluation pass.
    pub fn mark_evaluated(&mut self, at: Timestamp, elapsed_ms: u64) {
        self.last_evaluation = Some(at);
        self.evaluation_count += 1;
        self.total_evaluation_ms += elapsed_ms;
    }

    /// Average evaluation wall time, or 0 before the first pass.
    #[must_use]
    pub fn average_evaluation_ms(&self) -> f64 {
        if self.evaluation_count == 0 {
            return 0.0;
        }
        // Precision loss is irrelevant for a milliseconds average.
        #[allow(clippy::cast_precision_loss)]
        {
            self.total_evaluation_ms as f64 / self.evaluation_count as f64
        }
    }

    /// Append a trigger record, evicting the oldest past the bound.
    pub fn record_trigger(&mut self, record: TriggerRecord) {
        self.current_state = Some(record.state);
        push_bounded(&mut self.trigger_history, record, self.history_bound);
    }

    /// Append a diagnostic record, evicting the oldest past the bound.
    pub fn record_diagnostic(&mut self, record: DiagnosticRecord) {
        push_bounded(&mut self.diagnostics, record, self.history_bound);
    }

    /// The bounded trigger history, oldest first.
    #[must_use]
    pub fn trigger_history(&self) -> &VecDeque<TriggerRecord> {
        &self.trigger_history
    }

    /// The bounded diagnostic log, oldest first.
    #[must_use]
    pub fn diagnostics(&self) -> &VecDeque<DiagnosticRecord> {
        &self.diagnostics
    }
}

fn push_bounded<T>(queue: &mut VecDeque<T>, item: T, bound: usize) {
    while queue.len() >= bound.max(1) {
        queue.pop_front();
    }
    queue.push_back(item);
}
