//! Process store — bounded runtime registry of logic processes.
//!
//! One process per actuator, capped at a configurable ceiling. The store
//! owns all mutation of process bookkeeping so the scheduler can work from
//! snapshots: an update against a process that was stopped mid-flight is
//! simply discarded.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use edgehub_domain::actuator::ActuatorRef;
use edgehub_domain::error::EngineError;
use edgehub_domain::id::{ProcessId, RuleId};
use edgehub_domain::process::{LogicProcess, ProcessStatus};
use edgehub_domain::rule::LogicRule;
use edgehub_domain::time::Timestamp;

/// Aggregate view over all running processes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessStats {
    pub running: usize,
    pub total_evaluations: u64,
    pub average_evaluation_time_ms: f64,
    /// Rules whose average evaluation time exceeds the slow threshold.
    pub slow_rule_ids: Vec<RuleId>,
}

/// Bounded map of [`ActuatorRef`] → [`LogicProcess`].
pub struct ProcessStore {
    processes: Mutex<HashMap<ActuatorRef, LogicProcess>>,
    capacity: usize,
    history_bound: usize,
}

impl ProcessStore {
    /// Create a store with a process ceiling and per-process history bound.
    #[must_use]
    pub fn new(capacity: usize, history_bound: usize) -> Self {
        Self {
            processes: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            history_bound,
        }
    }

    /// Start a process for `rule`.
    ///
    /// Restarting a rule on an actuator that already has a process
    /// replaces it. The caller has already checked that the rule exists
    /// and is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CapacityExceeded`] when the ceiling would be
    /// exceeded.
    pub fn start(&self, rule: &LogicRule, now: Timestamp) -> Result<ProcessId, EngineError> {
        let mut processes = self.lock();
        if !processes.contains_key(&rule.actuator) && processes.len() >= self.capacity {
            return Err(EngineError::CapacityExceeded {
                limit: self.capacity,
            });
        }
        let process = LogicProcess::spawn(rule, self.history_bound, now);
        let id = process.id;
        processes.insert(rule.actuator.clone(), process);
        Ok(id)
    }

    /// Stop and remove the process driving `actuator`. Idempotent.
    ///
    /// Returns whether a process was actually removed.
    pub fn stop(&self, actuator: &ActuatorRef) -> bool {
        let mut processes = self.lock();
        match processes.remove(actuator) {
            Some(mut process) => {
                process.status = ProcessStatus::Stopped;
                true
            }
            None => false,
        }
    }

    /// Clone the process driving `actuator`, if any.
    pub fn get(&self, actuator: &ActuatorRef) -> Option<LogicProcess> {
        self.lock().get(actuator).cloned()
    }

    /// Snapshot all running processes.
    pub fn snapshot_running(&self) -> Vec<LogicProcess> {
        self.lock()
            .values()
            .filter(|p| p.status == ProcessStatus::Running)
            .cloned()
            .collect()
    }

    /// Apply `mutate` to the stored process for `actuator`.
    ///
    /// Returns `false` when the process is gone — the caller's result is
    /// then discarded, which is exactly the mid-flight-stop contract.
    pub fn update<F>(&self, actuator: &ActuatorRef, mutate: F) -> bool
    where
        F: FnOnce(&mut LogicProcess),
    {
        let mut processes = self.lock();
        match processes.get_mut(actuator) {
            Some(process) => {
                mutate(process);
                true
            }
            None => false,
        }
    }

    /// Number of processes currently in the store.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store holds no processes.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Aggregate stats across all processes.
    pub fn stats(&self, slow_threshold_ms: u64) -> ProcessStats {
        let processes = self.lock();
        let running = processes
            .values()
            .filter(|p| p.status == ProcessStatus::Running)
            .count();
        let total_evaluations: u64 = processes.values().map(|p| p.evaluation_count).sum();
        let total_ms: u64 = processes.values().map(|p| p.total_evaluation_ms).sum();
        let average = if total_evaluations == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            {
                total_ms as f64 / total_evaluations as f64
            }
        };
        #[allow(clippy::cast_precision_loss)]
        let threshold = slow_threshold_ms as f64;
        let mut slow_rule_ids: Vec<RuleId> = processes
            .values()
            .filter(|p| p.evaluation_count > 0 && p.average_evaluation_ms() > threshold)
            .map(|p| p.rule_id)
            .collect();
        slow_rule_ids.sort_by_key(|id| id.as_uuid());
        ProcessStats {
            running,
            total_evaluations,
            average_evaluation_time_ms: average,
            slow_rule_ids,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ActuatorRef, LogicProcess>> {
        self.processes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
