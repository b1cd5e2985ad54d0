//! Control engine — the facade the rest of the system talks to.
//!
//! Ties the priority resolver, the process store, the event registry and
//! the failsafe coordinator together behind one object. Commands leave the
//! engine only when the resolved state of an actuator actually changes.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info};

use edgehub_domain::actuator::{ActuatorKind, ActuatorRef, ActuatorState};
use edgehub_domain::error::EngineError;
use edgehub_domain::id::{ProcessId, RuleId};
use edgehub_domain::proposal::{ActuatorCommand, ProposalSource, StateProposal};
use edgehub_domain::time::now;

use crate::config::EngineConfig;
use crate::failsafe::FailsafeCoordinator;
use crate::ports::{BackupRepository, CommandPublisher, RuleRepository};
use crate::resolver::ResolvedStateStore;
use crate::store::{ProcessStats, ProcessStore};

/// Central arbitration and process-lifecycle facade.
///
/// Generic over the rule repository `R`, the command transport `P` and the
/// backup store `B`; the composition root picks the concrete adapters.
pub struct ControlEngine<R, P, B> {
    rules: R,
    publisher: P,
    failsafe: FailsafeCoordinator<P, B>,
    resolved: ResolvedStateStore,
    processes: ProcessStore,
    events: Mutex<HashSet<String>>,
    config: EngineConfig,
}

impl<R, P, B> ControlEngine<R, P, B>
where
    R: RuleRepository,
    P: CommandPublisher + Clone,
    B: BackupRepository,
{
    pub fn new(rules: R, publisher: P, backups: B, config: EngineConfig) -> Self {
        Self {
            rules,
            failsafe: FailsafeCoordinator::new(publisher.clone(), backups),
            publisher,
            resolved: ResolvedStateStore::new(config.resolved_capacity),
            processes: ProcessStore::new(config.max_processes, config.history_bound),
            events: Mutex::new(HashSet::new()),
            config,
        }
    }

    // ── Arbitration ────────────────────────────────────────────────

    /// Submit a proposal for `actuator` and return the new resolved state.
    ///
    /// A command is published (and the resolved state backed up) only when
    /// the winning state differs from the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CommandDelivery`] or [`EngineError::Backup`]
    /// when pushing the changed state out fails.
    pub async fn submit_proposal(
        &self,
        actuator: &ActuatorRef,
        kind: ActuatorKind,
        proposal: StateProposal,
    ) -> Result<StateProposal, EngineError> {
        let before = self.resolved.get(actuator).map(|p| p.state);
        let resolved = self.resolved.submit(actuator, kind, proposal, now());
        self.apply_if_changed(actuator, before, &resolved).await?;
        Ok(resolved)
    }

    /// Withdraw the proposal from `source` and return the new resolved
    /// state, or `None` when the actuator was never proposed for.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`submit_proposal`](Self::submit_proposal).
    pub async fn clear_proposal(
        &self,
        actuator: &ActuatorRef,
        source: ProposalSource,
    ) -> Result<Option<StateProposal>, EngineError> {
        let before = self.resolved.get(actuator).map(|p| p.state);
        let Some(resolved) = self.resolved.clear(actuator, source, now()) else {
            return Ok(None);
        };
        self.apply_if_changed(actuator, before, &resolved).await?;
        Ok(Some(resolved))
    }

    /// The current resolved state of `actuator`, if it is tracked.
    pub fn resolved_state(&self, actuator: &ActuatorRef) -> Option<StateProposal> {
        self.resolved.get(actuator)
    }

    async fn apply_if_changed(
        &self,
        actuator: &ActuatorRef,
        before: Option<ActuatorState>,
        resolved: &StateProposal,
    ) -> Result<(), EngineError> {
        if before == Some(resolved.state) {
            debug!(%actuator, state = %resolved.state, "resolved state unchanged");
            return Ok(());
        }
        info!(
            %actuator,
            state = %resolved.state,
            source = %resolved.source,
            "resolved state changed"
        );
        self.publisher
            .publish(ActuatorCommand::from_proposal(actuator.clone(), resolved))
            .await?;
        self.failsafe.backup_state(actuator, resolved.state).await
    }

    // ── Processes ──────────────────────────────────────────────────

    /// Spawn (or restart) the evaluation process for `rule_id`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RuleUnavailable`] when the rule does not
    /// exist or is disabled, and [`EngineError::CapacityExceeded`] when
    /// the store is full and the rule's actuator is not already tracked.
    pub async fn start_process(&self, rule_id: RuleId) -> Result<ProcessId, EngineError> {
        let rule = self
            .rules
            .get(rule_id)
            .await?
            .filter(|r| r.enabled)
            .ok_or(EngineError::RuleUnavailable { id: rule_id })?;
        let id = self.processes.start(&rule, now())?;
        info!(rule = %rule_id, actuator = %rule.actuator, "evaluation process started");
        Ok(id)
    }

    /// Start a process for every enabled rule that is not already running.
    ///
    /// Used at boot to resume evaluation after a restart. Rules whose
    /// actuator is already tracked are left alone; a full store stops the
    /// sweep.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CapacityExceeded`] when the store fills up
    /// mid-sweep, or the repository's error when listing rules fails.
    pub async fn start_enabled_processes(&self) -> Result<usize, EngineError> {
        let mut started = 0;
        for rule in self.rules.get_enabled().await? {
            if self.processes.get(&rule.actuator).is_some() {
                continue;
            }
            self.processes.start(&rule, now())?;
            info!(rule = %rule.id, actuator = %rule.actuator, "evaluation process started");
            started += 1;
        }
        Ok(started)
    }

    /// Stop the process driving `actuator`. Idempotent.
    pub fn stop_process(&self, actuator: &ActuatorRef) -> bool {
        let stopped = self.processes.stop(actuator);
        if stopped {
            info!(%actuator, "evaluation process stopped");
        }
        stopped
    }

    /// Aggregate statistics over the running processes.
    pub fn process_stats(&self) -> ProcessStats {
        self.processes.stats(self.config.slow_threshold_ms)
    }

    // ── Events ─────────────────────────────────────────────────────

    /// Mark a named event as active. Returns `false` when it already was.
    pub fn assert_event(&self, name: impl Into<String>) -> bool {
        self.lock_events().insert(name.into())
    }

    /// Clear a named event. Returns `false` when it was not active.
    pub fn clear_event(&self, name: &str) -> bool {
        self.lock_events().remove(name)
    }

    /// Snapshot of the currently active event names.
    pub fn active_events(&self) -> HashSet<String> {
        self.lock_events().clone()
    }

    // ── Collaborator access (scheduler wiring) ─────────────────────

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn rules(&self) -> &R {
        &self.rules
    }

    pub fn processes(&self) -> &ProcessStore {
        &self.processes
    }

    pub fn failsafe(&self) -> &FailsafeCoordinator<P, B> {
        &self.failsafe
    }

    fn lock_events(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
