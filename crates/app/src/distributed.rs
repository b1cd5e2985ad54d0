//! Distributed logic coordinator — evaluation of rules that span field
//! controllers.
//!
//! Remote fetches are individually bounded: a fetch that exceeds its
//! deadline collapses to an inactive check ("timeout") and the rule simply
//! does not fire this round. A fetch that *errors* is different — the
//! evaluation cannot be trusted, so every action target is forced to the
//! rule's failsafe state.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use edgehub_domain::cross::{ActionOutcome, CheckStatus, CrossControllerRule, RemoteAction};
use edgehub_domain::error::EngineError;
use edgehub_domain::id::{ControllerId, RuleId, ZoneId};
use edgehub_domain::proposal::{ActuatorCommand, ProposalSource, StateProposal};
use edgehub_domain::rule::Condition;
use edgehub_domain::time::now;

use crate::config::EngineConfig;
use crate::evaluator::{self, EvaluationContext};
use crate::failsafe::FailsafeCoordinator;
use crate::ports::{BackupRepository, CommandPublisher, SampleSource, Topology};

/// Everything one evaluation round produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossEvaluationReport {
    pub rule_id: RuleId,
    /// Whether every trigger and condition was active.
    pub fired: bool,
    /// Per-check results, triggers first, in rule order.
    pub checks: Vec<CheckStatus>,
    /// Per-action delivery results; empty when the rule did not fire.
    pub actions: Vec<ActionOutcome>,
    /// Whether an evaluation failure forced the failsafe state on every
    /// action target.
    pub failsafe_applied: bool,
}

/// Registers and evaluates [`CrossControllerRule`]s.
pub struct DistributedLogicCoordinator<S, P, B, T> {
    samples: S,
    publisher: P,
    topology: T,
    failsafe: FailsafeCoordinator<P, B>,
    rules: Mutex<HashMap<RuleId, CrossControllerRule>>,
    fetch_timeout: Duration,
    stale_after: chrono::Duration,
}

impl<S, P, B, T> DistributedLogicCoordinator<S, P, B, T>
where
    S: SampleSource,
    P: CommandPublisher + Clone,
    B: BackupRepository,
    T: Topology,
{
    pub fn new(samples: S, publisher: P, topology: T, backups: B, config: &EngineConfig) -> Self {
        Self {
            samples,
            failsafe: FailsafeCoordinator::new(publisher.clone(), backups),
            publisher,
            topology,
            rules: Mutex::new(HashMap::new()),
            fetch_timeout: config.fetch_timeout,
            stale_after: config.stale_after_chrono(),
        }
    }

    // ── Registry ───────────────────────────────────────────────────

    /// Register (or replace) a rule.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] when the rule is invalid.
    pub fn register(&self, rule: CrossControllerRule) -> Result<(), EngineError> {
        rule.validate()?;
        info!(rule = %rule.id, name = %rule.name, "cross-controller rule registered");
        self.lock().insert(rule.id, rule);
        Ok(())
    }

    /// Remove a rule. Returns `false` when it was not registered.
    pub fn remove(&self, id: RuleId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Look up a registered rule.
    pub fn get(&self, id: RuleId) -> Option<CrossControllerRule> {
        self.lock().get(&id).cloned()
    }

    /// Every rule involving the given zone.
    pub fn rules_touching_zone(&self, zone: &ZoneId) -> Vec<CrossControllerRule> {
        self.lock()
            .values()
            .filter(|r| r.touches_zone(zone))
            .cloned()
            .collect()
    }

    /// Every rule reading or driving the given (controller, pin).
    pub fn rules_touching_device(
        &self,
        controller: &ControllerId,
        pin: u8,
    ) -> Vec<CrossControllerRule> {
        self.lock()
            .values()
            .filter(|r| r.touches_device(controller, pin))
            .cloned()
            .collect()
    }

    // ── Evaluation ─────────────────────────────────────────────────

    /// Evaluate one registered rule end to end.
    ///
    /// Disabled rules report `fired: false` without probing anything. When
    /// a probe errors, every action target is forced to the rule's
    /// failsafe state and the report says so — the error itself is
    /// swallowed here because the failsafe already handled it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RuleUnavailable`] when the rule is not
    /// registered.
    pub async fn evaluate(&self, id: RuleId) -> Result<CrossEvaluationReport, EngineError> {
        let rule = self
            .get(id)
            .ok_or(EngineError::RuleUnavailable { id })?;
        if !rule.enabled {
            return Ok(CrossEvaluationReport {
                rule_id: id,
                fired: false,
                checks: Vec::new(),
                actions: Vec::new(),
                failsafe_applied: false,
            });
        }

        let ctx = EvaluationContext {
            now: now(),
            stale_after: self.stale_after,
            active_events: HashSet::new(),
        };
        let mut checks = Vec::new();
        for condition in rule.triggers.iter().chain(&rule.conditions) {
            match self.probe(condition, &ctx).await {
                Ok(status) => checks.push(status),
                Err(err) => {
                    warn!(rule = %id, %err, "cross-controller evaluation failed, forcing failsafe");
                    let actions = self.force_failsafe(&rule).await;
                    return Ok(CrossEvaluationReport {
                        rule_id: id,
                        fired: false,
                        checks,
                        actions,
                        failsafe_applied: true,
                    });
                }
            }
        }

        let fired = checks.iter().all(|c| c.active);
        let actions = if fired {
            self.fire(&rule).await
        } else {
            Vec::new()
        };
        Ok(CrossEvaluationReport {
            rule_id: id,
            fired,
            checks,
            actions,
            failsafe_applied: false,
        })
    }

    /// Probe one remote predicate, bounding the fetch.
    async fn probe(
        &self,
        condition: &Condition,
        ctx: &EvaluationContext,
    ) -> Result<CheckStatus, EngineError> {
        let via = self
            .topology
            .resolve_controller(&condition.sensor.controller)
            .await?;
        debug!(sensor = %condition.sensor, %via, "probing remote condition");

        let fetched =
            tokio::time::timeout(self.fetch_timeout, self.samples.fetch(&condition.sensor)).await;
        let sample = match fetched {
            // a slow remote is a negative answer, not a failure
            Err(_) => return Ok(CheckStatus::timeout()),
            Ok(result) => result?,
        };

        let outcome = evaluator::evaluate_condition(condition, sample.as_ref(), None, ctx);
        if outcome.holds {
            Ok(CheckStatus::active())
        } else if let Some(gate) = outcome.gate_reason {
            Ok(CheckStatus::inactive(gate.to_string()))
        } else {
            Ok(CheckStatus::inactive(format!("{condition} is false")))
        }
    }

    /// Best-effort fan-out of every action; one failed target never stops
    /// the others.
    async fn fire(&self, rule: &CrossControllerRule) -> Vec<ActionOutcome> {
        info!(rule = %rule.id, name = %rule.name, actions = rule.actions.len(), "cross-controller rule fired");
        join_all(rule.actions.iter().map(|action| self.deliver(rule, action))).await
    }

    async fn deliver(&self, rule: &CrossControllerRule, action: &RemoteAction) -> ActionOutcome {
        let at = now();
        let command = ActuatorCommand::from_proposal(
            action.target.clone(),
            &StateProposal::new(
                action.state,
                ProposalSource::Logic,
                format!("rule '{}' fired", rule.name),
                at,
            ),
        );
        match self.publisher.publish(command).await {
            Ok(()) => ActionOutcome {
                target: action.target.clone(),
                success: true,
                detail: None,
                at,
            },
            Err(err) => {
                warn!(target = %action.target, %err, "action delivery failed");
                ActionOutcome {
                    target: action.target.clone(),
                    success: false,
                    detail: Some(err.to_string()),
                    at,
                }
            }
        }
    }

    async fn force_failsafe(&self, rule: &CrossControllerRule) -> Vec<ActionOutcome> {
        join_all(rule.actions.iter().map(|action| async move {
            let at = now();
            match self
                .failsafe
                .activate(&action.target, rule.failsafe_state)
                .await
            {
                Ok(()) => ActionOutcome {
                    target: action.target.clone(),
                    success: true,
                    detail: Some("failsafe".to_string()),
                    at,
                },
                Err(err) => ActionOutcome {
                    target: action.target.clone(),
                    success: false,
                    detail: Some(err.to_string()),
                    at,
                },
            }
        }))
        .await
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RuleId, CrossControllerRule>> {
        self.rules.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
