//! Evaluation scheduler — fixed-cadence, race-free batch evaluation.
//!
//! One tick evaluates every running process: sorted by resolved-state
//! priority (highest first), oldest evaluation first within a priority,
//! then worked through in fixed-size concurrent batches with a pause in
//! between to bound burst load on the transport. A tick that starts while
//! the previous one still runs is skipped, never queued; the skip count is
//! observable for monitoring.

use std::cmp::Reverse;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use edgehub_domain::actuator::ActuatorState;
use edgehub_domain::error::{EngineError, TimeoutError};
use edgehub_domain::process::{DiagnosticRecord, LogicProcess, TriggerRecord};
use edgehub_domain::proposal::{ProposalSource, StateProposal};
use edgehub_domain::rule::LogicRule;
use edgehub_domain::time::now;

use crate::engine::ControlEngine;
use crate::evaluator::{self, EvaluationContext};
use crate::ports::{BackupRepository, CommandPublisher, RuleRepository, SampleSource};

/// What one tick did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// The previous tick was still running; nothing was evaluated.
    pub skipped: bool,
    /// Processes evaluated to completion.
    pub evaluated: usize,
    /// Evaluations whose result changed the actuator state.
    pub flips: usize,
    /// Evaluations that errored or timed out.
    pub failures: usize,
    /// Processes removed because their rule vanished or was disabled.
    pub removed: usize,
}

impl TickReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

enum PassOutcome {
    Flipped,
    Steady,
    Failed,
    Removed,
}

/// Drives periodic evaluation of every running process.
pub struct EvaluationScheduler<R, P, B, S> {
    engine: Arc<ControlEngine<R, P, B>>,
    samples: S,
    run_lock: tokio::sync::Mutex<()>,
    prevented_races: AtomicU64,
    running: AtomicBool,
    shutdown: Notify,
}

impl<R, P, B, S> EvaluationScheduler<R, P, B, S>
where
    R: RuleRepository,
    P: CommandPublisher + Clone,
    B: BackupRepository,
    S: SampleSource,
{
    pub fn new(engine: Arc<ControlEngine<R, P, B>>, samples: S) -> Self {
        Self {
            engine,
            samples,
            run_lock: tokio::sync::Mutex::new(()),
            prevented_races: AtomicU64::new(0),
            running: AtomicBool::new(false),
            shutdown: Notify::new(),
        }
    }

    /// Run the scheduler loop until [`stop`](Self::stop) is called.
    pub async fn run(&self) {
        self.running.store(true, Ordering::SeqCst);
        info!(
            tick = ?self.engine.config().tick_interval,
            "evaluation scheduler started"
        );
        let mut interval = tokio::time::interval(self.engine.config().tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.tick().await;
                    if report.failures > 0 {
                        warn!(failures = report.failures, evaluated = report.evaluated, "tick finished with failures");
                    } else {
                        debug!(evaluated = report.evaluated, flips = report.flips, "tick finished");
                    }
                }
                () = self.shutdown.notified() => break,
            }
        }
        self.running.store(false, Ordering::SeqCst);
        info!("evaluation scheduler stopped");
    }

    /// Request the loop to exit after the tick in progress.
    pub fn stop(&self) {
        self.shutdown.notify_one();
    }

    /// Whether the loop is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// How many ticks were skipped because the previous one still ran.
    pub fn prevented_races(&self) -> u64 {
        self.prevented_races.load(Ordering::SeqCst)
    }

    /// Evaluate every running process once.
    ///
    /// Returns a skipped report without touching anything when a previous
    /// tick still holds the run lock.
    pub async fn tick(&self) -> TickReport {
        let Ok(_guard) = self.run_lock.try_lock() else {
            self.prevented_races.fetch_add(1, Ordering::SeqCst);
            debug!("tick skipped, previous evaluation pass still running");
            return TickReport::skipped();
        };

        let mut snapshot = self.engine.processes().snapshot_running();
        snapshot.sort_by_key(|p| {
            let priority = self
                .engine
                .resolved_state(&p.actuator)
                .map_or(0, |r| r.priority());
            // never-evaluated processes sort before any timestamp
            (Reverse(priority), p.last_evaluation)
        });

        let mut report = TickReport::default();
        let batch_size = self.engine.config().batch_size.max(1);
        let mut batches = snapshot.chunks(batch_size).peekable();
        while let Some(batch) = batches.next() {
            let outcomes = join_all(batch.iter().map(|p| self.evaluate_one(p))).await;
            for outcome in outcomes {
                match outcome {
                    PassOutcome::Flipped => {
                        report.evaluated += 1;
                        report.flips += 1;
                    }
                    PassOutcome::Steady => report.evaluated += 1,
                    PassOutcome::Failed => report.failures += 1,
                    PassOutcome::Removed => report.removed += 1,
                }
            }
            if batches.peek().is_some() {
                tokio::time::sleep(self.engine.config().batch_pause).await;
            }
        }
        report
    }

    async fn evaluate_one(&self, process: &LogicProcess) -> PassOutcome {
        let rule = match self.engine.rules().get(process.rule_id).await {
            Ok(Some(rule)) if rule.enabled => rule,
            Ok(_) => {
                // the rule vanished or was disabled; the process follows it out
                self.engine.stop_process(&process.actuator);
                return PassOutcome::Removed;
            }
            Err(err) => {
                warn!(rule = %process.rule_id, %err, "rule lookup failed");
                return self.fail(process, None, err.to_string()).await;
            }
        };

        let started = Instant::now();
        let bound = self.engine.config().evaluation_timeout;
        match tokio::time::timeout(bound, self.evaluate_rule(&rule, process)).await {
            Ok(Ok((fired, results))) => {
                self.finish(process, &rule, fired, results, started).await
            }
            Ok(Err(err)) => self.fail(process, Some(&rule), err.to_string()).await,
            Err(_) => {
                let err = TimeoutError::evaluation(rule.id, bound);
                self.fail(process, Some(&rule), err.to_string()).await
            }
        }
    }

    /// Fetch every condition's sample and decide whether the rule fires.
    ///
    /// Returns the fire decision together with the refreshed per-condition
    /// memory for the `MaintainLast` fallback.
    async fn evaluate_rule(
        &self,
        rule: &LogicRule,
        process: &LogicProcess,
    ) -> Result<(bool, Vec<Option<bool>>), EngineError> {
        let at = now();
        let ctx = EvaluationContext {
            now: at,
            stale_after: self.engine.config().stale_after_chrono(),
            active_events: self.engine.active_events(),
        };

        let mut all_hold = true;
        let mut results = Vec::with_capacity(rule.conditions.len());
        for (index, condition) in rule.conditions.iter().enumerate() {
            let sample = self.samples.fetch(&condition.sensor).await?;
            let last = process
                .last_condition_results
                .get(index)
                .copied()
                .flatten();
            let outcome = evaluator::evaluate_condition(condition, sample.as_ref(), last, &ctx);
            all_hold &= outcome.holds;
            results.push(if outcome.measured {
                Some(outcome.holds)
            } else {
                last
            });
        }

        let fired = all_hold
            && evaluator::timers_satisfied(&rule.timers, at)
            && evaluator::events_satisfied(&rule.events, &ctx.active_events);
        Ok((fired, results))
    }

    async fn finish(
        &self,
        process: &LogicProcess,
        rule: &LogicRule,
        fired: bool,
        results: Vec<Option<bool>>,
        started: Instant,
    ) -> PassOutcome {
        let at = now();
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let desired = if fired { rule.active_state } else { ActuatorState::Off };
        let flipped = process.current_state != Some(desired);
        let reason = if fired {
            format!("rule '{}' fired", rule.name)
        } else {
            format!("rule '{}' released", rule.name)
        };

        let updated = self.engine.processes().update(&process.actuator, |p| {
            p.mark_evaluated(at, elapsed_ms);
            p.last_condition_results = results;
            if flipped {
                p.record_trigger(TriggerRecord {
                    at,
                    state: desired,
                    reason: reason.clone(),
                });
            }
        });
        if !updated {
            // stopped mid-flight; the result is discarded
            debug!(actuator = %process.actuator, "process gone, discarding evaluation result");
            return PassOutcome::Removed;
        }
        if !flipped {
            return PassOutcome::Steady;
        }

        let proposal = StateProposal::new(desired, ProposalSource::Logic, reason, at);
        if let Err(err) = self
            .engine
            .submit_proposal(&process.actuator, rule.kind, proposal)
            .await
        {
            warn!(actuator = %process.actuator, %err, "failed to push state flip");
            return PassOutcome::Failed;
        }
        PassOutcome::Flipped
    }

    async fn fail(
        &self,
        process: &LogicProcess,
        rule: Option<&LogicRule>,
        message: String,
    ) -> PassOutcome {
        warn!(actuator = %process.actuator, %message, "evaluation failed");
        let mut failsafe_applied = false;
        if let Some(rule) = rule.filter(|r| r.failsafe_enabled) {
            match self
                .engine
                .failsafe()
                .activate(&process.actuator, rule.failsafe_state)
                .await
            {
                Ok(()) => failsafe_applied = true,
                Err(err) => warn!(actuator = %process.actuator, %err, "failsafe activation failed"),
            }
        }
        self.engine.processes().update(&process.actuator, |p| {
            p.record_diagnostic(DiagnosticRecord {
                at: now(),
                message,
                failsafe_applied,
            });
        });
        PassOutcome::Failed
    }
}
