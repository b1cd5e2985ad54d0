//! Condition evaluator — pure decisions over sensor readings.
//!
//! Every condition passes a data-quality gate before its operator is even
//! looked at: a sample that is missing, non-numeric, stale, or outside the
//! sensor type's hardware range resolves to the condition's fallback value
//! instead of a comparison. Quality problems are never errors.

use std::collections::HashSet;

use edgehub_domain::rule::{Condition, EventCondition, FallbackStrategy, TimerWindow};
use edgehub_domain::sensor::Sample;
use edgehub_domain::time::Timestamp;

/// Ambient inputs of one evaluation pass.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub now: Timestamp,
    /// Samples older than this fail the quality gate.
    pub stale_after: chrono::Duration,
    /// Externally asserted event names.
    pub active_events: HashSet<String>,
}

impl EvaluationContext {
    /// Context with the default 5-minute staleness bound and no events.
    #[must_use]
    pub fn at(now: Timestamp) -> Self {
        Self {
            now,
            stale_after: chrono::Duration::minutes(5),
            active_events: HashSet::new(),
        }
    }
}

/// Result of evaluating one condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionOutcome {
    /// Whether the condition counts as true for this pass.
    pub holds: bool,
    /// Whether `holds` came from a trustworthy measurement (false when the
    /// quality gate substituted the fallback).
    pub measured: bool,
    /// Why the gate rejected the sample, when it did.
    pub gate_reason: Option<GateReason>,
}

impl ConditionOutcome {
    fn measured(holds: bool) -> Self {
        Self {
            holds,
            measured: true,
            gate_reason: None,
        }
    }

    fn fallback(holds: bool, reason: GateReason) -> Self {
        Self {
            holds,
            measured: false,
            gate_reason: Some(reason),
        }
    }
}

/// Which quality check rejected a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateReason {
    Missing,
    NonNumeric,
    Stale,
    OutOfRange,
}

impl std::fmt::Display for GateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Missing => "missing",
            Self::NonNumeric => "non-numeric",
            Self::Stale => "stale",
            Self::OutOfRange => "out-of-range",
        };
        f.write_str(name)
    }
}

/// Evaluate one condition against an optional sample.
///
/// `last` is the condition's most recent trustworthy result, consumed by
/// the [`FallbackStrategy::MaintainLast`] strategy (false when there is
/// none yet).
#[must_use]
pub fn evaluate_condition(
    condition: &Condition,
    sample: Option<&Sample>,
    last: Option<bool>,
    ctx: &EvaluationContext,
) -> ConditionOutcome {
    // Gate checks run in a fixed order; the first failure wins.
    let Some(sample) = sample else {
        return ConditionOutcome::fallback(
            fallback_value(condition.fallback, last),
            GateReason::Missing,
        );
    };
    let Some(value) = sample.as_f64() else {
        return ConditionOutcome::fallback(
            fallback_value(condition.fallback, last),
            GateReason::NonNumeric,
        );
    };
    if sample.age(ctx.now) > ctx.stale_after {
        return ConditionOutcome::fallback(
            fallback_value(condition.fallback, last),
            GateReason::Stale,
        );
    }
    if !condition.sensor_type.contains(value) {
        return ConditionOutcome::fallback(
            fallback_value(condition.fallback, last),
            GateReason::OutOfRange,
        );
    }
    ConditionOutcome::measured(condition.op.holds(value, condition.threshold))
}

fn fallback_value(strategy: FallbackStrategy, last: Option<bool>) -> bool {
    match strategy {
        FallbackStrategy::SafeOff => false,
        FallbackStrategy::SafeOn => true,
        FallbackStrategy::MaintainLast => last.unwrap_or(false),
        FallbackStrategy::UseDefault { value } => value,
    }
}

/// Whether at least one timer window is active, vacuously true when the
/// rule has no timers.
#[must_use]
pub fn timers_satisfied(timers: &[TimerWindow], now: Timestamp) -> bool {
    timers.is_empty() || timers.iter().any(|t| t.is_active_at(now))
}

/// Whether every event condition names a currently asserted event,
/// vacuously true when the rule has no events.
#[must_use]
pub fn events_satisfied(events: &[EventCondition], active: &HashSet<String>) -> bool {
    events.iter().all(|e| active.contains(&e.name))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc, Weekday};

    use super::*;
    use edgehub_domain::rule::CompareOp;
    use edgehub_domain::sensor::{SensorRef, SensorType};

    fn condition(op: CompareOp, threshold: f64, fallback: FallbackStrategy) -> Condition {
        Condition {
            sensor: SensorRef::new("esp1", 2),
            op,
            threshold,
            sensor_type: SensorType::Temperature,
            fallback,
        }
    }

    fn ctx() -> EvaluationContext {
        EvaluationContext::at(edgehub_domain::time::now())
    }

    #[test]
    fn should_compare_fresh_numeric_sample() {
        let ctx = ctx();
        let sample = Sample::numeric(26.0, ctx.now);
        let outcome = evaluate_condition(
            &condition(CompareOp::Gt, 25.0, FallbackStrategy::SafeOff),
            Some(&sample),
            None,
            &ctx,
        );
        assert!(outcome.holds);
        assert!(outcome.measured);
        assert!(outcome.gate_reason.is_none());
    }

    #[test]
    fn should_fall_back_when_sample_missing() {
        let outcome = evaluate_condition(
            &condition(CompareOp::Gt, 25.0, FallbackStrategy::SafeOn),
            None,
            None,
            &ctx(),
        );
        assert!(outcome.holds);
        assert!(!outcome.measured);
        assert_eq!(outcome.gate_reason, Some(GateReason::Missing));
    }

    #[test]
    fn should_fall_back_when_sample_non_numeric() {
        let ctx = ctx();
        let sample = Sample {
            value: serde_json::json!("warm"),
            timestamp: ctx.now,
        };
        let outcome = evaluate_condition(
            &condition(CompareOp::Gt, 25.0, FallbackStrategy::SafeOff),
            Some(&sample),
            None,
            &ctx,
        );
        assert!(!outcome.holds);
        assert_eq!(outcome.gate_reason, Some(GateReason::NonNumeric));
    }

    #[test]
    fn should_fall_back_when_sample_older_than_staleness_bound() {
        // Regardless of operator and threshold: the value 100.0 > 25.0
        // would hold, but the stale gate fires first.
        let ctx = ctx();
        let sample = Sample::numeric(100.0, ctx.now - chrono::Duration::minutes(6));
        let outcome = evaluate_condition(
            &condition(CompareOp::Gt, 25.0, FallbackStrategy::SafeOff),
            Some(&sample),
            None,
            &ctx,
        );
        assert!(!outcome.holds);
        assert_eq!(outcome.gate_reason, Some(GateReason::Stale));
    }

    #[test]
    fn should_accept_sample_exactly_at_staleness_bound() {
        let ctx = ctx();
        let sample = Sample::numeric(26.0, ctx.now - chrono::Duration::minutes(5));
        let outcome = evaluate_condition(
            &condition(CompareOp::Gt, 25.0, FallbackStrategy::SafeOff),
            Some(&sample),
            None,
            &ctx,
        );
        assert!(outcome.measured);
    }

    #[test]
    fn should_fall_back_when_value_outside_hardware_range() {
        let ctx = ctx();
        let sample = Sample::numeric(300.0, ctx.now); // impossible temperature
        let outcome = evaluate_condition(
            &condition(CompareOp::Gt, 25.0, FallbackStrategy::SafeOff),
            Some(&sample),
            None,
            &ctx,
        );
        assert!(!outcome.holds);
        assert_eq!(outcome.gate_reason, Some(GateReason::OutOfRange));
    }

    #[test]
    fn should_maintain_last_result_when_configured() {
        let c = condition(CompareOp::Gt, 25.0, FallbackStrategy::MaintainLast);
        let outcome = evaluate_condition(&c, None, Some(true), &ctx());
        assert!(outcome.holds);
        let outcome = evaluate_condition(&c, None, Some(false), &ctx());
        assert!(!outcome.holds);
        // no last known result yet: default to false
        let outcome = evaluate_condition(&c, None, None, &ctx());
        assert!(!outcome.holds);
    }

    #[test]
    fn should_use_configured_default_when_configured() {
        let c = condition(CompareOp::Gt, 25.0, FallbackStrategy::UseDefault { value: true });
        let outcome = evaluate_condition(&c, None, None, &ctx());
        assert!(outcome.holds);
    }

    // ── timers ─────────────────────────────────────────────────────

    fn monday_at(hour: u32, minute: u32) -> Timestamp {
        // 2024-01-01 was a Monday.
        Utc.with_ymd_and_hms(2024, 1, 1, hour, minute, 0).unwrap()
    }

    #[test]
    fn should_activate_overnight_window_at_2300_monday() {
        let window = TimerWindow::new(vec![Weekday::Mon], 1320, 360).unwrap();
        assert!(timers_satisfied(
            std::slice::from_ref(&window),
            monday_at(23, 0)
        ));
    }

    #[test]
    fn should_not_activate_overnight_window_at_1000_monday() {
        let window = TimerWindow::new(vec![Weekday::Mon], 1320, 360).unwrap();
        assert!(!timers_satisfied(
            std::slice::from_ref(&window),
            monday_at(10, 0)
        ));
    }

    #[test]
    fn should_check_current_weekday_when_window_crosses_midnight() {
        // Documented behavior: a Monday 22:00–06:00 window is checked
        // against the current weekday only, so Tuesday 01:00 is inactive
        // unless Tuesday itself is listed.
        let window = TimerWindow::new(vec![Weekday::Mon], 1320, 360).unwrap();
        let tuesday_0100 = Utc.with_ymd_and_hms(2024, 1, 2, 1, 0, 0).unwrap();
        assert!(!timers_satisfied(std::slice::from_ref(&window), tuesday_0100));

        let both_days = TimerWindow::new(vec![Weekday::Mon, Weekday::Tue], 1320, 360).unwrap();
        assert!(timers_satisfied(
            std::slice::from_ref(&both_days),
            tuesday_0100
        ));
    }

    #[test]
    fn should_satisfy_timers_vacuously_when_empty() {
        assert!(timers_satisfied(&[], monday_at(12, 0)));
    }

    // ── events ─────────────────────────────────────────────────────

    #[test]
    fn should_satisfy_events_only_when_all_asserted() {
        let events = vec![
            EventCondition::new("season:summer"),
            EventCondition::new("tank:full"),
        ];
        let mut active = HashSet::new();
        active.insert("season:summer".to_string());
        assert!(!events_satisfied(&events, &active));
        active.insert("tank:full".to_string());
        assert!(events_satisfied(&events, &active));
    }

    #[test]
    fn should_satisfy_events_vacuously_when_empty() {
        assert!(events_satisfied(&[], &HashSet::new()));
    }
}
