//! Logic rule — conditions, timer windows, and events bound to one actuator.
//!
//! Rules are externally authored and immutable during an evaluation pass.
//! A rule fires when **all** conditions hold, **some** timer window is
//! active, and **all** events are satisfied; an empty category is vacuously
//! satisfied.

use chrono::{Datelike, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::actuator::{ActuatorKind, ActuatorRef, ActuatorState};
use crate::error::{EngineError, ValidationError};
use crate::id::RuleId;
use crate::sensor::{SensorRef, SensorType};
use crate::time::Timestamp;

/// Numeric comparison between a sample value and a condition threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

impl CompareOp {
    /// Apply the comparison to `value` against `threshold`.
    #[must_use]
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Lt => value < threshold,
            Self::Ge => value >= threshold,
            Self::Le => value <= threshold,
            Self::Eq => (value - threshold).abs() < f64::EPSILON,
            Self::Ne => (value - threshold).abs() >= f64::EPSILON,
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
        };
        f.write_str(symbol)
    }
}

/// What a condition evaluates to when its sample cannot be trusted
/// (missing, non-numeric, stale, or outside the hardware range).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FallbackStrategy {
    /// Treat the condition as false so the actuator tends toward off.
    SafeOff,
    /// Treat the condition as true.
    SafeOn,
    /// Reuse the last result computed from a trustworthy sample.
    MaintainLast,
    /// A fixed per-condition answer.
    UseDefault { value: bool },
}

impl Default for FallbackStrategy {
    fn default() -> Self {
        Self::SafeOff
    }
}

/// A predicate over one sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Sensor to read; may live on a different controller than the rule's
    /// actuator.
    pub sensor: SensorRef,
    pub op: CompareOp,
    pub threshold: f64,
    pub sensor_type: SensorType,
    #[serde(default)]
    pub fallback: FallbackStrategy,
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.sensor, self.op, self.threshold)
    }
}

/// A weekly activation window in minutes since midnight.
///
/// When `start > end` the window crosses midnight: active from `start`
/// until the end of day and from the start of day until `end`. The weekday
/// check always uses the current day, also past midnight, so a window
/// `{Mon, 22:00–06:00}` is active Tuesday 01:00 only if Tuesday is listed.
/// That behavior is pinned by a test in the evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerWindow {
    pub days: Vec<Weekday>,
    /// Window start, minutes since midnight (0–1439).
    pub start_min: u16,
    /// Window end, minutes since midnight (0–1439), inclusive.
    pub end_min: u16,
}

impl TimerWindow {
    /// Build a window, validating the minute bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MinutesOutOfRange`] when either bound is
    /// 1440 or more.
    pub fn new(days: Vec<Weekday>, start_min: u16, end_min: u16) -> Result<Self, ValidationError> {
        for bound in [start_min, end_min] {
            if bound >= 1440 {
                return Err(ValidationError::MinutesOutOfRange(bound));
            }
        }
        Ok(Self {
            days,
            start_min,
            end_min,
        })
    }

    /// Whether the window is active for a given weekday and minute of day.
    #[must_use]
    pub fn contains(&self, weekday: Weekday, minute: u16) -> bool {
        if !self.days.contains(&weekday) {
            return false;
        }
        if self.start_min <= self.end_min {
            (self.start_min..=self.end_min).contains(&minute)
        } else {
            minute >= self.start_min || minute <= self.end_min
        }
    }

    /// Whether the window is active at `now` (UTC).
    #[must_use]
    pub fn is_active_at(&self, now: Timestamp) -> bool {
        let minute = u16::try_from(now.hour() * 60 + now.minute()).unwrap_or(0);
        self.contains(now.weekday(), minute)
    }
}

/// A named external event that must be asserted for the rule to fire.
///
/// Events are asserted and cleared by collaborators (alert subsystem,
/// operator actions) and checked against the evaluation context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCondition {
    pub name: String,
}

impl EventCondition {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// An automation rule binding conditions, timers, and events to one
/// actuator's desired state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicRule {
    pub id: RuleId,
    pub name: String,
    pub actuator: ActuatorRef,
    pub kind: ActuatorKind,
    pub conditions: Vec<Condition>,
    pub timers: Vec<TimerWindow>,
    pub events: Vec<EventCondition>,
    pub enabled: bool,
    /// State requested while the rule fires; the actuator falls back to
    /// off (via a Logic proposal) when it stops firing.
    pub active_state: ActuatorState,
    /// Whether evaluation failures force the failsafe state.
    pub failsafe_enabled: bool,
    /// Safety-preferred output applied when evaluation cannot be trusted.
    pub failsafe_state: ActuatorState,
}

impl LogicRule {
    /// Create a builder for constructing a [`LogicRule`].
    #[must_use]
    pub fn builder() -> LogicRuleBuilder {
        LogicRuleBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] when:
    /// - `name` is empty ([`ValidationError::EmptyName`])
    /// - no condition, timer, or event is present ([`ValidationError::EmptyRule`])
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.conditions.is_empty() && self.timers.is_empty() && self.events.is_empty() {
            return Err(ValidationError::EmptyRule.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`LogicRule`].
#[derive(Debug, Default)]
pub struct LogicRuleBuilder {
    id: Option<RuleId>,
    name: Option<String>,
    actuator: Option<ActuatorRef>,
    kind: Option<ActuatorKind>,
    conditions: Vec<Condition>,
    timers: Vec<TimerWindow>,
    events: Vec<EventCondition>,
    enabled: Option<bool>,
    active_state: Option<ActuatorState>,
    failsafe_enabled: Option<bool>,
    failsafe_state: Option<ActuatorState>,
}

impl LogicRuleBuilder {
    #[must_use]
    pub fn id(mut self, id: RuleId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn actuator(mut self, actuator: ActuatorRef) -> Self {
        self.actuator = Some(actuator);
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: ActuatorKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn timer(mut self, timer: TimerWindow) -> Self {
        self.timers.push(timer);
        self
    }

    #[must_use]
    pub fn event(mut self, event: EventCondition) -> Self {
        self.events.push(event);
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn active_state(mut self, state: ActuatorState) -> Self {
        self.active_state = Some(state);
        self
    }

    #[must_use]
    pub fn failsafe(mut self, enabled: bool, state: ActuatorState) -> Self {
        self.failsafe_enabled = Some(enabled);
        self.failsafe_state = Some(state);
        self
    }

    /// Consume the builder, validate, and return a [`LogicRule`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] if required fields are missing
    /// or empty.
    pub fn build(self) -> Result<LogicRule, EngineError> {
        let rule = LogicRule {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            actuator: self
                .actuator
                .unwrap_or_else(|| ActuatorRef::new("unassigned", 0)),
            kind: self.kind.unwrap_or(ActuatorKind::Unknown),
            conditions: self.conditions,
            timers: self.timers,
            events: self.events,
            enabled: self.enabled.unwrap_or(true),
            active_state: self.active_state.unwrap_or(ActuatorState::On),
            failsafe_enabled: self.failsafe_enabled.unwrap_or(false),
            failsafe_state: self.failsafe_state.unwrap_or(ActuatorState::Off),
        };
        rule.validate()?;
        Ok(rule)
    }
}
