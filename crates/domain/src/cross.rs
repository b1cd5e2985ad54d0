//! Cross-controller rule — triggers, conditions, and actions that may each
//! name a device on a different field controller.
//!
//! Where a [`LogicRule`](crate::rule::LogicRule) drives a single actuator,
//! a cross-controller rule fans out to any number of targets and carries
//! metadata enumerating every controller and zone involved, so callers can
//! answer impact queries ("what breaks if esp3 goes down?") without walking
//! the predicate lists.

use serde::{Deserialize, Serialize};

use crate::actuator::{ActuatorRef, ActuatorState};
use crate::error::{EngineError, ValidationError};
use crate::id::{ControllerId, RuleId, ZoneId};
use crate::rule::Condition;
use crate::time::Timestamp;

/// One output to drive when the rule fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAction {
    pub target: ActuatorRef,
    pub state: ActuatorState,
}

/// Controllers and zones a rule touches, maintained alongside the rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMetadata {
    pub controllers: Vec<ControllerId>,
    pub zones: Vec<ZoneId>,
}

/// Result of probing one remote trigger or condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckStatus {
    pub active: bool,
    /// Why an inactive check is inactive ("timeout", "condition false", …).
    pub reason: String,
}

impl CheckStatus {
    #[must_use]
    pub fn active() -> Self {
        Self {
            active: true,
            reason: "ok".to_string(),
        }
    }

    #[must_use]
    pub fn inactive(reason: impl Into<String>) -> Self {
        Self {
            active: false,
            reason: reason.into(),
        }
    }

    /// The negative result a timed-out remote fetch collapses to.
    #[must_use]
    pub fn timeout() -> Self {
        Self::inactive("timeout")
    }
}

/// Per-action delivery result of a best-effort fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub target: ActuatorRef,
    pub success: bool,
    pub detail: Option<String>,
    pub at: Timestamp,
}

/// A rule whose triggers, conditions, and actions span field controllers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossControllerRule {
    pub id: RuleId,
    pub name: String,
    /// Sensor predicates that initiate evaluation. ANDed with `conditions`.
    pub triggers: Vec<Condition>,
    /// Guard predicates. ANDed with `triggers`.
    pub conditions: Vec<Condition>,
    pub actions: Vec<RemoteAction>,
    pub enabled: bool,
    /// Applied to every action target when evaluation itself fails.
    pub failsafe_state: ActuatorState,
    pub metadata: RuleMetadata,
}

impl CrossControllerRule {
    /// Create a builder for constructing a [`CrossControllerRule`].
    #[must_use]
    pub fn builder() -> CrossControllerRuleBuilder {
        CrossControllerRuleBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] when the name is empty or the
    /// rule has no actions.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.actions.is_empty() {
            return Err(ValidationError::NoActions.into());
        }
        Ok(())
    }

    /// Whether this rule involves the given zone.
    #[must_use]
    pub fn touches_zone(&self, zone: &ZoneId) -> bool {
        self.metadata.zones.contains(zone)
    }

    /// Whether this rule reads or drives the given (controller, pin).
    #[must_use]
    pub fn touches_device(&self, controller: &ControllerId, pin: u8) -> bool {
        self.triggers
            .iter()
            .chain(&self.conditions)
            .any(|c| &c.sensor.controller == controller && c.sensor.pin == pin)
            || self
                .actions
                .iter()
                .any(|a| &a.target.controller == controller && a.target.pin == pin)
    }

    /// Every controller named by a trigger, condition, or action.
    #[must_use]
    pub fn involved_controllers(&self) -> Vec<ControllerId> {
        let mut controllers: Vec<ControllerId> = self
            .triggers
            .iter()
            .chain(&self.conditions)
            .map(|c| c.sensor.controller.clone())
            .chain(self.actions.iter().map(|a| a.target.controller.clone()))
            .collect();
        controllers.sort();
        controllers.dedup();
        controllers
    }
}

/// Step-by-step builder for [`CrossControllerRule`].
#[derive(Debug, Default)]
pub struct CrossControllerRuleBuilder {
    id: Option<RuleId>,
    name: Option<String>,
    triggers: Vec<Condition>,
    conditions: Vec<Condition>,
    actions: Vec<RemoteAction>,
    enabled: Option<bool>,
    failsafe_state: Option<ActuatorState>,
    zones: Vec<ZoneId>,
}

impl CrossControllerRuleBuilder {
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
    pub fn trigger(mut self, trigger: Condition) -> Self {
        self.triggers.push(trigger);
        self
    }

    #[must_use]
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn action(mut self, action: RemoteAction) -> Self {
        self.actions.push(action);
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn failsafe_state(mut self, state: ActuatorState) -> Self {
        self.failsafe_state = Some(state);
        self
    }

    #[must_use]
    pub fn zone(mut self, zone: impl Into<ZoneId>) -> Self {
        self.zones.push(zone.into());
        self
    }

    /// Consume the builder, derive the metadata, validate, and return the
    /// rule.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] if required fields are missing
    /// or empty.
    pub fn build(self) -> Result<CrossControllerRule, EngineError> {
        let mut rule = CrossControllerRule {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            triggers: self.triggers,
            conditions: self.conditions,
            actions: self.actions,
            enabled: self.enabled.unwrap_or(true),
            failsafe_state: self.failsafe_state.unwrap_or(ActuatorState::Off),
            metadata: RuleMetadata {
                controllers: Vec::new(),
                zones: self.zones,
            },
        };
        rule.metadata.controllers = rule.involved_controllers();
        rule.validate()?;
        Ok(rule)
    }
}
