//! In-memory rule repository.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use edgehub_app::ports::RuleRepository;
use edgehub_domain::error::EngineError;
use edgehub_domain::id::RuleId;
use edgehub_domain::rule::LogicRule;

/// Rule store for demos and tests; rules are validated on insert.
#[derive(Default)]
pub struct InMemoryRuleRepository {
    rules: Mutex<HashMap<RuleId, LogicRule>>,
}

impl InMemoryRuleRepository {
    /// Insert (or replace) a rule.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] when the rule is invalid.
    pub fn insert(&self, rule: LogicRule) -> Result<(), EngineError> {
        rule.validate()?;
        self.lock().insert(rule.id, rule);
        Ok(())
    }

    /// Remove a rule. Returns `false` when it was not present.
    pub fn remove(&self, id: RuleId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Flip a rule's enabled flag. Returns `false` when it was not present.
    pub fn set_enabled(&self, id: RuleId, enabled: bool) -> bool {
        self.lock()
            .get_mut(&id)
            .map(|rule| rule.enabled = enabled)
            .is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RuleId, LogicRule>> {
        self.rules.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RuleRepository for InMemoryRuleRepository {
    async fn get(&self, id: RuleId) -> Result<Option<LogicRule>, EngineError> {
        Ok(self.lock().get(&id).cloned())
    }

    async fn get_enabled(&self) -> Result<Vec<LogicRule>, EngineError> {
        Ok(self
            .lock()
            .values()
            .filter(|r| r.enabled)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgehub_domain::actuator::ActuatorRef;
    use edgehub_domain::rule::{CompareOp, Condition, FallbackStrategy};
    use edgehub_domain::sensor::{SensorRef, SensorType};

    fn rule(name: &str) -> LogicRule {
        LogicRule::builder()
            .name(name)
            .actuator(ActuatorRef::new("esp1", 5))
            .condition(Condition {
                sensor: SensorRef::new("esp1", 2),
                op: CompareOp::Gt,
                threshold: 25.0,
                sensor_type: SensorType::Temperature,
                fallback: FallbackStrategy::SafeOff,
            })
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_insert_and_fetch_rule() {
        let repo = InMemoryRuleRepository::default();
        let rule = rule("fan when hot");
        let id = rule.id;
        repo.insert(rule).unwrap();

        let fetched = repo.get(id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "fan when hot");
    }

    #[tokio::test]
    async fn should_reject_invalid_rule_on_insert() {
        let repo = InMemoryRuleRepository::default();
        let mut invalid = rule("broken");
        invalid.name.clear();
        assert!(repo.insert(invalid).is_err());
    }

    #[tokio::test]
    async fn should_filter_disabled_rules_from_get_enabled() {
        let repo = InMemoryRuleRepository::default();
        let first = rule("a");
        let second = rule("b");
        let second_id = second.id;
        repo.insert(first).unwrap();
        repo.insert(second).unwrap();

        assert!(repo.set_enabled(second_id, false));
        let enabled = repo.get_enabled().await.unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name, "a");
    }

    #[tokio::test]
    async fn should_remove_rule_idempotently() {
        let repo = InMemoryRuleRepository::default();
        let rule = rule("gone");
        let id = rule.id;
        repo.insert(rule).unwrap();

        assert!(repo.remove(id));
        assert!(!repo.remove(id));
        assert!(repo.get(id).await.unwrap().is_none());
    }
}
