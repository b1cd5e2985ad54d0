//! In-memory fakes shared by the engine unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use edgehub_domain::actuator::ActuatorRef;
use edgehub_domain::error::{CommandDeliveryError, EngineError};
use edgehub_domain::id::RuleId;
use edgehub_domain::proposal::ActuatorCommand;
use edgehub_domain::rule::LogicRule;
use edgehub_domain::sensor::{Sample, SensorRef};

use crate::ports::{
    BackupKind, BackupRecord, BackupRepository, CommandPublisher, RuleRepository, SampleSource,
    Topology,
};
use edgehub_domain::id::ControllerId;

/// Records every published command; optionally refuses delivery.
#[derive(Default)]
pub struct SpyPublisher {
    commands: Mutex<Vec<ActuatorCommand>>,
    fail: bool,
}

impl SpyPublisher {
    pub fn failing() -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn published(&self) -> Vec<ActuatorCommand> {
        self.commands.lock().unwrap().clone()
    }
}

impl CommandPublisher for SpyPublisher {
    async fn publish(&self, command: ActuatorCommand) -> Result<(), EngineError> {
        if self.fail {
            return Err(CommandDeliveryError {
                target: command.target.clone(),
                controller: command.target.controller.clone(),
                detail: "injected".to_string(),
            }
            .into());
        }
        self.commands.lock().unwrap().push(command);
        Ok(())
    }
}

/// One record per (actuator, kind), newest write wins.
#[derive(Default)]
pub struct InMemoryBackups {
    store: Mutex<Vec<BackupRecord>>,
}

impl InMemoryBackups {
    pub fn put(&self, record: BackupRecord) {
        self.store.lock().unwrap().push(record);
    }

    pub fn saved(&self) -> Vec<BackupRecord> {
        self.store.lock().unwrap().clone()
    }
}

impl BackupRepository for InMemoryBackups {
    async fn save(&self, record: BackupRecord) -> Result<(), EngineError> {
        let mut store = self.store.lock().unwrap();
        store.retain(|r| !(r.actuator == record.actuator && r.kind == record.kind));
        store.push(record);
        Ok(())
    }

    async fn load(
        &self,
        actuator: &ActuatorRef,
        kind: BackupKind,
    ) -> Result<Option<BackupRecord>, EngineError> {
        let store = self.store.lock().unwrap();
        Ok(store
            .iter()
            .find(|r| &r.actuator == actuator && r.kind == kind)
            .cloned())
    }

    async fn delete(&self, actuator: &ActuatorRef, kind: BackupKind) -> Result<(), EngineError> {
        let mut store = self.store.lock().unwrap();
        store.retain(|r| !(&r.actuator == actuator && r.kind == kind));
        Ok(())
    }
}

/// Fixed rule set.
#[derive(Default)]
pub struct InMemoryRules {
    rules: Mutex<HashMap<RuleId, LogicRule>>,
}

impl InMemoryRules {
    pub fn with_rules(rules: &[LogicRule]) -> Self {
        Self {
            rules: Mutex::new(rules.iter().map(|r| (r.id, r.clone())).collect()),
        }
    }

    pub fn insert(&self, rule: LogicRule) {
        self.rules.lock().unwrap().insert(rule.id, rule);
    }

    pub fn remove(&self, id: RuleId) {
        self.rules.lock().unwrap().remove(&id);
    }
}

impl RuleRepository for InMemoryRules {
    async fn get(&self, id: RuleId) -> Result<Option<LogicRule>, EngineError> {
        Ok(self.rules.lock().unwrap().get(&id).cloned())
    }

    async fn get_enabled(&self) -> Result<Vec<LogicRule>, EngineError> {
        Ok(self
            .rules
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.enabled)
            .cloned()
            .collect())
    }
}

/// Preset samples per sensor, with an optional artificial fetch delay.
#[derive(Default)]
pub struct PresetSamples {
    samples: Mutex<HashMap<SensorRef, Sample>>,
    fetched: Mutex<Vec<SensorRef>>,
    delay: Option<Duration>,
}

impl PresetSamples {
    pub fn delayed(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn set(&self, sensor: SensorRef, sample: Sample) {
        self.samples.lock().unwrap().insert(sensor, sample);
    }

    /// Every fetched sensor, in call order.
    pub fn fetch_log(&self) -> Vec<SensorRef> {
        self.fetched.lock().unwrap().clone()
    }
}

impl SampleSource for PresetSamples {
    async fn fetch(&self, sensor: &SensorRef) -> Result<Option<Sample>, EngineError> {
        self.fetched.lock().unwrap().push(sensor.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.samples.lock().unwrap().get(sensor).cloned())
    }
}

/// Topology that knows a fixed set of controllers.
#[derive(Default)]
pub struct StaticTopology {
    known: Vec<ControllerId>,
}

impl StaticTopology {
    pub fn with_controllers(ids: &[&str]) -> Self {
        Self {
            known: ids.iter().map(|id| ControllerId::from(*id)).collect(),
        }
    }
}

impl Topology for StaticTopology {
    async fn resolve_controller(&self, id: &ControllerId) -> Result<ControllerId, EngineError> {
        self.known
            .iter()
            .find(|known| *known == id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownController(id.to_string()))
    }
}
