//! Simulated transport — command journal and operator-set sensor readings.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::debug;

use edgehub_app::ports::{CommandPublisher, SampleSource};
use edgehub_domain::actuator::{ActuatorRef, ActuatorState};
use edgehub_domain::error::{CommandDeliveryError, EngineError};
use edgehub_domain::id::ControllerId;
use edgehub_domain::proposal::ActuatorCommand;
use edgehub_domain::sensor::{Sample, SensorRef};

/// Command transport that journals every delivery instead of talking to
/// hardware. Controllers can be marked unreachable to exercise the
/// delivery-failure paths.
#[derive(Default)]
pub struct VirtualTransport {
    journal: Mutex<Vec<ActuatorCommand>>,
    unreachable: Mutex<HashSet<ControllerId>>,
}

impl VirtualTransport {
    /// Simulate the controller dropping off the network.
    pub fn mark_unreachable(&self, controller: impl Into<ControllerId>) {
        self.lock_unreachable().insert(controller.into());
    }

    /// Bring a controller back.
    pub fn mark_reachable(&self, controller: &ControllerId) {
        self.lock_unreachable().remove(controller);
    }

    /// Every command delivered so far, in order.
    pub fn journal(&self) -> Vec<ActuatorCommand> {
        self.lock_journal().clone()
    }

    /// The last state delivered to `actuator`, if any.
    pub fn last_state(&self, actuator: &ActuatorRef) -> Option<ActuatorState> {
        self.lock_journal()
            .iter()
            .rev()
            .find(|c| &c.target == actuator)
            .map(|c| c.state)
    }

    fn lock_journal(&self) -> std::sync::MutexGuard<'_, Vec<ActuatorCommand>> {
        self.journal.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_unreachable(&self) -> std::sync::MutexGuard<'_, HashSet<ControllerId>> {
        self.unreachable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl CommandPublisher for VirtualTransport {
    async fn publish(&self, command: ActuatorCommand) -> Result<(), EngineError> {
        if self.lock_unreachable().contains(&command.target.controller) {
            return Err(CommandDeliveryError {
                target: command.target.clone(),
                controller: command.target.controller.clone(),
                detail: "controller unreachable".to_string(),
            }
            .into());
        }
        debug!(target = %command.target, state = %command.state, "virtual delivery");
        self.lock_journal().push(command);
        Ok(())
    }
}

/// Sensor source serving whatever readings an operator (or a test) set,
/// with an optional per-fetch latency to simulate slow field links.
#[derive(Default)]
pub struct VirtualSampleSource {
    readings: Mutex<HashMap<SensorRef, Sample>>,
    latency: Option<Duration>,
}

impl VirtualSampleSource {
    /// A source whose every fetch takes `latency`.
    #[must_use]
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            readings: Mutex::new(HashMap::new()),
            latency: Some(latency),
        }
    }

    /// Set (or replace) the reading served for `sensor`.
    pub fn set_reading(&self, sensor: SensorRef, sample: Sample) {
        self.lock().insert(sensor, sample);
    }

    /// Drop the reading for `sensor`; fetches return `None` afterwards.
    pub fn clear_reading(&self, sensor: &SensorRef) {
        self.lock().remove(sensor);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SensorRef, Sample>> {
        self.readings.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SampleSource for VirtualSampleSource {
    async fn fetch(&self, sensor: &SensorRef) -> Result<Option<Sample>, EngineError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        Ok(self.lock().get(sensor).cloned())
    }
}
