//! Transport ports — outbound commands and sensor sample access.
//!
//! The transport behind these traits is at-least-once with no cross-target
//! ordering guarantee; retry policy is the adapter's concern, never the
//! engine's.

use std::future::Future;

use edgehub_domain::error::EngineError;
use edgehub_domain::proposal::ActuatorCommand;
use edgehub_domain::sensor::{Sample, SensorRef};

/// Delivers authoritative actuator commands to field controllers.
pub trait CommandPublisher {
    /// Publish one command toward its target controller.
    ///
    /// A returned error means delivery failed; the engine logs it and
    /// surfaces it to the caller without retrying.
    fn publish(
        &self,
        command: ActuatorCommand,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;
}

impl<T: CommandPublisher + Send + Sync> CommandPublisher for std::sync::Arc<T> {
    fn publish(
        &self,
        command: ActuatorCommand,
    ) -> impl Future<Output = Result<(), EngineError>> + Send {
        (**self).publish(command)
    }
}

/// Fetches the latest reading for a sensor, local or remote.
///
/// `Ok(None)` means the transport is healthy but has no reading for that
/// sensor — the condition evaluator's quality gate turns that into the
/// condition's fallback. `Err` means the fetch itself failed.
pub trait SampleSource {
    fn fetch(
        &self,
        sensor: &SensorRef,
    ) -> impl Future<Output = Result<Option<Sample>, EngineError>> + Send;
}

impl<T: SampleSource + Send + Sync> SampleSource for std::sync::Arc<T> {
    fn fetch(
        &self,
        sensor: &SensorRef,
    ) -> impl Future<Output = Result<Option<Sample>, EngineError>> + Send {
        (**self).fetch(sensor)
    }
}
