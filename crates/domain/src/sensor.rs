//! Sensor references, sample payloads, and per-type hardware ranges.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::ControllerId;
use crate::time::Timestamp;

/// Unique key for one sensor input: owning controller plus pin.
///
/// The controller may differ from the one owning the rule's actuator —
/// cross-controller conditions are routed through the topology port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SensorRef {
    pub controller: ControllerId,
    pub pin: u8,
}

impl SensorRef {
    /// Reference a sensor by controller name and pin.
    #[must_use]
    pub fn new(controller: impl Into<ControllerId>, pin: u8) -> Self {
        Self {
            controller: controller.into(),
            pin,
        }
    }
}

impl fmt::Display for SensorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.controller, self.pin)
    }
}

/// One reading received from a field controller.
///
/// The value is kept as raw JSON: controllers occasionally deliver strings
/// or nulls, and the condition evaluator's quality gate is responsible for
/// rejecting anything non-numeric instead of the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub value: serde_json::Value,
    pub timestamp: Timestamp,
}

impl Sample {
    /// A numeric reading taken now.
    #[must_use]
    pub fn numeric(value: f64, timestamp: Timestamp) -> Self {
        Self {
            value: serde_json::json!(value),
            timestamp,
        }
    }

    /// The numeric payload, if there is one.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        self.value.as_f64()
    }

    /// Age of this sample relative to `now`.
    #[must_use]
    pub fn age(&self, now: Timestamp) -> chrono::Duration {
        now - self.timestamp
    }
}

/// What physical quantity a sensor measures.
///
/// Each type carries the hardware's plausible output range; values outside
/// it indicate a wiring or conversion fault, not an extreme environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    /// Degrees Celsius.
    Temperature,
    /// Relative humidity, percent.
    Humidity,
    /// Hectopascal.
    Pressure,
    /// Lux.
    Light,
    /// pH units.
    Ph,
    /// Electrical conductivity, mS/cm.
    Ec,
    /// Tank fill, percent.
    WaterLevel,
    /// No known hardware bounds.
    Generic,
}

impl SensorType {
    /// Inclusive plausible hardware range for this sensor type, or `None`
    /// when the type is unbounded.
    #[must_use]
    pub fn hardware_range(self) -> Option<(f64, f64)> {
        match self {
            Self::Temperature => Some((-40.0, 125.0)),
            Self::Humidity => Some((0.0, 100.0)),
            Self::Pressure => Some((300.0, 1100.0)),
            Self::Light => Some((0.0, 100_000.0)),
            Self::Ph => Some((0.0, 14.0)),
            Self::Ec => Some((0.0, 10.0)),
            Self::WaterLevel => Some((0.0, 100.0)),
            Self::Generic => None,
        }
    }

    /// Whether `value` is inside the plausible hardware range.
    #[must_use]
    pub fn contains(self, value: f64) -> bool {
        match self.hardware_range() {
            Some((min, max)) => (min..=max).contains(&value),
            None => true,
        }
    }
}
