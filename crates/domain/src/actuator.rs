//! Actuator — one physical output on a field controller.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::ControllerId;

/// Unique key for one physical output: the owning controller plus its pin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActuatorRef {
    pub controller: ControllerId,
    pub pin: u8,
}

impl ActuatorRef {
    /// Reference an output by controller name and pin.
    #[must_use]
    pub fn new(controller: impl Into<ControllerId>, pin: u8) -> Self {
        Self {
            controller: controller.into(),
            pin,
        }
    }
}

impl fmt::Display for ActuatorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.controller, self.pin)
    }
}

/// What family of hardware sits behind an actuator pin.
///
/// The kind only matters to the priority resolver's tie-break: pump-like
/// outputs prefer the safe (off) proposal, dimmable outputs prefer the
/// brightest request, heaters prefer the automation's opinion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorKind {
    Pump,
    Valve,
    Fan,
    Heater,
    Led,
    Dimmable,
    Unknown,
}

impl ActuatorKind {
    /// Pump-like outputs where "off" is the safe tie-break choice.
    #[must_use]
    pub fn prefers_off(self) -> bool {
        matches!(self, Self::Pump | Self::Valve | Self::Fan)
    }

    /// Outputs carrying a dimmable level rather than a plain switch.
    #[must_use]
    pub fn is_dimmable(self) -> bool {
        matches!(self, Self::Led | Self::Dimmable)
    }
}

/// The requested or authoritative output state of an actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorState {
    Off,
    On,
    /// Dimmed output, 0–255. `Level(0)` still counts as off.
    Level(u8),
}

impl ActuatorState {
    /// Whether this state leaves the output de-energized.
    #[must_use]
    pub fn is_off(self) -> bool {
        matches!(self, Self::Off | Self::Level(0))
    }

    /// Numeric output level: 0 for off, 255 for plain on.
    #[must_use]
    pub fn level(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::On => 255,
            Self::Level(level) => level,
        }
    }
}

impl fmt::Display for ActuatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("off"),
            Self::On => f.write_str("on"),
            Self::Level(level) => write!(f, "level({level})"),
        }
    }
}
