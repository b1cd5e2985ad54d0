//! # edgehub-domain
//!
//! Pure domain model for the edgehub edge-control engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Actuator references** (one physical output on a field controller)
//! - Define **State proposals** (what a producer wants an actuator to do)
//! - Define **Logic rules** (conditions + timer windows + events bound to one actuator)
//! - Define **Logic processes** (runtime instances of rules under evaluation)
//! - Define **Cross-controller rules** (triggers/conditions/actions spanning controllers)
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod actuator;
pub mod cross;
pub mod process;
pub mod proposal;
pub mod rule;
pub mod sensor;
