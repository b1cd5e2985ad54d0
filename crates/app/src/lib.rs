//! # edgehub-app
//!
//! Application layer — engine components and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `CommandPublisher` — deliver authoritative commands to field controllers
//!   - `SampleSource` — fetch sensor readings, local or remote
//!   - `Topology` — route a device reference to its owning controller
//!   - `BackupRepository` — persist safety/state backups
//!   - `RuleRepository` — read externally authored logic rules
//! - Provide the engine components:
//!   - `resolver` — priority arbitration and the resolved-state store
//!   - `evaluator` — pure condition/timer/event evaluation with quality gate
//!   - `store` — bounded logic-process store and stats
//!   - `scheduler` — fixed-cadence, race-free batch evaluation
//!   - `failsafe` — safe-state activation and post-recovery restore
//!   - `distributed` — cross-controller evaluation and best-effort fan-out
//!   - `engine` — the facade collaborators talk to
//!
//! ## Dependency rule
//! Depends on `edgehub-domain` only (plus `tokio::sync`/`tokio::time` and
//! `futures` for orchestration). Never imports adapter crates. Adapters
//! depend on *this* crate, not the reverse.

pub mod config;
pub mod distributed;
pub mod engine;
pub mod evaluator;
pub mod failsafe;
pub mod ports;
pub mod resolver;
pub mod scheduler;
pub mod store;

#[cfg(test)]
mod testing;
