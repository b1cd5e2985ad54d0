//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the engine core and the outside world.
//! They are defined here (in `app`) so that both the engine components and
//! the adapter layer can depend on them without creating circular
//! dependencies.

pub mod backup;
pub mod rules;
pub mod topology;
pub mod transport;

pub use backup::{BackupKind, BackupRecord, BackupRepository};
pub use rules::RuleRepository;
pub use topology::Topology;
pub use transport::{CommandPublisher, SampleSource};
