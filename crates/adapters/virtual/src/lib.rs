//! # edgehub-adapter-virtual
//!
//! Virtual/demo adapter that provides simulated controllers for testing and
//! demonstration purposes.
//!
//! ## Provided pieces
//!
//! | Piece | Port | Behaviour |
//! |-------|------|-----------|
//! | [`VirtualTransport`] | `CommandPublisher` | Journals commands; controllers can be marked unreachable |
//! | [`VirtualSampleSource`] | `SampleSource` | Serves operator-set readings, with optional latency |
//! | [`VirtualTopology`] | `Topology` | Direct controllers plus aggregator routes |
//! | [`InMemoryBackupRepository`] | `BackupRepository` | Keeps backups in a map |
//! | [`InMemoryRuleRepository`] | `RuleRepository` | Keeps rules in a map |
//!
//! ## Dependency rule
//!
//! Depends on `edgehub-app` (port traits) and `edgehub-domain` only.

mod backup;
mod rules;
mod topology;
mod transport;

pub use backup::InMemoryBackupRepository;
pub use rules::InMemoryRuleRepository;
pub use topology::VirtualTopology;
pub use transport::{VirtualSampleSource, VirtualTransport};
