//! Backup port — persistence for safety and state backups.
//!
//! This is the only persistence the engine itself needs; rule and
//! configuration storage live behind their own boundaries.

use std::future::Future;

use serde::{Deserialize, Serialize};

use edgehub_domain::actuator::{ActuatorRef, ActuatorState};
use edgehub_domain::error::EngineError;
use edgehub_domain::time::Timestamp;

/// Which restore ceiling applies to a backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupKind {
    /// Regular resolved-state backup; restorable for 24 hours.
    State,
    /// Backup written on failsafe activation; restorable for 1 hour.
    Safety,
}

impl BackupKind {
    /// How old a backup of this kind may be and still be applied.
    #[must_use]
    pub fn max_age(self) -> chrono::Duration {
        match self {
            Self::State => chrono::Duration::hours(24),
            Self::Safety => chrono::Duration::hours(1),
        }
    }
}

/// A time-stamped actuator state snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub actuator: ActuatorRef,
    pub state: ActuatorState,
    pub kind: BackupKind,
    pub saved_at: Timestamp,
}

impl BackupRecord {
    /// Whether this backup is still young enough to apply at `now`.
    #[must_use]
    pub fn is_fresh(&self, now: Timestamp) -> bool {
        now - self.saved_at <= self.kind.max_age()
    }
}

/// Repository for persisting and querying [`BackupRecord`]s.
///
/// One record per (actuator, kind); `save` overwrites.
pub trait BackupRepository {
    fn save(&self, record: BackupRecord) -> impl Future<Output = Result<(), EngineError>> + Send;

    fn load(
        &self,
        actuator: &ActuatorRef,
        kind: BackupKind,
    ) -> impl Future<Output = Result<Option<BackupRecord>, EngineError>> + Send;

    fn delete(
        &self,
        actuator: &ActuatorRef,
        kind: BackupKind,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;
}

impl<T: BackupRepository + Send + Sync> BackupRepository for std::sync::Arc<T> {
    fn save(&self, record: BackupRecord) -> impl Future<Output = Result<(), EngineError>> + Send {
        (**self).save(record)
    }

    fn load(
        &self,
        actuator: &ActuatorRef,
        kind: BackupKind,
    ) -> impl Future<Output = Result<Option<BackupRecord>, EngineError>> + Send {
        (**self).load(actuator, kind)
    }

    fn delete(
        &self,
        actuator: &ActuatorRef,
        kind: BackupKind,
    ) -> impl Future<Output = Result<(), EngineError>> + Send {
        (**self).delete(actuator, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_apply_class_ceilings_to_freshness() {
        let now = edgehub_domain::time::now();
        let record = BackupRecord {
            actuator: ActuatorRef::new("esp1", 5),
            state: ActuatorState::On,
            kind: BackupKind::Safety,
            saved_at: now - chrono::Duration::minutes(59),
        };
        assert!(record.is_fresh(now));

        let expired = BackupRecord {
            saved_at: now - chrono::Duration::minutes(61),
            ..record.clone()
        };
        assert!(!expired.is_fresh(now));

        let state = BackupRecord {
            kind: BackupKind::State,
            saved_at: now - chrono::Duration::hours(23),
            ..record
        };
        assert!(state.is_fresh(now));
    }
}
