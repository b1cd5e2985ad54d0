//! In-memory backup repository.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use edgehub_app::ports::{BackupKind, BackupRecord, BackupRepository};
use edgehub_domain::actuator::ActuatorRef;
use edgehub_domain::error::EngineError;

type Key = (ActuatorRef, BackupKind);

/// Backup store for deployments that do not need persistence across
/// restarts. One record per (actuator, kind), `save` overwrites.
#[derive(Default)]
pub struct InMemoryBackupRepository {
    records: Mutex<HashMap<Key, BackupRecord>>,
}

impl InMemoryBackupRepository {
    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no records are held.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Key, BackupRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BackupRepository for InMemoryBackupRepository {
    async fn save(&self, record: BackupRecord) -> Result<(), EngineError> {
        self.lock()
            .insert((record.actuator.clone(), record.kind), record);
        Ok(())
    }

    async fn load(
        &self,
        actuator: &ActuatorRef,
        kind: BackupKind,
    ) -> Result<Option<BackupRecord>, EngineError> {
        Ok(self.lock().get(&(actuator.clone(), kind)).cloned())
    }

    async fn delete(&self, actuator: &ActuatorRef, kind: BackupKind) -> Result<(), EngineError> {
        self.lock().remove(&(actuator.clone(), kind));
        Ok(())
    }
}
