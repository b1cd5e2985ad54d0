//! `SQLite` implementation of [`BackupRepository`].

use std::future::Future;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use edgehub_app::ports::{BackupKind, BackupRecord, BackupRepository};
use edgehub_domain::actuator::ActuatorRef;
use edgehub_domain::error::EngineError;

use crate::error::StorageError;

const UPSERT: &str = "INSERT INTO backups (controller, pin, kind, state, saved_at) \
     VALUES (?, ?, ?, ?, ?) \
     ON CONFLICT (controller, pin, kind) \
     DO UPDATE SET state = excluded.state, saved_at = excluded.saved_at";

const SELECT_ONE: &str =
    "SELECT controller, pin, kind, state, saved_at FROM backups \
     WHERE controller = ? AND pin = ? AND kind = ?";

const DELETE_ONE: &str = "DELETE FROM backups WHERE controller = ? AND pin = ? AND kind = ?";

fn kind_to_str(kind: BackupKind) -> &'static str {
    match kind {
        BackupKind::State => "state",
        BackupKind::Safety => "safety",
    }
}

fn kind_from_str(value: &str) -> Option<BackupKind> {
    match value {
        "state" => Some(BackupKind::State),
        "safety" => Some(BackupKind::Safety),
        _ => None,
    }
}

/// Newtype so we can implement [`FromRow`] for the domain record.
struct Wrapper(BackupRecord);

impl Wrapper {
    fn maybe(row: Option<Self>) -> Option<BackupRecord> {
        row.map(|w| w.0)
    }
}

impl FromRow<'_, SqliteRow> for Wrapper {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let controller: String = row.try_get("controller")?;
        let pin: i64 = row.try_get("pin")?;
        let pin = u8::try_from(pin).map_err(|err| sqlx::Error::ColumnDecode {
            index: "pin".to_string(),
            source: Box::new(err),
        })?;
        let kind: String = row.try_get("kind")?;
        let kind = kind_from_str(&kind).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "kind".to_string(),
            source: format!("unknown backup kind '{kind}'").into(),
        })?;
        let state: String = row.try_get("state")?;
        let state = serde_json::from_str(&state).map_err(|err| sqlx::Error::ColumnDecode {
            index: "state".to_string(),
            source: Box::new(err),
        })?;
        let saved_at: DateTime<Utc> = row.try_get("saved_at")?;

        Ok(Self(BackupRecord {
            actuator: ActuatorRef::new(controller, pin),
            state,
            kind,
            saved_at,
        }))
    }
}

/// `SQLite`-backed backup repository.
pub struct SqliteBackupRepository {
    pool: SqlitePool,
}

impl SqliteBackupRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl BackupRepository for SqliteBackupRepository {
    fn save(&self, record: BackupRecord) -> impl Future<Output = Result<(), EngineError>> + Send {
        let pool = self.pool.clone();
        async move {
            let state = serde_json::to_string(&record.state).map_err(StorageError::from)?;
            sqlx::query(UPSERT)
                .bind(record.actuator.controller.as_str())
                .bind(i64::from(record.actuator.pin))
                .bind(kind_to_str(record.kind))
                .bind(state)
                .bind(record.saved_at)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }

    fn load(
        &self,
        actuator: &ActuatorRef,
        kind: BackupKind,
    ) -> impl Future<Output = Result<Option<BackupRecord>, EngineError>> + Send {
        let pool = self.pool.clone();
        let actuator = actuator.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_ONE)
                .bind(actuator.controller.as_str())
                .bind(i64::from(actuator.pin))
                .bind(kind_to_str(kind))
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn delete(
        &self,
        actuator: &ActuatorRef,
        kind: BackupKind,
    ) -> impl Future<Output = Result<(), EngineError>> + Send {
        let pool = self.pool.clone();
        let actuator = actuator.clone();
        async move {
            sqlx::query(DELETE_ONE)
                .bind(actuator.controller.as_str())
                .bind(i64::from(actuator.pin))
                .bind(kind_to_str(kind))
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }
}
