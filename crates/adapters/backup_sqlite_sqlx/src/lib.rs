//! # edgehub-adapter-backup-sqlite-sqlx
//!
//! `SQLite` persistence for actuator backups using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the `BackupRepository` port defined in `edgehub-app::ports`
//! - Manage the `SQLite` connection pool lifecycle
//! - Run database migrations (sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `edgehub-app` (for the port trait) and `edgehub-domain` (for
//! domain types). The `app` and `domain` crates must never reference this
//! adapter.

mod backup_repo;
mod error;
mod pool;

pub use backup_repo::SqliteBackupRepository;
pub use error::StorageError;
pub use pool::{Config, Database};
