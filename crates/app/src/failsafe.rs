//! Failsafe coordinator — safe-state activation and post-recovery restore.
//!
//! When an evaluation cannot be trusted (error or timeout) the coordinator
//! forces the rule's configured safe state onto the actuator, persists a
//! time-stamped safety backup, and logs the event. After recovery,
//! [`restore`](FailsafeCoordinator::restore) re-applies the youngest
//! backup that is still within its class ceiling; expired backups are
//! discarded unapplied.

use tracing::{error, info, warn};

use edgehub_domain::actuator::{ActuatorRef, ActuatorState};
use edgehub_domain::error::EngineError;
use edgehub_domain::proposal::{ActuatorCommand, ProposalSource, StateProposal};
use edgehub_domain::time::now;

use crate::ports::{BackupKind, BackupRecord, BackupRepository, CommandPublisher};

/// Coordinates safe-state activation and backup-based restoration.
pub struct FailsafeCoordinator<P, B> {
    publisher: P,
    backups: B,
}

impl<P, B> FailsafeCoordinator<P, B>
where
    P: CommandPublisher,
    B: BackupRepository,
{
    pub fn new(publisher: P, backups: B) -> Self {
        Self { publisher, backups }
    }

    /// Force `safe_state` onto `actuator` and record a safety backup.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CommandDelivery`] when the transport refuses
    /// the command and [`EngineError::Backup`] when persisting the backup
    /// fails. Delivery failure is logged, not retried — retry is the
    /// transport's concern.
    pub async fn activate(
        &self,
        actuator: &ActuatorRef,
        safe_state: ActuatorState,
    ) -> Result<(), EngineError> {
        error!(%actuator, state = %safe_state, "failsafe activated");
        let command = ActuatorCommand::from_proposal(
            actuator.clone(),
            &StateProposal::new(safe_state, ProposalSource::Emergency, "failsafe", now()),
        );
        let delivery = self.publisher.publish(command).await;
        if let Err(err) = &delivery {
            error!(%actuator, %err, "failsafe command delivery failed");
        }
        self.backups
            .save(BackupRecord {
                actuator: actuator.clone(),
                state: safe_state,
                kind: BackupKind::Safety,
                saved_at: now(),
            })
            .await?;
        delivery
    }

    /// Record a regular resolved-state backup for `actuator`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Backup`] when persistence fails.
    pub async fn backup_state(
        &self,
        actuator: &ActuatorRef,
        state: ActuatorState,
    ) -> Result<(), EngineError> {
        self.backups
            .save(BackupRecord {
                actuator: actuator.clone(),
                state,
                kind: BackupKind::State,
                saved_at: now(),
            })
            .await
    }

    /// Re-apply the freshest applicable backup after recovery.
    ///
    /// Safety backups take precedence over state backups. A backup older
    /// than its class ceiling is deleted and skipped. Returns the state
    /// that was applied, or `None` when nothing applicable remained.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CommandDelivery`] when re-applying fails and
    /// [`EngineError::Backup`] on store errors.
    pub async fn restore(&self, actuator: &ActuatorRef) -> Result<Option<ActuatorState>, EngineError> {
        for kind in [BackupKind::Safety, BackupKind::State] {
            let Some(record) = self.backups.load(actuator, kind).await? else {
                continue;
            };
            if !record.is_fresh(now()) {
                warn!(%actuator, ?kind, saved_at = %record.saved_at, "discarding expired backup");
                self.backups.delete(actuator, kind).await?;
                continue;
            }
            info!(%actuator, ?kind, state = %record.state, "restoring backup");
            let command = ActuatorCommand::from_proposal(
                actuator.clone(),
                &StateProposal::new(
                    record.state,
                    ProposalSource::Default,
                    "post-recovery restore",
                    now(),
                ),
            );
            self.publisher.publish(command).await?;
            return Ok(Some(record.state));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{InMemoryBackups, SpyPublisher};
    use edgehub_domain::time::Timestamp;

    fn record(actuator: &ActuatorRef, kind: BackupKind, saved_at: Timestamp) -> BackupRecord {
        BackupRecord {
            actuator: actuator.clone(),
            state: ActuatorState::On,
            kind,
            saved_at,
        }
    }

    #[tokio::test]
    async fn should_publish_safe_state_and_save_safety_backup() {
        let publisher = Arc::new(SpyPublisher::default());
        let backups = Arc::new(InMemoryBackups::default());
        let coordinator = FailsafeCoordinator::new(publisher.clone(), backups.clone());
        let actuator = ActuatorRef::new("esp1", 5);

        coordinator
            .activate(&actuator, ActuatorState::Off)
            .await
            .unwrap();

        let commands = publisher.published();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].state, ActuatorState::Off);
        assert_eq!(commands[0].source, ProposalSource::Emergency);

        let saved = backups.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].kind, BackupKind::Safety);
    }

    #[tokio::test]
    async fn should_surface_delivery_failure_without_retry() {
        let publisher = Arc::new(SpyPublisher::failing());
        let coordinator =
            FailsafeCoordinator::new(publisher.clone(), Arc::new(InMemoryBackups::default()));
        let result = coordinator
            .activate(&ActuatorRef::new("esp1", 5), ActuatorState::Off)
            .await;
        assert!(matches!(result, Err(EngineError::CommandDelivery(_))));
        assert!(publisher.published().is_empty());
    }

    #[tokio::test]
    async fn should_restore_fresh_safety_backup() {
        let backups = Arc::new(InMemoryBackups::default());
        let actuator = ActuatorRef::new("esp1", 5);
        backups.put(record(
            &actuator,
            BackupKind::Safety,
            now() - chrono::Duration::minutes(30),
        ));

        let publisher = Arc::new(SpyPublisher::default());
        let coordinator = FailsafeCoordinator::new(publisher.clone(), backups);

        let applied = coordinator.restore(&actuator).await.unwrap();
        assert_eq!(applied, Some(ActuatorState::On));
        assert_eq!(publisher.published().len(), 1);
    }

    #[tokio::test]
    async fn should_discard_expired_safety_backup_and_fall_through_to_state() {
        let backups = Arc::new(InMemoryBackups::default());
        let actuator = ActuatorRef::new("esp1", 5);
        // safety backup past its 1h ceiling, state backup within 24h
        backups.put(record(
            &actuator,
            BackupKind::Safety,
            now() - chrono::Duration::hours(2),
        ));
        backups.put(record(
            &actuator,
            BackupKind::State,
            now() - chrono::Duration::hours(3),
        ));

        let publisher = Arc::new(SpyPublisher::default());
        let coordinator = FailsafeCoordinator::new(publisher.clone(), backups.clone());

        let applied = coordinator.restore(&actuator).await.unwrap();
        assert_eq!(applied, Some(ActuatorState::On));
        // expired safety backup was deleted, not applied
        assert!(backups.saved().iter().all(|r| r.kind == BackupKind::State));
    }

    #[tokio::test]
    async fn should_return_none_when_every_backup_expired() {
        let backups = Arc::new(InMemoryBackups::default());
        let actuator = ActuatorRef::new("esp1", 5);
        backups.put(record(
            &actuator,
            BackupKind::State,
            now() - chrono::Duration::hours(25),
        ));

        let publisher = Arc::new(SpyPublisher::default());
        let coordinator = FailsafeCoordinator::new(publisher.clone(), backups);

        let applied = coordinator.restore(&actuator).await.unwrap();
        assert!(applied.is_none());
        assert!(publisher.published().is_empty());
    }
}
