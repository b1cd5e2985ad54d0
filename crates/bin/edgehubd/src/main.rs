//! # edgehubd — edgehub daemon
//!
//! Composition root that wires adapters into the control engine and runs
//! the evaluation scheduler.
//!
//! ## Responsibilities
//! - Parse configuration (TOML file, env vars)
//! - Initialize the `SQLite` backup store and run migrations
//! - Construct the virtual transport, sample source, and topology
//! - Construct the engine, scheduler, and distributed coordinator,
//!   injecting adapters via port traits
//! - Seed a demo rule so a fresh start shows the engine working
//! - Handle graceful shutdown (SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use edgehub_adapter_backup_sqlite_sqlx::{Config as DbConfig, SqliteBackupRepository};
use edgehub_adapter_virtual::{
    InMemoryRuleRepository, VirtualSampleSource, VirtualTopology, VirtualTransport,
};
use edgehub_app::distributed::DistributedLogicCoordinator;
use edgehub_app::engine::ControlEngine;
use edgehub_app::ports::RuleRepository;
use edgehub_app::scheduler::EvaluationScheduler;
use edgehub_domain::actuator::{ActuatorKind, ActuatorRef, ActuatorState};
use edgehub_domain::cross::{CrossControllerRule, RemoteAction};
use edgehub_domain::rule::{CompareOp, Condition, FallbackStrategy, LogicRule};
use edgehub_domain::sensor::{Sample, SensorRef, SensorType};
use edgehub_domain::time::now;

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Backup store
    let db = DbConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await?;
    let backups = Arc::new(SqliteBackupRepository::new(db.pool().clone()));

    // Virtual field tier
    let transport = Arc::new(VirtualTransport::default());
    let samples = Arc::new(VirtualSampleSource::default());
    let topology = Arc::new(
        VirtualTopology::default()
            .controller("esp1")
            .controller("esp2"),
    );
    let rules = Arc::new(InMemoryRuleRepository::default());

    // Engine
    let engine = Arc::new(ControlEngine::new(
        rules.clone(),
        transport.clone(),
        backups.clone(),
        config.engine.clone(),
    ));
    let scheduler = Arc::new(EvaluationScheduler::new(engine.clone(), samples.clone()));
    let distributed = DistributedLogicCoordinator::new(
        samples.clone(),
        transport.clone(),
        topology,
        backups,
        &config.engine,
    );

    seed_demo(&rules, &samples, &engine).await?;
    seed_cross_demo(&distributed).await?;

    let runner = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.run().await }
    });

    info!("edgehubd running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    scheduler.stop();
    runner.await?;

    Ok(())
}

/// Register one demo rule and a matching reading so a fresh start has
/// something to evaluate.
async fn seed_demo(
    rules: &InMemoryRuleRepository,
    samples: &VirtualSampleSource,
    engine: &ControlEngine<
        Arc<InMemoryRuleRepository>,
        Arc<VirtualTransport>,
        Arc<SqliteBackupRepository>,
    >,
) -> anyhow::Result<()> {
    let rule = LogicRule::builder()
        .name("demo: fan when hot")
        .actuator(ActuatorRef::new("esp1", 5))
        .kind(ActuatorKind::Fan)
        .condition(Condition {
            sensor: SensorRef::new("esp1", 2),
            op: CompareOp::Gt,
            threshold: 25.0,
            sensor_type: SensorType::Temperature,
            fallback: FallbackStrategy::SafeOff,
        })
        .failsafe(true, ActuatorState::Off)
        .build()?;
    let rule_id = rule.id;

    samples.set_reading(SensorRef::new("esp1", 2), Sample::numeric(28.5, now()));
    rules.insert(rule)?;

    // reapply persisted states from a previous run before evaluation kicks in
    for rule in rules.get_enabled().await? {
        if let Some(state) = engine.failsafe().restore(&rule.actuator).await? {
            info!(actuator = %rule.actuator, %state, "restored last known state");
        }
    }

    let started = engine.start_enabled_processes().await?;
    info!(rule = %rule_id, started, "demo rule seeded");
    Ok(())
}

/// Register a demo cross-controller rule and evaluate it once so the
/// distributed path shows up in the logs.
async fn seed_cross_demo(
    distributed: &DistributedLogicCoordinator<
        Arc<VirtualSampleSource>,
        Arc<VirtualTransport>,
        Arc<SqliteBackupRepository>,
        Arc<VirtualTopology>,
    >,
) -> anyhow::Result<()> {
    let rule = CrossControllerRule::builder()
        .name("demo: vent north wing")
        .trigger(Condition {
            sensor: SensorRef::new("esp1", 2),
            op: CompareOp::Gt,
            threshold: 25.0,
            sensor_type: SensorType::Temperature,
            fallback: FallbackStrategy::SafeOff,
        })
        .action(RemoteAction {
            target: ActuatorRef::new("esp2", 1),
            state: ActuatorState::On,
        })
        .zone("north-wing")
        .build()?;
    let rule_id = rule.id;
    distributed.register(rule)?;

    let report = distributed.evaluate(rule_id).await?;
    info!(rule = %rule_id, fired = report.fired, "demo cross-controller rule evaluated");
    Ok(())
}
