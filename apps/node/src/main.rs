//! Rolegate role manager node.

#![forbid(unsafe_code)]

mod node_config;

use std::sync::Arc;

use rolegate_application::{
    BootstrapLeaseCoordinator, EXTERNAL_ROLE_MANAGER_NAME, RoleManager, RoleManagerBackends,
    RoleManagerRegistry, SystemReadyGate,
};
use rolegate_core::{AppError, AppResult};
use rolegate_infrastructure::{
    InMemoryBootstrapLeaseCoordinator, PostgresRoleStore, PostgresSchemaMigrator,
    RedisBootstrapLeaseCoordinator,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::node_config::{RoleManagerConfig, init_tracing};

const LEASE_KEY_PREFIX: &str = "rolegate:lease";

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = RoleManagerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let backends = build_backends(&config, pool)?;
    let readiness = backends.readiness.clone();

    let mut registry = RoleManagerRegistry::with_builtin_providers();
    let manager = registry.create(EXTERNAL_ROLE_MANAGER_NAME, backends)?;

    info!(
        provider = manager.qualified_name(),
        holder_id = %config.holder_id,
        keyspace = %config.keyspace,
        lease_seconds = config.lease_seconds,
        "rolegate-node starting"
    );

    manager.start().await?;
    readiness.mark_ready();
    info!("rolegate-node ready");

    tokio::signal::ctrl_c()
        .await
        .map_err(|error| AppError::Internal(format!("failed to listen for shutdown: {error}")))?;
    info!("shutdown requested");

    if let Err(error) = manager.stop().await {
        warn!(error = %error, "role manager stopped with error");
    }
    registry.unregister(EXTERNAL_ROLE_MANAGER_NAME);

    Ok(())
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Unavailable(format!("failed to connect to database: {error}")))
}

fn build_backends(config: &RoleManagerConfig, pool: PgPool) -> AppResult<RoleManagerBackends> {
    let role_store = PostgresRoleStore::new(pool.clone(), config.keyspace.as_str())?;
    let schema_migrator = PostgresSchemaMigrator::new(
        pool,
        config.keyspace.as_str(),
        config.agreement_poll_interval,
    )?;

    Ok(RoleManagerBackends {
        role_store: Arc::new(role_store),
        schema_migrator: Arc::new(schema_migrator),
        lease_coordinator: build_lease_coordinator(config)?,
        readiness: SystemReadyGate::new(),
        settings: config.settings(),
    })
}

fn build_lease_coordinator(
    config: &RoleManagerConfig,
) -> AppResult<Arc<dyn BootstrapLeaseCoordinator>> {
    let Some(redis_url) = config.redis_url.as_deref() else {
        warn!("REDIS_URL is not set; bootstrap lease only coordinates this process");
        return Ok(Arc::new(InMemoryBootstrapLeaseCoordinator::new()));
    };

    let client = redis::Client::open(redis_url)
        .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))?;
    Ok(Arc::new(RedisBootstrapLeaseCoordinator::new(
        client,
        LEASE_KEY_PREFIX,
    )))
}
