//! Redis-backed distributed lease coordinator for role manager bootstrap.

use async_trait::async_trait;
use redis::Script;
use rolegate_application::{BootstrapLease, BootstrapLeaseCoordinator};
use rolegate_core::{AppError, AppResult};

use crate::in_memory_bootstrap_lease_coordinator::validate_lease_request;

const RELEASE_LEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
else
  return 0
end
"#;

const RENEW_LEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('EXPIRE', KEYS[1], ARGV[2])
else
  return 0
end
"#;

/// Redis implementation of bootstrap lease coordination.
#[derive(Clone)]
pub struct RedisBootstrapLeaseCoordinator {
    client: redis::Client,
    key_prefix: String,
}

impl RedisBootstrapLeaseCoordinator {
    /// Creates one coordinator adapter.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, scope_key: &str) -> String {
        format!("{}:{scope_key}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to connect to redis: {error}")))
    }
}

#[async_trait]
impl BootstrapLeaseCoordinator for RedisBootstrapLeaseCoordinator {
    async fn try_acquire_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<BootstrapLease>> {
        validate_lease_request(scope_key, holder_id, lease_seconds)?;

        let key = self.key_for(scope_key);
        let token = format!("{holder_id}:{}", uuid::Uuid::new_v4());
        let mut connection = self.connection().await?;

        let acquired: Option<String> = redis::cmd("SET")
            .arg(key.as_str())
            .arg(token.as_str())
            .arg("NX")
            .arg("EX")
            .arg(lease_seconds)
            .query_async(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to acquire bootstrap lease: {error}"))
            })?;

        if acquired.is_none() {
            return Ok(None);
        }

        Ok(Some(BootstrapLease {
            scope_key: scope_key.to_owned(),
            token,
            holder_id: holder_id.to_owned(),
        }))
    }

    async fn release_lease(&self, lease: &BootstrapLease) -> AppResult<()> {
        let key = self.key_for(lease.scope_key.as_str());
        let script = Script::new(RELEASE_LEASE_SCRIPT);
        let mut connection = self.connection().await?;

        script
            .key(key)
            .arg(lease.token.as_str())
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to release bootstrap lease: {error}"))
            })?;

        Ok(())
    }

    async fn renew_lease(&self, lease: &BootstrapLease, lease_seconds: u32) -> AppResult<bool> {
        validate_lease_request(
            lease.scope_key.as_str(),
            lease.holder_id.as_str(),
            lease_seconds,
        )?;

        let key = self.key_for(lease.scope_key.as_str());
        let script = Script::new(RENEW_LEASE_SCRIPT);
        let mut connection = self.connection().await?;

        let renewed = script
            .key(key)
            .arg(lease.token.as_str())
            .arg(i64::from(lease_seconds))
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to renew bootstrap lease: {error}"))
            })?;

        Ok(renewed > 0)
    }
}
