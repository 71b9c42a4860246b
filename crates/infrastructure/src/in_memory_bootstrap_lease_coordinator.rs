use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rolegate_application::{BootstrapLease, BootstrapLeaseCoordinator};
use rolegate_core::{AppError, AppResult};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct LeaseEntry {
    token: String,
    expires_at: DateTime<Utc>,
}

/// In-process bootstrap lease coordinator.
///
/// Only coordinates execution contexts sharing this instance.
#[derive(Debug, Default)]
pub struct InMemoryBootstrapLeaseCoordinator {
    leases: Mutex<HashMap<String, LeaseEntry>>,
}

impl InMemoryBootstrapLeaseCoordinator {
    /// Creates a coordinator without leases.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BootstrapLeaseCoordinator for InMemoryBootstrapLeaseCoordinator {
    async fn try_acquire_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<BootstrapLease>> {
        validate_lease_request(scope_key, holder_id, lease_seconds)?;

        let now = Utc::now();
        let mut leases = self.leases.lock().await;
        if leases
            .get(scope_key)
            .is_some_and(|entry| entry.expires_at > now)
        {
            return Ok(None);
        }

        let token = format!("{holder_id}:{}", uuid::Uuid::new_v4());
        leases.insert(
            scope_key.to_owned(),
            LeaseEntry {
                token: token.clone(),
                expires_at: now + Duration::seconds(i64::from(lease_seconds)),
            },
        );

        Ok(Some(BootstrapLease {
            scope_key: scope_key.to_owned(),
            token,
            holder_id: holder_id.to_owned(),
        }))
    }

    async fn release_lease(&self, lease: &BootstrapLease) -> AppResult<()> {
        let mut leases = self.leases.lock().await;
        if leases
            .get(lease.scope_key.as_str())
            .is_some_and(|entry| entry.token == lease.token)
        {
            leases.remove(lease.scope_key.as_str());
        }

        Ok(())
    }

    async fn renew_lease(&self, lease: &BootstrapLease, lease_seconds: u32) -> AppResult<bool> {
        validate_lease_request(
            lease.scope_key.as_str(),
            lease.holder_id.as_str(),
            lease_seconds,
        )?;

        let now = Utc::now();
        let mut leases = self.leases.lock().await;
        let Some(entry) = leases.get_mut(lease.scope_key.as_str()) else {
            return Ok(false);
        };
        if entry.token != lease.token || entry.expires_at <= now {
            return Ok(false);
        }

        entry.expires_at = now + Duration::seconds(i64::from(lease_seconds));
        Ok(true)
    }
}

pub(crate) fn validate_lease_request(
    scope_key: &str,
    holder_id: &str,
    lease_seconds: u32,
) -> AppResult<()> {
    if scope_key.trim().is_empty() {
        return Err(AppError::Validation(
            "bootstrap lease scope_key must not be empty".to_owned(),
        ));
    }

    if holder_id.trim().is_empty() {
        return Err(AppError::Validation(
            "bootstrap lease holder_id must not be empty".to_owned(),
        ));
    }

    if lease_seconds == 0 {
        return Err(AppError::Validation(
            "bootstrap lease_seconds must be greater than zero".to_owned(),
        ));
    }

    Ok(())
}
