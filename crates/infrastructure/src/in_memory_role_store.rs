use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rolegate_application::{RoleStore, SchemaMigrator};
use rolegate_core::{AppError, AppResult, CancellationKind};
use rolegate_domain::{ConsistencyLevel, MetadataTable, RoleConfig, RoleRecord};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// In-memory role store and schema migrator for a single-node deployment.
///
/// One process holds every replica, so all consistency levels are satisfied
/// and schema agreement is immediate.
#[derive(Debug, Default)]
pub struct InMemoryRoleStore {
    tables: RwLock<HashSet<MetadataTable>>,
    roles: RwLock<HashMap<String, RoleRecord>>,
    attributes: RwLock<HashMap<(String, String), String>>,
    unavailable: AtomicBool,
}

impl InMemoryRoleStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a full role row, memberships included.
    ///
    /// Memberships are written by the external identity system; this is the
    /// in-memory stand-in for it.
    pub async fn put_role(&self, record: RoleRecord) {
        self.roles
            .write()
            .await
            .insert(record.name.clone(), record);
    }

    /// Returns whether a table was created.
    pub async fn has_table(&self, table: MetadataTable) -> bool {
        self.tables.read().await.contains(&table)
    }

    /// Makes quorum operations fail as if replicas were unreachable.
    pub fn set_quorum_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Release);
    }

    fn check_available(&self, consistency: ConsistencyLevel) -> AppResult<()> {
        if consistency.requires_majority() && self.unavailable.load(Ordering::Acquire) {
            return Err(AppError::Unavailable(format!(
                "cannot achieve consistency level {}",
                consistency.as_str()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl RoleStore for InMemoryRoleStore {
    async fn find_role(
        &self,
        role_name: &str,
        consistency: ConsistencyLevel,
    ) -> AppResult<Option<RoleRecord>> {
        self.check_available(consistency)?;
        Ok(self.roles.read().await.get(role_name).cloned())
    }

    async fn upsert_role(
        &self,
        role_name: &str,
        config: RoleConfig,
        consistency: ConsistencyLevel,
    ) -> AppResult<()> {
        self.check_available(consistency)?;

        let mut roles = self.roles.write().await;
        let record = roles
            .entry(role_name.to_owned())
            .or_insert_with(|| RoleRecord::new(role_name, config));
        record.is_superuser = config.is_superuser;
        record.can_login = config.can_login;
        Ok(())
    }

    async fn list_roles(&self, consistency: ConsistencyLevel) -> AppResult<Vec<RoleRecord>> {
        self.check_available(consistency)?;

        let mut records: Vec<RoleRecord> = self.roles.read().await.values().cloned().collect();
        records.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(records)
    }

    async fn any_login_role(&self, consistency: ConsistencyLevel) -> AppResult<bool> {
        self.check_available(consistency)?;
        Ok(self
            .roles
            .read()
            .await
            .values()
            .any(|record| record.can_login))
    }

    async fn find_attribute(
        &self,
        role_name: &str,
        attribute_name: &str,
        consistency: ConsistencyLevel,
    ) -> AppResult<Option<String>> {
        self.check_available(consistency)?;
        Ok(self
            .attributes
            .read()
            .await
            .get(&(role_name.to_owned(), attribute_name.to_owned()))
            .cloned())
    }

    async fn upsert_attribute(
        &self,
        role_name: &str,
        attribute_name: &str,
        value: &str,
        consistency: ConsistencyLevel,
    ) -> AppResult<()> {
        self.check_available(consistency)?;
        self.attributes.write().await.insert(
            (role_name.to_owned(), attribute_name.to_owned()),
            value.to_owned(),
        );
        Ok(())
    }

    async fn delete_attribute(
        &self,
        role_name: &str,
        attribute_name: &str,
        consistency: ConsistencyLevel,
    ) -> AppResult<()> {
        self.check_available(consistency)?;
        self.attributes
            .write()
            .await
            .remove(&(role_name.to_owned(), attribute_name.to_owned()));
        Ok(())
    }
}

#[async_trait]
impl SchemaMigrator for InMemoryRoleStore {
    async fn create_table_if_missing(&self, table: MetadataTable) -> AppResult<()> {
        self.tables.write().await.insert(table);
        Ok(())
    }

    async fn wait_for_schema_agreement(&self, shutdown: &CancellationToken) -> AppResult<()> {
        if shutdown.is_cancelled() {
            return Err(AppError::Cancelled(CancellationKind::AbortRequested));
        }

        Ok(())
    }
}
