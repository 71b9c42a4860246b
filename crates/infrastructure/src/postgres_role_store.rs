//! PostgreSQL-backed role store.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use rolegate_application::RoleStore;
use rolegate_core::{AppError, AppResult};
use rolegate_domain::{ConsistencyLevel, MetadataTable, RoleConfig, RoleRecord};

use crate::postgres_support::{
    QUORUM_STALLED_QUERY, map_sqlx_error, synchronous_commit_statement, validate_keyspace,
};

/// PostgreSQL implementation of the role store port.
///
/// Writes run in a transaction whose `synchronous_commit` reflects the
/// requested consistency level. Reads are served by the primary and so
/// satisfy every level.
///
/// Majority-level operations fail with `AppError::Unavailable` when
/// `synchronous_standby_names` is set but no synchronous standby is
/// connected. A standby lost after that check is not detected: PostgreSQL
/// then holds the `remote_apply` commit until a standby returns.
#[derive(Clone)]
pub struct PostgresRoleStore {
    pool: PgPool,
    statements: RoleStatements,
}

#[derive(Debug, Clone)]
struct RoleStatements {
    find_role: String,
    upsert_role: String,
    list_roles: String,
    any_login_role: String,
    find_attribute: String,
    upsert_attribute: String,
    delete_attribute: String,
}

impl RoleStatements {
    fn new(keyspace: &str) -> Self {
        let roles = MetadataTable::Roles.qualified_name(keyspace);
        let attributes = MetadataTable::RoleAttributes.qualified_name(keyspace);

        Self {
            find_role: format!(
                "SELECT role, is_superuser, can_login, member_of FROM {roles} WHERE role = $1"
            ),
            upsert_role: format!(
                "INSERT INTO {roles} (role, is_superuser, can_login) VALUES ($1, $2, $3) \
                 ON CONFLICT (role) DO UPDATE \
                 SET is_superuser = EXCLUDED.is_superuser, can_login = EXCLUDED.can_login"
            ),
            list_roles: format!("SELECT role, is_superuser, can_login, member_of FROM {roles}"),
            any_login_role: format!("SELECT EXISTS (SELECT 1 FROM {roles} WHERE can_login)"),
            find_attribute: format!(
                "SELECT value FROM {attributes} WHERE role = $1 AND name = $2"
            ),
            upsert_attribute: format!(
                "INSERT INTO {attributes} (role, name, value) VALUES ($1, $2, $3) \
                 ON CONFLICT (role, name) DO UPDATE SET value = EXCLUDED.value"
            ),
            delete_attribute: format!("DELETE FROM {attributes} WHERE role = $1 AND name = $2"),
        }
    }
}

impl PostgresRoleStore {
    /// Creates a store over the tables of `keyspace`.
    pub fn new(pool: PgPool, keyspace: &str) -> AppResult<Self> {
        validate_keyspace(keyspace)?;
        Ok(Self {
            pool,
            statements: RoleStatements::new(keyspace),
        })
    }

    async fn ensure_quorum(&self, consistency: ConsistencyLevel) -> AppResult<()> {
        if !consistency.requires_majority() {
            return Ok(());
        }

        let stalled = sqlx::query_scalar::<_, bool>(QUORUM_STALLED_QUERY)
            .fetch_one(&self.pool)
            .await
            .map_err(|error| map_sqlx_error("check synchronous standbys", error))?;
        if stalled {
            return Err(AppError::Unavailable(format!(
                "cannot achieve consistency level {}: no synchronous standby is connected",
                consistency.as_str()
            )));
        }

        Ok(())
    }

    async fn begin_write(
        &self,
        consistency: ConsistencyLevel,
    ) -> AppResult<Transaction<'_, Postgres>> {
        self.ensure_quorum(consistency).await?;
        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|error| map_sqlx_error("begin transaction", error))?;

        sqlx::query(synchronous_commit_statement(consistency))
            .execute(&mut *transaction)
            .await
            .map_err(|error| map_sqlx_error("set write consistency", error))?;

        Ok(transaction)
    }

    async fn commit(transaction: Transaction<'_, Postgres>) -> AppResult<()> {
        transaction
            .commit()
            .await
            .map_err(|error| map_sqlx_error("commit transaction", error))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RoleRow {
    role: String,
    is_superuser: Option<bool>,
    can_login: Option<bool>,
    member_of: Option<Vec<String>>,
}

impl From<RoleRow> for RoleRecord {
    fn from(row: RoleRow) -> Self {
        Self {
            name: row.role,
            is_superuser: row.is_superuser.unwrap_or(false),
            can_login: row.can_login.unwrap_or(false),
            member_of: row.member_of.unwrap_or_default().into_iter().collect(),
        }
    }
}

mod attributes;
mod roles;


#[async_trait]
impl RoleStore for PostgresRoleStore {
    async fn find_role(
        &self,
        role_name: &str,
        consistency: ConsistencyLevel,
    ) -> AppResult<Option<RoleRecord>> {
        self.ensure_quorum(consistency).await?;
        self.find_role_impl(role_name).await
    }

    async fn upsert_role(
        &self,
        role_name: &str,
        config: RoleConfig,
        consistency: ConsistencyLevel,
    ) -> AppResult<()> {
        self.upsert_role_impl(role_name, config, consistency).await
    }

    async fn list_roles(&self, consistency: ConsistencyLevel) -> AppResult<Vec<RoleRecord>> {
        self.ensure_quorum(consistency).await?;
        self.list_roles_impl().await
    }

    async fn any_login_role(&self, consistency: ConsistencyLevel) -> AppResult<bool> {
        self.ensure_quorum(consistency).await?;
        self.any_login_role_impl().await
    }

    async fn find_attribute(
        &self,
        role_name: &str,
        attribute_name: &str,
        consistency: ConsistencyLevel,
    ) -> AppResult<Option<String>> {
        self.ensure_quorum(consistency).await?;
        self.find_attribute_impl(role_name, attribute_name).await
    }

    async fn upsert_attribute(
        &self,
        role_name: &str,
        attribute_name: &str,
        value: &str,
        consistency: ConsistencyLevel,
    ) -> AppResult<()> {
        self.upsert_attribute_impl(role_name, attribute_name, value, consistency)
            .await
    }

    async fn delete_attribute(
        &self,
        role_name: &str,
        attribute_name: &str,
        consistency: ConsistencyLevel,
    ) -> AppResult<()> {
        self.delete_attribute_impl(role_name, attribute_name, consistency)
            .await
    }
}
