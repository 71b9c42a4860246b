//! PostgreSQL schema migrator for the role manager tables.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use rolegate_application::SchemaMigrator;
use rolegate_core::{AppError, AppResult, CancellationKind};
use rolegate_domain::MetadataTable;

use crate::postgres_support::{is_duplicate_object, map_sqlx_error, validate_keyspace};

const LAGGING_REPLICAS_QUERY: &str = r#"
    SELECT COUNT(*)
    FROM pg_stat_replication
    WHERE replay_lsn IS NULL OR replay_lsn < pg_current_wal_lsn()
"#;

/// Creates role manager tables and waits for replicas to replay them.
///
/// Schema agreement holds once no streaming replica is behind the primary's
/// current WAL position. A primary without replicas agrees immediately.
#[derive(Clone)]
pub struct PostgresSchemaMigrator {
    pool: PgPool,
    keyspace: String,
    poll_interval: Duration,
}

impl PostgresSchemaMigrator {
    /// Creates a migrator for `keyspace`, polling replicas every `poll_interval`.
    pub fn new(pool: PgPool, keyspace: &str, poll_interval: Duration) -> AppResult<Self> {
        validate_keyspace(keyspace)?;
        if poll_interval.is_zero() {
            return Err(AppError::Validation(
                "schema agreement poll interval must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            pool,
            keyspace: keyspace.to_owned(),
            poll_interval,
        })
    }

    fn table_definition(&self, table: MetadataTable) -> String {
        let qualified = table.qualified_name(self.keyspace.as_str());
        match table {
            MetadataTable::Roles => format!(
                "CREATE TABLE IF NOT EXISTS {qualified} (\
                 role TEXT PRIMARY KEY, \
                 is_superuser BOOLEAN, \
                 can_login BOOLEAN, \
                 member_of TEXT[])"
            ),
            MetadataTable::RoleAttributes => format!(
                "CREATE TABLE IF NOT EXISTS {qualified} (\
                 role TEXT NOT NULL, \
                 name TEXT NOT NULL, \
                 value TEXT, \
                 PRIMARY KEY (role, name))"
            ),
        }
    }

    async fn execute_ddl(&self, action: &str, statement: &str) -> AppResult<()> {
        match sqlx::query(statement).execute(&self.pool).await {
            Ok(_) => Ok(()),
            Err(error) if is_duplicate_object(&error) => {
                debug!(action, "schema object created concurrently by another node");
                Ok(())
            }
            Err(error) => Err(map_sqlx_error(action, error)),
        }
    }

    async fn lagging_replicas(&self) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(LAGGING_REPLICAS_QUERY)
            .fetch_one(&self.pool)
            .await
            .map_err(|error| map_sqlx_error("check schema agreement", error))
    }
}

#[async_trait]
impl SchemaMigrator for PostgresSchemaMigrator {
    async fn create_table_if_missing(&self, table: MetadataTable) -> AppResult<()> {
        let create_schema = format!("CREATE SCHEMA IF NOT EXISTS {}", self.keyspace);
        self.execute_ddl("create keyspace schema", create_schema.as_str())
            .await?;
        self.execute_ddl("create metadata table", self.table_definition(table).as_str())
            .await?;

        debug!(table = table.name(), keyspace = %self.keyspace, "metadata table ensured");
        Ok(())
    }

    async fn wait_for_schema_agreement(&self, shutdown: &CancellationToken) -> AppResult<()> {
        loop {
            if shutdown.is_cancelled() {
                return Err(AppError::Cancelled(CancellationKind::AbortRequested));
            }

            let lagging = self.lagging_replicas().await?;
            if lagging == 0 {
                info!(keyspace = %self.keyspace, "schema agreement reached");
                return Ok(());
            }

            debug!(lagging, "waiting for replicas to replay schema changes");
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    return Err(AppError::Cancelled(CancellationKind::WaitAborted));
                }
                () = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}
