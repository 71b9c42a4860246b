use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use rolegate_core::AppResult;
use rolegate_domain::MetadataTable;

/// Schema-migration port for the role manager tables.
#[async_trait]
pub trait SchemaMigrator: Send + Sync {
    /// Creates one table unless it already exists.
    ///
    /// Losing a creation race against another node counts as success.
    async fn create_table_if_missing(&self, table: MetadataTable) -> AppResult<()>;

    /// Suspends until every cluster member reports the same schema.
    ///
    /// Returns `AppError::Cancelled` when `shutdown` fires first.
    async fn wait_for_schema_agreement(&self, shutdown: &CancellationToken) -> AppResult<()>;
}
