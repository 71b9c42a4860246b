use async_trait::async_trait;

use rolegate_core::AppResult;
use rolegate_domain::{ConsistencyLevel, RoleConfig, RoleRecord};

/// Query-execution port over the replicated `roles` and `role_attributes` tables.
///
/// Every call names the consistency level the backend must satisfy.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Finds one role row.
    async fn find_role(
        &self,
        role_name: &str,
        consistency: ConsistencyLevel,
    ) -> AppResult<Option<RoleRecord>>;

    /// Writes the flags of one role row, creating it when missing.
    ///
    /// Memberships of an existing row are left untouched.
    async fn upsert_role(
        &self,
        role_name: &str,
        config: RoleConfig,
        consistency: ConsistencyLevel,
    ) -> AppResult<()>;

    /// Scans every role row.
    async fn list_roles(&self, consistency: ConsistencyLevel) -> AppResult<Vec<RoleRecord>>;

    /// Returns true when at least one role row has `can_login` set.
    async fn any_login_role(&self, consistency: ConsistencyLevel) -> AppResult<bool>;

    /// Finds one attribute value.
    async fn find_attribute(
        &self,
        role_name: &str,
        attribute_name: &str,
        consistency: ConsistencyLevel,
    ) -> AppResult<Option<String>>;

    /// Writes one attribute value, replacing any previous value.
    async fn upsert_attribute(
        &self,
        role_name: &str,
        attribute_name: &str,
        value: &str,
        consistency: ConsistencyLevel,
    ) -> AppResult<()>;

    /// Deletes one attribute row. Deleting a missing row succeeds.
    async fn delete_attribute(
        &self,
        role_name: &str,
        attribute_name: &str,
        consistency: ConsistencyLevel,
    ) -> AppResult<()>;
}
