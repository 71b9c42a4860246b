use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use rolegate_core::AppResult;
use rolegate_domain::{RecursiveRoleQuery, RoleConfig, RoleConfigUpdate};

/// Role-manager contract consumed by the access-control framework.
#[async_trait]
pub trait RoleManager: Send + Sync {
    /// Returns the identifier the provider is registered under.
    fn qualified_name(&self) -> &'static str;

    /// Returns the qualified tables the framework must shield from user writes.
    fn protected_resources(&self) -> Vec<String>;

    /// Creates the backing schema and schedules default role setup.
    async fn start(&self) -> AppResult<()>;

    /// Cancels background work and reports any failure it produced.
    async fn stop(&self) -> AppResult<()>;

    /// Suspends until the default role setup is settled for this node.
    ///
    /// Returns `Ok(())` once setup completed here or was left to the lease
    /// holder, the setup error when it failed, and `AbortRequested` when the
    /// manager is stopped first.
    async fn wait_for_bootstrap(&self) -> AppResult<()>;

    /// Creates a role.
    async fn create(&self, role_name: &str, config: RoleConfig) -> AppResult<()>;

    /// Drops a role.
    async fn drop_role(&self, role_name: &str) -> AppResult<()>;

    /// Alters the flags of a role.
    async fn alter(&self, role_name: &str, update: RoleConfigUpdate) -> AppResult<()>;

    /// Grants `role_name` to `grantee_name`.
    async fn grant(&self, grantee_name: &str, role_name: &str) -> AppResult<()>;

    /// Revokes `role_name` from `revokee_name`.
    async fn revoke(&self, revokee_name: &str, role_name: &str) -> AppResult<()>;

    /// Returns the roles granted to `grantee_name`, including itself.
    async fn granted_roles(
        &self,
        grantee_name: &str,
        mode: RecursiveRoleQuery,
    ) -> AppResult<BTreeSet<String>>;

    /// Returns every known role name.
    async fn all_roles(&self) -> AppResult<BTreeSet<String>>;

    /// Returns whether a role exists.
    async fn exists(&self, role_name: &str) -> AppResult<bool>;

    /// Returns whether a role is a superuser.
    async fn is_superuser(&self, role_name: &str) -> AppResult<bool>;

    /// Returns whether a role may log in.
    async fn can_login(&self, role_name: &str) -> AppResult<bool>;

    /// Returns one attribute value of a role.
    async fn get_attribute(
        &self,
        role_name: &str,
        attribute_name: &str,
    ) -> AppResult<Option<String>>;

    /// Returns the value of one attribute for every role that has it.
    async fn attribute_for_all(&self, attribute_name: &str)
    -> AppResult<BTreeMap<String, String>>;

    /// Sets one attribute value of a role.
    async fn set_attribute(
        &self,
        role_name: &str,
        attribute_name: &str,
        value: &str,
    ) -> AppResult<()>;

    /// Removes one attribute of a role.
    async fn remove_attribute(&self, role_name: &str, attribute_name: &str) -> AppResult<()>;
}
