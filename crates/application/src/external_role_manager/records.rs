use rolegate_core::{AppError, AppResult};
use rolegate_domain::{RoleConfig, RoleConfigUpdate, RoleName, RoleRecord, consistency_for_role};
use tracing::debug;

use super::ExternalRoleManager;

impl ExternalRoleManager {
    /// Looks up one role row, returning `None` when it does not exist.
    pub async fn find(&self, role_name: &str) -> AppResult<Option<RoleRecord>> {
        let role_name = RoleName::new(role_name)?;
        self.store
            .find_role(role_name.as_str(), consistency_for_role(role_name.as_str()))
            .await
    }

    /// Looks up one role row, failing with `NonexistentRole` when it does not exist.
    pub async fn require(&self, role_name: &str) -> AppResult<RoleRecord> {
        self.find(role_name)
            .await?
            .ok_or_else(|| AppError::NonexistentRole(role_name.to_owned()))
    }

    /// Returns the superuser flag, or `false` for unknown roles.
    pub async fn is_superuser(&self, role_name: &str) -> AppResult<bool> {
        Ok(self
            .find(role_name)
            .await?
            .is_some_and(|record| record.is_superuser))
    }

    /// Returns the login flag, or `false` for unknown roles.
    pub async fn can_login(&self, role_name: &str) -> AppResult<bool> {
        Ok(self
            .find(role_name)
            .await?
            .is_some_and(|record| record.can_login))
    }

    /// Writes the flags of a role unconditionally.
    ///
    /// This bypasses the external identity system and exists for bootstrap
    /// and administrative setup.
    pub async fn create_or_replace(&self, role_name: &str, config: RoleConfig) -> AppResult<()> {
        let role_name = RoleName::new(role_name)?;
        self.store
            .upsert_role(
                role_name.as_str(),
                config,
                consistency_for_role(role_name.as_str()),
            )
            .await?;

        debug!(
            role = %role_name,
            is_superuser = config.is_superuser,
            can_login = config.can_login,
            "role row written"
        );
        Ok(())
    }

    /// Creates a role through [`Self::create_or_replace`].
    pub async fn create(&self, role_name: &str, config: RoleConfig) -> AppResult<()> {
        self.create_or_replace(role_name, config).await
    }

    /// Accepts and ignores flag changes; the external identity system owns them.
    pub async fn alter(&self, _role_name: &str, _update: RoleConfigUpdate) -> AppResult<()> {
        Ok(())
    }

    /// Always fails: roles are removed by the external identity system.
    pub async fn drop_role(&self, role_name: &str) -> AppResult<()> {
        Err(AppError::NotImplemented(format!(
            "dropping role '{role_name}' must go through the external identity system"
        )))
    }

    /// Always fails: memberships are managed by the external identity system.
    pub async fn grant(&self, grantee_name: &str, role_name: &str) -> AppResult<()> {
        Err(AppError::NotImplemented(format!(
            "granting '{role_name}' to '{grantee_name}' must go through the external identity system"
        )))
    }

    /// Always fails: memberships are managed by the external identity system.
    pub async fn revoke(&self, revokee_name: &str, role_name: &str) -> AppResult<()> {
        Err(AppError::NotImplemented(format!(
            "revoking '{role_name}' from '{revokee_name}' must go through the external identity system"
        )))
    }

    /// Reports every role as existing.
    ///
    /// Users are created upstream by the authenticator and groups have no row
    /// of their own, so absence is never reported. Callers that gate on this
    /// (the attribute writers below) are therefore never refused.
    pub async fn exists(&self, _role_name: &str) -> AppResult<bool> {
        Ok(true)
    }
}
