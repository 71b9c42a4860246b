use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use rolegate_core::{AppError, AppResult};
use rolegate_domain::{MetadataTable, RecursiveRoleQuery, RoleConfig, RoleConfigUpdate};

use crate::readiness::SystemReadyGate;
use crate::registry::{RoleManagerBackends, RoleManagerSettings};
use crate::role_manager::RoleManager;
use crate::role_store_ports::{BootstrapLeaseCoordinator, RoleStore, SchemaMigrator};

/// Identifier the external-identity role manager registers under.
pub const EXTERNAL_ROLE_MANAGER_NAME: &str = "rolegate.ExternalIdentityRoleManager";

/// Progress of the one-shot default role setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapState {
    /// Setup has not finished on this node.
    Pending,
    /// This node ran setup to completion. Terminal.
    Done,
    /// Another holder of the bootstrap lease runs setup. Terminal.
    HandledElsewhere,
    /// Setup failed on this node and will not be retried. Terminal.
    Failed(AppError),
}

impl BootstrapState {
    /// Returns true once no further transition can happen.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Role manager whose role lifecycle belongs to an external identity system.
///
/// Role flags and memberships are written by that system; this provider
/// only reads them, creates the default superuser during bootstrap, and
/// owns role attributes.
pub struct ExternalRoleManager {
    store: Arc<dyn RoleStore>,
    migrator: Arc<dyn SchemaMigrator>,
    lease_coordinator: Arc<dyn BootstrapLeaseCoordinator>,
    readiness: SystemReadyGate,
    settings: RoleManagerSettings,
    started: AtomicBool,
    shutdown: CancellationToken,
    state: Arc<watch::Sender<BootstrapState>>,
    bootstrap_task: Mutex<Option<JoinHandle<AppResult<()>>>>,
}

impl ExternalRoleManager {
    /// Creates a provider bound to the given collaborators.
    #[must_use]
    pub fn new(backends: RoleManagerBackends) -> Self {
        let (state, _) = watch::channel(BootstrapState::Pending);
        Self {
            store: backends.role_store,
            migrator: backends.schema_migrator,
            lease_coordinator: backends.lease_coordinator,
            readiness: backends.readiness,
            settings: backends.settings,
            started: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            state: Arc::new(state),
            bootstrap_task: Mutex::new(None),
        }
    }

    /// Returns the current bootstrap state.
    #[must_use]
    pub fn bootstrap_state(&self) -> BootstrapState {
        self.state.borrow().clone()
    }
}

mod attributes;
mod bootstrap;
mod hierarchy;
mod records;

#[cfg(test)]
mod tests;

#[async_trait]
impl RoleManager for ExternalRoleManager {
    fn qualified_name(&self) -> &'static str {
        EXTERNAL_ROLE_MANAGER_NAME
    }

    fn protected_resources(&self) -> Vec<String> {
        vec![MetadataTable::Roles.qualified_name(self.settings.keyspace.as_str())]
    }

    async fn start(&self) -> AppResult<()> {
        ExternalRoleManager::start(self).await
    }

    async fn stop(&self) -> AppResult<()> {
        ExternalRoleManager::stop(self).await
    }

    async fn wait_for_bootstrap(&self) -> AppResult<()> {
        ExternalRoleManager::wait_for_bootstrap(self).await
    }

    async fn create(&self, role_name: &str, config: RoleConfig) -> AppResult<()> {
        ExternalRoleManager::create(self, role_name, config).await
    }

    async fn drop_role(&self, role_name: &str) -> AppResult<()> {
        ExternalRoleManager::drop_role(self, role_name).await
    }

    async fn alter(&self, role_name: &str, update: RoleConfigUpdate) -> AppResult<()> {
        ExternalRoleManager::alter(self, role_name, update).await
    }

    async fn grant(&self, grantee_name: &str, role_name: &str) -> AppResult<()> {
        ExternalRoleManager::grant(self, grantee_name, role_name).await
    }

    async fn revoke(&self, revokee_name: &str, role_name: &str) -> AppResult<()> {
        ExternalRoleManager::revoke(self, revokee_name, role_name).await
    }

    async fn granted_roles(
        &self,
        grantee_name: &str,
        mode: RecursiveRoleQuery,
    ) -> AppResult<BTreeSet<String>> {
        ExternalRoleManager::granted_roles(self, grantee_name, mode).await
    }

    async fn all_roles(&self) -> AppResult<BTreeSet<String>> {
        ExternalRoleManager::all_roles(self).await
    }

    async fn exists(&self, role_name: &str) -> AppResult<bool> {
        ExternalRoleManager::exists(self, role_name).await
    }

    async fn is_superuser(&self, role_name: &str) -> AppResult<bool> {
        ExternalRoleManager::is_superuser(self, role_name).await
    }

    async fn can_login(&self, role_name: &str) -> AppResult<bool> {
        ExternalRoleManager::can_login(self, role_name).await
    }

    async fn get_attribute(
        &self,
        role_name: &str,
        attribute_name: &str,
    ) -> AppResult<Option<String>> {
        ExternalRoleManager::get_attribute(self, role_name, attribute_name).await
    }

    async fn attribute_for_all(
        &self,
        attribute_name: &str,
    ) -> AppResult<BTreeMap<String, String>> {
        ExternalRoleManager::attribute_for_all(self, attribute_name).await
    }

    async fn set_attribute(
        &self,
        role_name: &str,
        attribute_name: &str,
        value: &str,
    ) -> AppResult<()> {
        ExternalRoleManager::set_attribute(self, role_name, attribute_name, value).await
    }

    async fn remove_attribute(&self, role_name: &str, attribute_name: &str) -> AppResult<()> {
        ExternalRoleManager::remove_attribute(self, role_name, attribute_name).await
    }
}
