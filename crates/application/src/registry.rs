use std::collections::HashMap;
use std::sync::Arc;

use rolegate_core::{AppError, AppResult};

use crate::external_role_manager::{EXTERNAL_ROLE_MANAGER_NAME, ExternalRoleManager};
use crate::readiness::SystemReadyGate;
use crate::role_manager::RoleManager;
use crate::role_store_ports::{BootstrapLeaseCoordinator, RoleStore, SchemaMigrator};

/// Tunables shared by role manager providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleManagerSettings {
    /// Keyspace (schema) holding the role tables.
    pub keyspace: String,
    /// Identity used when claiming the bootstrap lease.
    pub holder_id: String,
    /// Bootstrap lease lifetime in seconds.
    pub lease_seconds: u32,
}

impl Default for RoleManagerSettings {
    fn default() -> Self {
        Self {
            keyspace: "auth".to_owned(),
            holder_id: format!("node-{}", uuid::Uuid::new_v4()),
            lease_seconds: 60,
        }
    }
}

/// External collaborators a provider is constructed with.
#[derive(Clone)]
pub struct RoleManagerBackends {
    /// Query-execution collaborator.
    pub role_store: Arc<dyn RoleStore>,
    /// Schema-migration collaborator.
    pub schema_migrator: Arc<dyn SchemaMigrator>,
    /// Single-execution coordination for bootstrap.
    pub lease_coordinator: Arc<dyn BootstrapLeaseCoordinator>,
    /// Process readiness signal gating default role setup.
    pub readiness: SystemReadyGate,
    /// Provider tunables.
    pub settings: RoleManagerSettings,
}

/// Builds one role manager provider.
pub trait RoleManagerFactory: Send + Sync {
    /// Identifier the provider is registered under.
    fn name(&self) -> &'static str;

    /// Creates a provider bound to the given collaborators.
    fn create(&self, backends: RoleManagerBackends) -> Arc<dyn RoleManager>;
}

/// Factory for [`ExternalRoleManager`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalRoleManagerFactory;

impl RoleManagerFactory for ExternalRoleManagerFactory {
    fn name(&self) -> &'static str {
        EXTERNAL_ROLE_MANAGER_NAME
    }

    fn create(&self, backends: RoleManagerBackends) -> Arc<dyn RoleManager> {
        Arc::new(ExternalRoleManager::new(backends))
    }
}

/// Registry of role manager factories keyed by identifier.
///
/// The host builds one at startup and drops it at teardown.
#[derive(Default)]
pub struct RoleManagerRegistry {
    factories: HashMap<String, Arc<dyn RoleManagerFactory>>,
}

impl RoleManagerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every provider shipped with this crate.
    #[must_use]
    pub fn with_builtin_providers() -> Self {
        let mut factories: HashMap<String, Arc<dyn RoleManagerFactory>> = HashMap::new();
        factories.insert(
            EXTERNAL_ROLE_MANAGER_NAME.to_owned(),
            Arc::new(ExternalRoleManagerFactory),
        );
        Self { factories }
    }

    /// Registers one factory.
    pub fn register(&mut self, factory: Arc<dyn RoleManagerFactory>) -> AppResult<()> {
        let name = factory.name();
        if self.factories.contains_key(name) {
            return Err(AppError::Conflict(format!(
                "role manager '{name}' is already registered"
            )));
        }

        self.factories.insert(name.to_owned(), factory);
        Ok(())
    }

    /// Removes one factory and returns whether it was registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.factories.remove(name).is_some()
    }

    /// Returns registered identifiers in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Creates the provider registered under `name`.
    pub fn create(
        &self,
        name: &str,
        backends: RoleManagerBackends,
    ) -> AppResult<Arc<dyn RoleManager>> {
        self.factories
            .get(name)
            .map(|factory| factory.create(backends))
            .ok_or_else(|| AppError::NotFound(format!("role manager '{name}' is not registered")))
    }
}
