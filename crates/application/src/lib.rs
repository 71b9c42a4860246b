//! Application services and ports.

#![forbid(unsafe_code)]

mod external_role_manager;
mod readiness;
mod registry;
mod role_manager;
mod role_store_ports;

pub use external_role_manager::{BootstrapState, EXTERNAL_ROLE_MANAGER_NAME, ExternalRoleManager};
pub use readiness::SystemReadyGate;
pub use registry::{
    ExternalRoleManagerFactory, RoleManagerBackends, RoleManagerFactory, RoleManagerRegistry,
    RoleManagerSettings,
};
pub use role_manager::RoleManager;
pub use role_store_ports::{BootstrapLease, BootstrapLeaseCoordinator, RoleStore, SchemaMigrator};
