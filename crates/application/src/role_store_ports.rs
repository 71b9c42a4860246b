mod lease;
mod schema;
mod store;

pub use lease::{BootstrapLease, BootstrapLeaseCoordinator};
pub use schema::SchemaMigrator;
pub use store::RoleStore;
