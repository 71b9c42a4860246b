//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_bootstrap_lease_coordinator;
mod in_memory_role_store;
mod postgres_role_store;
mod postgres_schema_migrator;
mod postgres_support;
mod redis_bootstrap_lease_coordinator;

pub use in_memory_bootstrap_lease_coordinator::InMemoryBootstrapLeaseCoordinator;
pub use in_memory_role_store::InMemoryRoleStore;
pub use postgres_role_store::PostgresRoleStore;
pub use postgres_schema_migrator::PostgresSchemaMigrator;
pub use redis_bootstrap_lease_coordinator::RedisBootstrapLeaseCoordinator;
