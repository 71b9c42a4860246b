//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod consistency;
mod role;
mod schema;

pub use consistency::{ConsistencyLevel, DEFAULT_SUPERUSER_NAME, consistency_for_role};
pub use role::{
    RecursiveRoleQuery, RoleConfig, RoleConfigUpdate, RoleName, RoleRecord, collect_role_names,
    expand_one_level,
};
pub use schema::MetadataTable;
