use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use rolegate_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Validated role identifier.
///
/// Only the empty string is rejected. Names are otherwise opaque keys owned by
/// the external identity system, whitespace included.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoleName(String);

impl RoleName {
    /// Creates a validated role name.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(AppError::Validation(
                "role name must not be empty".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Consumes the name and returns the owned string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for RoleName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Stored role row.
///
/// `member_of` names other roles by string only. A name listed there may have
/// no record of its own (an implicit group), and nothing prevents cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    /// Primary key.
    pub name: String,
    /// Grants every permission when true.
    pub is_superuser: bool,
    /// Allows authenticating as this role.
    pub can_login: bool,
    /// Roles this role is a member of.
    pub member_of: BTreeSet<String>,
}

impl RoleRecord {
    /// Creates a record without memberships.
    #[must_use]
    pub fn new(name: impl Into<String>, config: RoleConfig) -> Self {
        Self {
            name: name.into(),
            is_superuser: config.is_superuser,
            can_login: config.can_login,
            member_of: BTreeSet::new(),
        }
    }

    /// Adds memberships to the record.
    #[must_use]
    pub fn with_member_of<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.member_of.extend(roles.into_iter().map(Into::into));
        self
    }
}

/// Flags written by `create_or_replace`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleConfig {
    /// Superuser flag.
    pub is_superuser: bool,
    /// Login flag.
    pub can_login: bool,
}

/// Requested flag changes for `alter`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleConfigUpdate {
    /// New superuser flag, if any.
    pub is_superuser: Option<bool>,
    /// New login flag, if any.
    pub can_login: Option<bool>,
}

/// Recursion mode offered by the role-manager contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecursiveRoleQuery {
    /// Follow memberships transitively.
    Yes,
    /// Only direct memberships.
    No,
}

/// Returns the grantee plus its direct memberships.
///
/// Expansion stops after one level whatever the memberships of the listed
/// roles are, so cycles and long chains are harmless.
#[must_use]
pub fn expand_one_level(grantee_name: &str, record: &RoleRecord) -> BTreeSet<String> {
    let mut roles = BTreeSet::from([grantee_name.to_owned()]);
    roles.extend(record.member_of.iter().cloned());
    roles
}

/// Collects every explicit role name and every name referenced as a membership.
#[must_use]
pub fn collect_role_names<'a, I>(records: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a RoleRecord>,
{
    let mut roles = BTreeSet::new();
    for record in records {
        roles.insert(record.name.clone());
        roles.extend(record.member_of.iter().cloned());
    }
    roles
}
