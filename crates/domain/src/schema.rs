/// Tables owned by the role manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataTable {
    /// One row per role.
    Roles,
    /// One row per (role, attribute name).
    RoleAttributes,
}

impl MetadataTable {
    /// Returns the unqualified table name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Roles => "roles",
            Self::RoleAttributes => "role_attributes",
        }
    }

    /// Returns the table name qualified by the keyspace.
    #[must_use]
    pub fn qualified_name(&self, keyspace: &str) -> String {
        format!("{keyspace}.{}", self.name())
    }

    /// Returns every metadata table.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[MetadataTable] = &[MetadataTable::Roles, MetadataTable::RoleAttributes];

        ALL
    }
}
