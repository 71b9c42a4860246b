use serde::{Deserialize, Serialize};

/// Canonical name of the role created by bootstrap when no login-capable role exists.
pub const DEFAULT_SUPERUSER_NAME: &str = "cassandra";

/// Replication acknowledgement strength requested for one store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyLevel {
    /// One replica anywhere in the cluster.
    One,
    /// One replica in the local datacenter.
    LocalOne,
    /// A majority of replicas in the local datacenter.
    LocalQuorum,
    /// A majority of replicas across the cluster.
    Quorum,
    /// Every replica.
    All,
}

impl ConsistencyLevel {
    /// Returns a stable label for this level.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::One => "one",
            Self::LocalOne => "local_one",
            Self::LocalQuorum => "local_quorum",
            Self::Quorum => "quorum",
            Self::All => "all",
        }
    }

    /// Returns true when the level waits on more than a single replica.
    #[must_use]
    pub fn requires_majority(&self) -> bool {
        matches!(self, Self::LocalQuorum | Self::Quorum | Self::All)
    }
}

/// Selects the consistency level for reads and writes of one role row.
///
/// The default superuser row decides whether bootstrap runs at all, so every
/// node must agree on it; other rows are read at the cheapest level.
#[must_use]
pub fn consistency_for_role(role_name: &str) -> ConsistencyLevel {
    if role_name == DEFAULT_SUPERUSER_NAME {
        return ConsistencyLevel::Quorum;
    }

    ConsistencyLevel::LocalOne
}
