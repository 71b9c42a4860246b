use async_trait::async_trait;

use rolegate_core::AppResult;

/// Lease held by the node running the bootstrap sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapLease {
    /// Coordination scope key.
    pub scope_key: String,
    /// Lease token used for safe release.
    pub token: String,
    /// Lease holder identity.
    pub holder_id: String,
}

/// Distributed coordination port that lets a single holder run bootstrap.
#[async_trait]
pub trait BootstrapLeaseCoordinator: Send + Sync {
    /// Attempts to acquire the lease for the given scope.
    ///
    /// Returns `None` while another holder owns an unexpired lease.
    async fn try_acquire_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<BootstrapLease>>;

    /// Releases one lease using token compare-and-delete semantics.
    async fn release_lease(&self, lease: &BootstrapLease) -> AppResult<()>;

    /// Extends one held lease and returns false when token ownership changed.
    async fn renew_lease(&self, lease: &BootstrapLease, lease_seconds: u32) -> AppResult<bool>;
}
