use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use rolegate_core::{AppError, AppResult, CancellationKind};
use rolegate_domain::{ConsistencyLevel, DEFAULT_SUPERUSER_NAME, MetadataTable, RoleConfig};

use crate::readiness::SystemReadyGate;
use crate::role_store_ports::{
    BootstrapLease, BootstrapLeaseCoordinator, RoleStore, SchemaMigrator,
};

use super::{BootstrapState, ExternalRoleManager};

const BOOTSTRAP_LEASE_SCOPE: &str = "role-manager-bootstrap";
const MIN_RENEW_INTERVAL: Duration = Duration::from_millis(100);

impl ExternalRoleManager {
    /// Creates the `roles` and `role_attributes` tables when missing.
    pub async fn ensure_schema(&self) -> AppResult<()> {
        ensure_schema(self.migrator.as_ref()).await
    }

    /// Creates the schema and schedules default role setup in the background.
    ///
    /// Only the first call on this instance does anything, and only the
    /// holder of the cluster bootstrap lease proceeds past the lease claim.
    /// Everyone else publishes [`BootstrapState::HandledElsewhere`].
    pub async fn start(&self) -> AppResult<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            debug!("role manager already started on this node");
            return Ok(());
        }

        let lease = match self
            .lease_coordinator
            .try_acquire_lease(
                BOOTSTRAP_LEASE_SCOPE,
                self.settings.holder_id.as_str(),
                self.settings.lease_seconds,
            )
            .await
        {
            Ok(Some(lease)) => lease,
            Ok(None) => {
                debug!(
                    holder_id = %self.settings.holder_id,
                    "role manager bootstrap is handled by another holder"
                );
                self.state.send_replace(BootstrapState::HandledElsewhere);
                return Ok(());
            }
            Err(error) => {
                self.started.store(false, Ordering::Release);
                return Err(error);
            }
        };

        if let Err(error) = self.ensure_schema().await {
            self.started.store(false, Ordering::Release);
            release_lease(self.lease_coordinator.as_ref(), &lease).await;
            return Err(error);
        }

        let task = DefaultRoleTask {
            store: self.store.clone(),
            migrator: self.migrator.clone(),
            lease_coordinator: self.lease_coordinator.clone(),
            readiness: self.readiness.clone(),
            shutdown: self.shutdown.clone(),
            state: self.state.clone(),
            lease,
            lease_seconds: self.settings.lease_seconds,
        };
        let handle = tokio::spawn(task.run());
        *self.bootstrap_task.lock().await = Some(handle);

        Ok(())
    }

    /// Cancels the background setup and waits for it to finish.
    ///
    /// Interruptions caused by this shutdown are swallowed; any other failure
    /// of the setup task is returned.
    pub async fn stop(&self) -> AppResult<()> {
        self.shutdown.cancel();

        let task = self.bootstrap_task.lock().await.take();
        let Some(handle) = task else {
            return Ok(());
        };

        match handle.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) if error.is_cancellation() => {
                debug!(error = %error, "default role setup interrupted by shutdown");
                Ok(())
            }
            Ok(Err(error)) => Err(error),
            Err(error) if error.is_cancelled() => Ok(()),
            Err(error) => Err(AppError::Internal(format!(
                "default role setup task failed: {error}"
            ))),
        }
    }

    /// Suspends until default role setup reaches a terminal state.
    ///
    /// `Done` and `HandledElsewhere` resolve to `Ok(())`; a failed setup
    /// returns its error. A shutdown while still pending returns
    /// `Cancelled(AbortRequested)`.
    pub async fn wait_for_bootstrap(&self) -> AppResult<()> {
        let mut receiver = self.state.subscribe();
        let terminal = async {
            receiver
                .wait_for(BootstrapState::is_terminal)
                .await
                .map(|state| state.clone())
                .map_err(|error| AppError::Internal(format!("bootstrap state closed: {error}")))
        };
        let state = tokio::select! {
            biased;
            state = terminal => state?,
            () = self.shutdown.cancelled() => {
                return Err(AppError::Cancelled(CancellationKind::AbortRequested));
            }
        };

        match state {
            BootstrapState::Failed(error) => Err(error),
            _ => Ok(()),
        }
    }
}

async fn ensure_schema(migrator: &dyn SchemaMigrator) -> AppResult<()> {
    futures::try_join!(
        migrator.create_table_if_missing(MetadataTable::Roles),
        migrator.create_table_if_missing(MetadataTable::RoleAttributes),
    )?;

    Ok(())
}

/// Inserts the default superuser unless some role can already log in.
///
/// Returns whether the row was written.
async fn create_default_role_if_missing(store: &dyn RoleStore) -> AppResult<bool> {
    let result = insert_default_role(store).await;

    if let Err(AppError::Unavailable(detail)) = &result {
        warn!(
            error = %detail,
            "skipped default role setup: some nodes were not ready"
        );
    }

    result
}

async fn insert_default_role(store: &dyn RoleStore) -> AppResult<bool> {
    if store.any_login_role(ConsistencyLevel::Quorum).await? {
        return Ok(false);
    }

    store
        .upsert_role(
            DEFAULT_SUPERUSER_NAME,
            RoleConfig {
                is_superuser: true,
                can_login: true,
            },
            ConsistencyLevel::Quorum,
        )
        .await?;

    info!(role = DEFAULT_SUPERUSER_NAME, "created default superuser role");
    Ok(true)
}

async fn release_lease(coordinator: &dyn BootstrapLeaseCoordinator, lease: &BootstrapLease) {
    if let Err(error) = coordinator.release_lease(lease).await {
        warn!(
            scope_key = %lease.scope_key,
            error = %error,
            "failed to release bootstrap lease"
        );
    }
}

/// Renewal cadence keeping a lease alive with two spare renewals per term.
fn renew_interval(lease_seconds: u32) -> Duration {
    (Duration::from_secs(u64::from(lease_seconds)) / 3).max(MIN_RENEW_INTERVAL)
}

struct DefaultRoleTask {
    store: Arc<dyn RoleStore>,
    migrator: Arc<dyn SchemaMigrator>,
    lease_coordinator: Arc<dyn BootstrapLeaseCoordinator>,
    readiness: SystemReadyGate,
    shutdown: CancellationToken,
    state: Arc<watch::Sender<BootstrapState>>,
    lease: BootstrapLease,
    lease_seconds: u32,
}

impl DefaultRoleTask {
    async fn run(self) -> AppResult<()> {
        let outcome = tokio::select! {
            outcome = self.run_steps() => outcome,
            lost = self.keep_lease_alive() => lost,
        };
        release_lease(self.lease_coordinator.as_ref(), &self.lease).await;

        if let Err(error) = &outcome
            && !error.is_cancellation()
        {
            self.state.send_replace(BootstrapState::Failed(error.clone()));
        }

        outcome
    }

    /// Renews the lease until it is lost; the steps future wins otherwise.
    async fn keep_lease_alive(&self) -> AppResult<()> {
        let mut ticker = tokio::time::interval(renew_interval(self.lease_seconds));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match self
                .lease_coordinator
                .renew_lease(&self.lease, self.lease_seconds)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    warn!(
                        scope_key = %self.lease.scope_key,
                        "bootstrap lease lost before default role setup finished"
                    );
                    self.state.send_replace(BootstrapState::HandledElsewhere);
                    return Err(AppError::Cancelled(CancellationKind::AbortRequested));
                }
                Err(error) => {
                    warn!(
                        scope_key = %self.lease.scope_key,
                        error = %error,
                        "failed to renew bootstrap lease"
                    );
                }
            }
        }
    }

    async fn run_steps(&self) -> AppResult<()> {
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => {
                return Err(AppError::Cancelled(CancellationKind::AbortRequested));
            }
            ready = self.readiness.wait_until_ready() => ready?,
        }

        self.migrator
            .wait_for_schema_agreement(&self.shutdown)
            .await?;

        if self.shutdown.is_cancelled() {
            return Err(AppError::Cancelled(CancellationKind::AbortRequested));
        }

        create_default_role_if_missing(self.store.as_ref()).await?;

        self.state.send_replace(BootstrapState::Done);
        info!("role manager bootstrap complete");
        Ok(())
    }
}
