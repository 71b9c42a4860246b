use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

use rolegate_core::{AppError, AppResult, CancellationKind};
use rolegate_domain::{
    ConsistencyLevel, DEFAULT_SUPERUSER_NAME, MetadataTable, RecursiveRoleQuery, RoleConfig,
    RoleConfigUpdate, RoleRecord,
};

use crate::readiness::SystemReadyGate;
use crate::registry::{RoleManagerBackends, RoleManagerRegistry, RoleManagerSettings};
use crate::role_manager::RoleManager;
use crate::role_store_ports::{
    BootstrapLease, BootstrapLeaseCoordinator, RoleStore, SchemaMigrator,
};

use super::{BootstrapState, EXTERNAL_ROLE_MANAGER_NAME, ExternalRoleManager};

#[derive(Default)]
struct FakeRoleStore {
    roles: Mutex<HashMap<String, RoleRecord>>,
    attributes: Mutex<HashMap<(String, String), String>>,
    reads: Mutex<Vec<(String, ConsistencyLevel)>>,
    unavailable: AtomicBool,
    failing_attribute_role: Mutex<Option<String>>,
    login_checked: Notify,
}

impl FakeRoleStore {
    async fn seed(&self, record: RoleRecord) {
        self.roles.lock().await.insert(record.name.clone(), record);
    }

    async fn login_role_names(&self) -> BTreeSet<String> {
        self.roles
            .lock()
            .await
            .values()
            .filter(|record| record.can_login)
            .map(|record| record.name.clone())
            .collect()
    }
}

#[async_trait]
impl RoleStore for FakeRoleStore {
    async fn find_role(
        &self,
        role_name: &str,
        consistency: ConsistencyLevel,
    ) -> AppResult<Option<RoleRecord>> {
        self.reads
            .lock()
            .await
            .push((role_name.to_owned(), consistency));
        Ok(self.roles.lock().await.get(role_name).cloned())
    }

    async fn upsert_role(
        &self,
        role_name: &str,
        config: RoleConfig,
        _consistency: ConsistencyLevel,
    ) -> AppResult<()> {
        if self.unavailable.load(Ordering::Acquire) {
            return Err(AppError::Unavailable("not enough replicas".to_owned()));
        }

        let mut roles = self.roles.lock().await;
        let record = roles
            .entry(role_name.to_owned())
            .or_insert_with(|| RoleRecord::new(role_name, config));
        record.is_superuser = config.is_superuser;
        record.can_login = config.can_login;
        Ok(())
    }

    async fn list_roles(&self, _consistency: ConsistencyLevel) -> AppResult<Vec<RoleRecord>> {
        Ok(self.roles.lock().await.values().cloned().collect())
    }

    async fn any_login_role(&self, _consistency: ConsistencyLevel) -> AppResult<bool> {
        self.login_checked.notify_one();
        if self.unavailable.load(Ordering::Acquire) {
            return Err(AppError::Unavailable("not enough replicas".to_owned()));
        }

        Ok(self
            .roles
            .lock()
            .await
            .values()
            .any(|record| record.can_login))
    }

    async fn find_attribute(
        &self,
        role_name: &str,
        attribute_name: &str,
        _consistency: ConsistencyLevel,
    ) -> AppResult<Option<String>> {
        if self.failing_attribute_role.lock().await.as_deref() == Some(role_name) {
            return Err(AppError::Internal("attribute read failed".to_owned()));
        }

        Ok(self
            .attributes
            .lock()
            .await
            .get(&(role_name.to_owned(), attribute_name.to_owned()))
            .cloned())
    }

    async fn upsert_attribute(
        &self,
        role_name: &str,
        attribute_name: &str,
        value: &str,
        _consistency: ConsistencyLevel,
    ) -> AppResult<()> {
        self.attributes.lock().await.insert(
            (role_name.to_owned(), attribute_name.to_owned()),
            value.to_owned(),
        );
        Ok(())
    }

    async fn delete_attribute(
        &self,
        role_name: &str,
        attribute_name: &str,
        _consistency: ConsistencyLevel,
    ) -> AppResult<()> {
        self.attributes
            .lock()
            .await
            .remove(&(role_name.to_owned(), attribute_name.to_owned()));
        Ok(())
    }
}

#[derive(Default)]
struct FakeSchemaMigrator {
    created: Mutex<Vec<MetadataTable>>,
    fail_creation: AtomicBool,
    failing_table: Mutex<Option<MetadataTable>>,
    agreement_pending: AtomicBool,
    agreement_entered: Notify,
}

#[async_trait]
impl SchemaMigrator for FakeSchemaMigrator {
    async fn create_table_if_missing(&self, table: MetadataTable) -> AppResult<()> {
        if self.fail_creation.load(Ordering::Acquire)
            || *self.failing_table.lock().await == Some(table)
        {
            return Err(AppError::Internal("schema change rejected".to_owned()));
        }

        self.created.lock().await.push(table);
        Ok(())
    }

    async fn wait_for_schema_agreement(&self, shutdown: &CancellationToken) -> AppResult<()> {
        self.agreement_entered.notify_one();
        if self.agreement_pending.load(Ordering::Acquire) {
            shutdown.cancelled().await;
        }

        if shutdown.is_cancelled() {
            return Err(AppError::Cancelled(CancellationKind::WaitAborted));
        }

        Ok(())
    }
}

#[derive(Default)]
struct FakeLeaseCoordinator {
    holder: Mutex<Option<String>>,
    releases: AtomicUsize,
    renewals: AtomicUsize,
}

#[async_trait]
impl BootstrapLeaseCoordinator for FakeLeaseCoordinator {
    async fn try_acquire_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        _lease_seconds: u32,
    ) -> AppResult<Option<BootstrapLease>> {
        let mut holder = self.holder.lock().await;
        if holder.is_some() {
            return Ok(None);
        }

        *holder = Some(holder_id.to_owned());
        Ok(Some(BootstrapLease {
            scope_key: scope_key.to_owned(),
            token: format!("{holder_id}:token"),
            holder_id: holder_id.to_owned(),
        }))
    }

    async fn release_lease(&self, lease: &BootstrapLease) -> AppResult<()> {
        let mut holder = self.holder.lock().await;
        if holder.as_deref() == Some(lease.holder_id.as_str()) {
            *holder = None;
        }
        self.releases.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn renew_lease(&self, lease: &BootstrapLease, _lease_seconds: u32) -> AppResult<bool> {
        self.renewals.fetch_add(1, Ordering::AcqRel);
        Ok(self.holder.lock().await.as_deref() == Some(lease.holder_id.as_str()))
    }
}

struct Harness {
    manager: ExternalRoleManager,
    store: Arc<FakeRoleStore>,
    migrator: Arc<FakeSchemaMigrator>,
    lease_coordinator: Arc<FakeLeaseCoordinator>,
    readiness: SystemReadyGate,
}

fn backends(
    store: Arc<FakeRoleStore>,
    migrator: Arc<FakeSchemaMigrator>,
    lease_coordinator: Arc<FakeLeaseCoordinator>,
    readiness: SystemReadyGate,
    holder_id: &str,
    lease_seconds: u32,
) -> RoleManagerBackends {
    RoleManagerBackends {
        role_store: store,
        schema_migrator: migrator,
        lease_coordinator,
        readiness,
        settings: RoleManagerSettings {
            keyspace: "auth".to_owned(),
            holder_id: holder_id.to_owned(),
            lease_seconds,
        },
    }
}

fn harness() -> Harness {
    harness_with_lease(30)
}

fn harness_with_lease(lease_seconds: u32) -> Harness {
    let store = Arc::new(FakeRoleStore::default());
    let migrator = Arc::new(FakeSchemaMigrator::default());
    let lease_coordinator = Arc::new(FakeLeaseCoordinator::default());
    let readiness = SystemReadyGate::new();
    let manager = ExternalRoleManager::new(backends(
        store.clone(),
        migrator.clone(),
        lease_coordinator.clone(),
        readiness.clone(),
        "node-a",
        lease_seconds,
    ));

    Harness {
        manager,
        store,
        migrator,
        lease_coordinator,
        readiness,
    }
}

fn login_role(name: &str) -> RoleRecord {
    RoleRecord::new(
        name,
        RoleConfig {
            is_superuser: false,
            can_login: true,
        },
    )
}

async fn wait_for_bootstrap(manager: &ExternalRoleManager) {
    let waited =
        tokio::time::timeout(Duration::from_secs(5), manager.wait_for_bootstrap()).await;
    assert!(matches!(waited, Ok(Ok(()))));
}

#[tokio::test]
async fn create_or_replace_is_idempotent() {
    let harness = harness();
    let config = RoleConfig {
        is_superuser: true,
        can_login: false,
    };

    assert!(harness.manager.create_or_replace("ops", config).await.is_ok());
    let once = harness.store.roles.lock().await.clone();
    assert!(harness.manager.create_or_replace("ops", config).await.is_ok());
    let twice = harness.store.roles.lock().await.clone();

    assert_eq!(once, twice);
    assert_eq!(twice.len(), 1);
}

#[tokio::test]
async fn create_or_replace_keeps_memberships() {
    let harness = harness();
    harness
        .store
        .seed(RoleRecord::new("alice", RoleConfig::default()).with_member_of(["eng"]))
        .await;

    let result = harness
        .manager
        .create_or_replace(
            "alice",
            RoleConfig {
                is_superuser: false,
                can_login: true,
            },
        )
        .await;
    assert!(result.is_ok());

    let record = harness.manager.require("alice").await;
    assert!(matches!(
        record,
        Ok(RoleRecord { can_login: true, ref member_of, .. }) if member_of.contains("eng")
    ));
}

#[tokio::test]
async fn unknown_role_is_neither_superuser_nor_login() {
    let harness = harness();

    assert!(matches!(harness.manager.is_superuser("ghost").await, Ok(false)));
    assert!(matches!(harness.manager.can_login("ghost").await, Ok(false)));
}

#[tokio::test]
async fn flags_reflect_stored_record() {
    let harness = harness();
    harness
        .store
        .seed(RoleRecord::new(
            "admin",
            RoleConfig {
                is_superuser: true,
                can_login: true,
            },
        ))
        .await;

    assert!(matches!(harness.manager.is_superuser("admin").await, Ok(true)));
    assert!(matches!(harness.manager.can_login("admin").await, Ok(true)));
}

#[tokio::test]
async fn require_fails_only_when_find_is_absent() {
    let harness = harness();
    harness.store.seed(login_role("alice")).await;

    assert!(matches!(harness.manager.find("alice").await, Ok(Some(_))));
    assert!(harness.manager.require("alice").await.is_ok());

    assert!(matches!(harness.manager.find("bob").await, Ok(None)));
    assert!(matches!(
        harness.manager.require("bob").await,
        Err(AppError::NonexistentRole(name)) if name == "bob"
    ));
}

#[tokio::test]
async fn empty_role_names_are_rejected() {
    let harness = harness();

    assert!(matches!(
        harness.manager.find("").await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn whitespace_role_names_reach_the_store() {
    let harness = harness();
    harness.store.seed(login_role(" ")).await;

    assert!(matches!(harness.manager.find(" ").await, Ok(Some(record)) if record.name == " "));
    assert!(matches!(harness.manager.can_login(" ").await, Ok(true)));
    assert!(matches!(harness.manager.find("  ").await, Ok(None)));
}

#[tokio::test]
async fn lookups_use_role_consistency_policy() {
    let harness = harness();

    assert!(harness.manager.find(DEFAULT_SUPERUSER_NAME).await.is_ok());
    assert!(harness.manager.find("alice").await.is_ok());

    let reads = harness.store.reads.lock().await.clone();
    assert_eq!(
        reads,
        vec![
            (DEFAULT_SUPERUSER_NAME.to_owned(), ConsistencyLevel::Quorum),
            ("alice".to_owned(), ConsistencyLevel::LocalOne),
        ]
    );
}

#[tokio::test]
async fn granted_roles_expands_one_level_through_cycles_and_chains() {
    let harness = harness();
    harness
        .store
        .seed(RoleRecord::new("a", RoleConfig::default()).with_member_of(["b"]))
        .await;
    harness
        .store
        .seed(RoleRecord::new("b", RoleConfig::default()).with_member_of(["a", "c"]))
        .await;
    harness
        .store
        .seed(RoleRecord::new("c", RoleConfig::default()).with_member_of(["d"]))
        .await;

    let granted = harness
        .manager
        .granted_roles("a", RecursiveRoleQuery::Yes)
        .await;

    assert!(matches!(
        granted,
        Ok(roles) if roles == BTreeSet::from(["a".to_owned(), "b".to_owned()])
    ));
}

#[tokio::test]
async fn granted_roles_requires_grantee_record() {
    let harness = harness();

    let granted = harness
        .manager
        .granted_roles("ghost", RecursiveRoleQuery::No)
        .await;

    assert!(matches!(granted, Err(AppError::NonexistentRole(_))));
}

#[tokio::test]
async fn all_roles_includes_implicit_groups() {
    let harness = harness();
    harness
        .store
        .seed(login_role("alice").with_member_of(["eng", "ops"]))
        .await;
    harness.store.seed(login_role("bob")).await;

    let roles = harness.manager.all_roles().await;

    assert!(matches!(
        roles,
        Ok(roles) if roles == BTreeSet::from([
            "alice".to_owned(),
            "bob".to_owned(),
            "eng".to_owned(),
            "ops".to_owned(),
        ])
    ));
}

#[tokio::test]
async fn lifecycle_mutations_are_not_implemented() {
    let harness = harness();

    assert!(matches!(
        harness.manager.drop_role("alice").await,
        Err(AppError::NotImplemented(_))
    ));
    assert!(matches!(
        harness.manager.grant("alice", "eng").await,
        Err(AppError::NotImplemented(_))
    ));
    assert!(matches!(
        harness.manager.revoke("alice", "eng").await,
        Err(AppError::NotImplemented(_))
    ));
}

#[tokio::test]
async fn alter_leaves_record_untouched() {
    let harness = harness();
    harness.store.seed(login_role("alice")).await;

    let result = harness
        .manager
        .alter(
            "alice",
            RoleConfigUpdate {
                is_superuser: Some(true),
                can_login: Some(false),
            },
        )
        .await;

    assert!(result.is_ok());
    assert!(matches!(harness.manager.is_superuser("alice").await, Ok(false)));
    assert!(matches!(harness.manager.can_login("alice").await, Ok(true)));
}

#[tokio::test]
async fn exists_reports_every_role() {
    let harness = harness();

    assert!(matches!(harness.manager.exists("never-created").await, Ok(true)));
}

#[tokio::test]
async fn attribute_round_trip() {
    let harness = harness();

    assert!(harness.manager.set_attribute("alice", "k", "v").await.is_ok());
    assert!(matches!(
        harness.manager.get_attribute("alice", "k").await,
        Ok(Some(value)) if value == "v"
    ));

    assert!(harness.manager.remove_attribute("alice", "k").await.is_ok());
    assert!(matches!(
        harness.manager.get_attribute("alice", "k").await,
        Ok(None)
    ));
}

#[tokio::test]
async fn removing_unset_attribute_succeeds() {
    let harness = harness();

    assert!(harness.manager.remove_attribute("alice", "k").await.is_ok());
}

#[tokio::test]
async fn attribute_for_all_covers_explicit_and_implicit_roles() {
    let harness = harness();
    harness
        .store
        .seed(login_role("alice").with_member_of(["eng"]))
        .await;
    harness.store.seed(login_role("bob")).await;

    assert!(harness.manager.set_attribute("alice", "k", "1").await.is_ok());
    assert!(harness.manager.set_attribute("eng", "k", "2").await.is_ok());
    assert!(harness.manager.set_attribute("bob", "other", "3").await.is_ok());

    let values = harness.manager.attribute_for_all("k").await;

    assert!(matches!(
        values,
        Ok(values) if values == BTreeMap::from([
            ("alice".to_owned(), "1".to_owned()),
            ("eng".to_owned(), "2".to_owned()),
        ])
    ));
}

#[tokio::test]
async fn attribute_for_all_fails_when_one_lookup_fails() {
    let harness = harness();
    harness.store.seed(login_role("alice")).await;
    harness.store.seed(login_role("bob")).await;
    *harness.store.failing_attribute_role.lock().await = Some("bob".to_owned());

    let values = harness.manager.attribute_for_all("k").await;

    assert!(matches!(values, Err(AppError::Internal(_))));
}

#[tokio::test]
async fn start_on_empty_store_creates_default_superuser() {
    let harness = harness();
    harness.readiness.mark_ready();

    assert!(harness.manager.start().await.is_ok());
    wait_for_bootstrap(&harness.manager).await;

    assert_eq!(
        harness.store.login_role_names().await,
        BTreeSet::from([DEFAULT_SUPERUSER_NAME.to_owned()])
    );
    assert!(matches!(
        harness.manager.is_superuser(DEFAULT_SUPERUSER_NAME).await,
        Ok(true)
    ));
    assert_eq!(
        harness.migrator.created.lock().await.len(),
        MetadataTable::all().len()
    );
    assert!(harness.manager.stop().await.is_ok());
    assert_eq!(harness.lease_coordinator.releases.load(Ordering::Acquire), 1);
}

#[tokio::test]
async fn start_skips_default_role_when_login_role_exists() {
    let harness = harness();
    harness.store.seed(login_role("alice")).await;
    harness.readiness.mark_ready();

    assert!(harness.manager.start().await.is_ok());
    wait_for_bootstrap(&harness.manager).await;

    assert!(matches!(
        harness.manager.find(DEFAULT_SUPERUSER_NAME).await,
        Ok(None)
    ));
    assert!(harness.manager.stop().await.is_ok());
}

#[tokio::test]
async fn start_twice_bootstraps_once() {
    let harness = harness();
    harness.readiness.mark_ready();

    assert!(harness.manager.start().await.is_ok());
    assert!(harness.manager.start().await.is_ok());
    wait_for_bootstrap(&harness.manager).await;

    assert_eq!(harness.migrator.created.lock().await.len(), 2);
    assert!(harness.manager.stop().await.is_ok());
}

#[tokio::test]
async fn node_without_lease_does_not_bootstrap() {
    let harness = harness();
    *harness.lease_coordinator.holder.lock().await = Some("node-b".to_owned());
    harness.readiness.mark_ready();

    assert!(harness.manager.start().await.is_ok());

    assert!(harness.migrator.created.lock().await.is_empty());
    assert_eq!(
        harness.manager.bootstrap_state(),
        BootstrapState::HandledElsewhere
    );
    wait_for_bootstrap(&harness.manager).await;
    assert!(harness.manager.stop().await.is_ok());
    assert!(harness.store.roles.lock().await.is_empty());
}

#[tokio::test]
async fn stop_before_ready_swallows_cancellation() {
    let harness = harness();

    assert!(harness.manager.start().await.is_ok());
    assert!(harness.manager.stop().await.is_ok());
    assert!(harness.manager.stop().await.is_ok());

    assert_eq!(harness.manager.bootstrap_state(), BootstrapState::Pending);
    assert!(matches!(
        harness.manager.wait_for_bootstrap().await,
        Err(AppError::Cancelled(CancellationKind::AbortRequested))
    ));
    assert!(harness.store.roles.lock().await.is_empty());
    assert_eq!(harness.lease_coordinator.releases.load(Ordering::Acquire), 1);
}

#[tokio::test]
async fn stop_during_schema_agreement_swallows_aborted_wait() {
    let harness = harness();
    harness
        .migrator
        .agreement_pending
        .store(true, Ordering::Release);
    harness.readiness.mark_ready();

    assert!(harness.manager.start().await.is_ok());
    harness.migrator.agreement_entered.notified().await;

    assert!(harness.manager.stop().await.is_ok());
    assert_eq!(harness.manager.bootstrap_state(), BootstrapState::Pending);
    assert!(harness.store.roles.lock().await.is_empty());
    assert_eq!(harness.lease_coordinator.releases.load(Ordering::Acquire), 1);
}

#[tokio::test]
async fn stop_without_start_succeeds() {
    let harness = harness();

    assert!(harness.manager.stop().await.is_ok());
}

#[tokio::test]
async fn unavailable_store_fails_bootstrap_without_retry() {
    let harness = harness();
    harness.store.unavailable.store(true, Ordering::Release);
    harness.readiness.mark_ready();

    assert!(harness.manager.start().await.is_ok());
    let waited =
        tokio::time::timeout(Duration::from_secs(5), harness.manager.wait_for_bootstrap()).await;
    assert!(matches!(waited, Ok(Err(AppError::Unavailable(_)))));

    let stopped = harness.manager.stop().await;

    assert!(matches!(stopped, Err(AppError::Unavailable(_))));
    assert!(matches!(
        harness.manager.bootstrap_state(),
        BootstrapState::Failed(AppError::Unavailable(_))
    ));
    assert!(harness.store.roles.lock().await.is_empty());
    assert!(harness.lease_coordinator.holder.lock().await.is_none());
}

#[tokio::test]
async fn schema_failure_fails_start_and_releases_lease() {
    let harness = harness();
    harness.migrator.fail_creation.store(true, Ordering::Release);

    let started = harness.manager.start().await;

    assert!(matches!(started, Err(AppError::Internal(_))));
    assert!(harness.lease_coordinator.holder.lock().await.is_none());

    harness.migrator.fail_creation.store(false, Ordering::Release);
    harness.readiness.mark_ready();
    assert!(harness.manager.start().await.is_ok());
    wait_for_bootstrap(&harness.manager).await;
    assert!(harness.manager.stop().await.is_ok());
}

#[tokio::test]
async fn failing_attribute_table_fails_start() {
    let harness = harness();
    *harness.migrator.failing_table.lock().await = Some(MetadataTable::RoleAttributes);

    let started = harness.manager.start().await;

    assert!(matches!(started, Err(AppError::Internal(_))));
    assert!(
        !harness
            .migrator
            .created
            .lock()
            .await
            .contains(&MetadataTable::RoleAttributes)
    );
    assert!(harness.lease_coordinator.holder.lock().await.is_none());
    assert_eq!(harness.manager.bootstrap_state(), BootstrapState::Pending);
}

#[tokio::test]
async fn lease_is_renewed_while_waiting_for_readiness() {
    let harness = harness_with_lease(1);

    assert!(harness.manager.start().await.is_ok());
    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert!(harness.lease_coordinator.renewals.load(Ordering::Acquire) >= 2);
    assert_eq!(
        harness.lease_coordinator.holder.lock().await.as_deref(),
        Some("node-a")
    );
    assert!(harness.manager.stop().await.is_ok());
}

#[tokio::test]
async fn lost_lease_abandons_bootstrap() {
    let harness = harness_with_lease(1);

    assert!(harness.manager.start().await.is_ok());
    *harness.lease_coordinator.holder.lock().await = Some("node-b".to_owned());

    wait_for_bootstrap(&harness.manager).await;
    assert_eq!(
        harness.manager.bootstrap_state(),
        BootstrapState::HandledElsewhere
    );

    harness.readiness.mark_ready();
    assert!(harness.manager.stop().await.is_ok());
    assert!(harness.store.roles.lock().await.is_empty());
}

#[tokio::test]
async fn registry_builds_external_provider() {
    let harness = harness();
    let registry = RoleManagerRegistry::with_builtin_providers();

    let created = registry.create(
        EXTERNAL_ROLE_MANAGER_NAME,
        backends(
            harness.store.clone(),
            harness.migrator.clone(),
            harness.lease_coordinator.clone(),
            harness.readiness.clone(),
            "node-b",
            30,
        ),
    );

    let Ok(manager) = created else {
        panic!("external provider should be registered");
    };
    assert_eq!(manager.qualified_name(), EXTERNAL_ROLE_MANAGER_NAME);
    assert_eq!(manager.protected_resources(), vec!["auth.roles".to_owned()]);
    assert!(matches!(manager.exists("anyone").await, Ok(true)));
}

#[tokio::test]
async fn registry_rejects_unknown_provider() {
    let harness = harness();
    let registry = RoleManagerRegistry::new();

    let created = registry.create(
        EXTERNAL_ROLE_MANAGER_NAME,
        backends(
            harness.store.clone(),
            harness.migrator.clone(),
            harness.lease_coordinator.clone(),
            harness.readiness.clone(),
            "node-b",
            30,
        ),
    );

    assert!(matches!(created, Err(AppError::NotFound(_))));
}
