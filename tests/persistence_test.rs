mod common;

use async_trait::async_trait;
use common::{harness, seed_plant, seed_relation, seed_resource, started, Machine};
use resource_management::config::ModuleConfig;
use resource_management::error::ResourceError;
use resource_management::events::ManagerEvent;
use resource_management::lifecycle::{LifecycleState, ResourceManager, Transition};
use resource_management::model::CHILDREN_ROLE;
use resource_management::reporting::RecordingReporter;
use resource_management::store::{
    ContextMode, MemoryStore, StoreError, UnitOfWork, UnitOfWorkFactory,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Store whose first read-write transaction waits until `gate` is notified.
struct GatedStore {
    inner: MemoryStore,
    gated: AtomicBool,
    entered: Arc<Notify>,
    gate: Arc<Notify>,
}

#[async_trait]
impl UnitOfWorkFactory for GatedStore {
    async fn open(&self, mode: ContextMode) -> Result<Box<dyn UnitOfWork>, StoreError> {
        if mode == ContextMode::ReadWrite && self.gated.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.gate.notified().await;
        }
        self.inner.open(mode).await
    }
}

#[tokio::test]
async fn test_save_assigns_id_and_inserts_references() {
    let store = MemoryStore::new();
    let harness = started(&store).await;

    let lathe = harness.manager.create("Machine").unwrap();
    let feeder = harness.manager.create("Machine").unwrap();
    lathe.set_name("Lathe");
    feeder.set_name("Feeder");
    lathe.set_reference("feeder", Some(feeder.clone())).unwrap();
    assert!(lathe.is_transient());

    let id = harness.manager.save(&lathe).await.unwrap();

    assert_ne!(id, 0);
    assert_eq!(lathe.id(), id);
    assert!(!feeder.is_transient());
    assert!(Arc::ptr_eq(&harness.manager.get(id).unwrap(), &lathe));
    assert!(harness.manager.get(feeder.id()).is_some());
    assert_eq!(store.resource_entity(id).await.unwrap().name, "Lathe");
    assert!(store
        .relation_rows(id)
        .await
        .iter()
        .any(|row| row.role == "feeder" && row.target_id == feeder.id()));
}

/// A failed commit leaves neither rows nor graph changes behind.
#[tokio::test]
async fn test_failed_save_is_not_partially_applied() {
    let store = MemoryStore::new();
    let harness = started(&store).await;
    let before = harness.manager.len();

    let lathe = harness.manager.create("Machine").unwrap();
    let feeder = harness.manager.create("Machine").unwrap();
    lathe.set_reference("feeder", Some(feeder.clone())).unwrap();

    store.fail_next_commits(1);
    let result = harness.manager.save(&lathe).await;

    assert!(matches!(
        result,
        Err(ResourceError::Store(StoreError::CommitFailed(_)))
    ));
    assert!(lathe.is_transient());
    assert!(feeder.is_transient());
    assert_eq!(harness.manager.len(), before);
    assert_eq!(store.active_resource_count().await, before);

    let id = harness.manager.save(&lathe).await.unwrap();
    assert!(harness.manager.get(id).is_some());
    assert_eq!(harness.manager.len(), before + 2);
}

/// Adding a machine to an auto-save collection persists it without an
/// explicit save, and the new machine becomes queryable.
#[tokio::test]
async fn test_auto_save_collection_round_trip() {
    let store = MemoryStore::new();
    let harness = started(&store).await;
    let mut events = harness.manager.subscribe();
    let root = harness.manager.get_roots().pop().unwrap();

    let lathe = harness.manager.create("Machine").unwrap();
    lathe.set_name("Lathe");
    lathe.set_parent(Some(&root));
    root.add_to(CHILDREN_ROLE, lathe.clone()).unwrap();
    harness.manager.flush().await.unwrap();

    assert!(!lathe.is_transient());
    let found = harness
        .manager
        .get_resource_by_name::<Machine>("Lathe")
        .unwrap();
    assert!(Arc::ptr_eq(&found, &lathe));
    assert!(matches!(
        events.try_recv(),
        Ok(ManagerEvent::ResourceAdded(added)) if Arc::ptr_eq(&added, &lathe)
    ));

    let rows = store.relation_rows(root.id()).await;
    assert!(rows
        .iter()
        .any(|row| row.source_id == root.id() && row.target_id == lathe.id()));
    assert!(rows
        .iter()
        .any(|row| row.source_id == lathe.id() && row.role == "parent"));
}

#[tokio::test]
async fn test_property_changes_are_persisted() {
    let store = MemoryStore::new();
    let id = seed_resource(&store, "Machine", "Lathe").await;
    let harness = started(&store).await;
    let lathe = harness.manager.get(id).unwrap();

    lathe.set_property("rpm", json!(1200));
    lathe.set_name("Big Lathe");
    harness.manager.flush().await.unwrap();

    let entity = store.resource_entity(id).await.unwrap();
    assert_eq!(entity.name, "Big Lathe");
    assert_eq!(entity.properties.get("rpm"), Some(&json!(1200)));
}

#[tokio::test]
async fn test_failed_notification_save_is_reported() {
    let store = MemoryStore::new();
    let id = seed_resource(&store, "Machine", "Lathe").await;
    let harness = started(&store).await;

    store.fail_next_commits(1);
    harness.manager.get(id).unwrap().set_name("Renamed");
    harness.manager.flush().await.unwrap();

    let warnings = harness.reporter.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].0, "PersistenceCoordinator");
    assert_eq!(store.resource_entity(id).await.unwrap().name, "Lathe");
}

/// Non-permanent destroy keeps a recoverable row and the relation history.
#[tokio::test]
async fn test_destroy_keeps_history() {
    let store = MemoryStore::new();
    let (root_id, ids) = seed_plant(&store, &[("Machine", "Lathe"), ("Machine", "Mill")]).await;
    let harness = started(&store).await;
    let lathe = harness.manager.get(ids[0]).unwrap();
    let root = harness.manager.get(root_id).unwrap();

    assert!(harness.manager.destroy_resource(&lathe).await.unwrap());

    assert!(harness.manager.get(ids[0]).is_none());
    assert_eq!(root.collection(CHILDREN_ROLE).unwrap().len(), 1);
    assert!(store.resource_entity(ids[0]).await.unwrap().deleted);
    let history = store.relation_rows(ids[0]).await;
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|row| row.deleted));

    // A later save of the root does not resurrect the relation.
    harness.manager.save(&root).await.unwrap();
    let root_rows = store.relation_rows(root_id).await;
    assert_eq!(root_rows.iter().filter(|row| !row.deleted).count(), 2);
}

#[tokio::test]
async fn test_permanent_destroy_deletes_history() {
    let store = MemoryStore::new();
    let (_, ids) = seed_plant(&store, &[("Machine", "Lathe")]).await;
    let harness = started(&store).await;
    let lathe = harness.manager.get(ids[0]).unwrap();

    assert!(harness.manager.destroy(&lathe, true).await.unwrap());

    assert!(store.resource_entity(ids[0]).await.is_none());
    assert!(store.relation_rows(ids[0]).await.is_empty());
}

#[tokio::test]
async fn test_destroy_unknown_resource_fails() {
    let store = MemoryStore::new();
    let harness = started(&store).await;
    let transient = harness.manager.create("Machine").unwrap();

    assert!(matches!(
        harness.manager.destroy(&transient, false).await,
        Err(ResourceError::UnknownResource(0))
    ));
}

/// Saved changes survive a restart with positions intact.
#[tokio::test]
async fn test_changes_survive_restart() {
    let store = MemoryStore::new();
    let first = started(&store).await;
    let root = first.manager.get_roots().pop().unwrap();
    for name in ["First", "Second", "Third"] {
        let machine = first.manager.create("Machine").unwrap();
        machine.set_name(name);
        root.add_to(CHILDREN_ROLE, machine).unwrap();
    }
    let second = root.collection(CHILDREN_ROLE).unwrap()[1].clone();
    first.manager.flush().await.unwrap();
    root.remove_from(CHILDREN_ROLE, &second).unwrap();
    first.manager.flush().await.unwrap();
    first.manager.stop().await.unwrap();
    first.manager.dispose().await.unwrap();

    let rebooted = harness(&store);
    rebooted.manager.initialize().await.unwrap();
    let root = rebooted.manager.get(root.id()).unwrap();
    let names: Vec<_> = root
        .collection(CHILDREN_ROLE)
        .unwrap()
        .iter()
        .map(|child| child.name())
        .collect();
    assert_eq!(names, ["First", "Third"]);
}

#[tokio::test]
async fn test_flush_after_dispose_fails() {
    let store = MemoryStore::new();
    let harness = started(&store).await;
    let root = harness.manager.get_roots().pop().unwrap();
    assert!(root.is_attached());

    harness.manager.dispose().await.unwrap();
    harness.manager.dispose().await.unwrap();
    assert!(!root.is_attached());

    assert!(matches!(
        harness.manager.flush().await,
        Err(ResourceError::CoordinatorClosed)
    ));
}

/// A resource that cannot stop is faulted and neither deleted nor unlinked.
#[tokio::test]
async fn test_destroy_fails_when_stop_fails() {
    let store = MemoryStore::new();
    let (root_id, ids) = seed_plant(&store, &[("StuckMachine", "Stuck")]).await;
    let harness = started(&store).await;
    let stuck = harness.manager.get(ids[0]).unwrap();
    let root = harness.manager.get(root_id).unwrap();

    let result = harness.manager.destroy(&stuck, false).await;

    assert!(matches!(
        result,
        Err(ResourceError::Lifecycle {
            transition: Transition::Stop,
            ..
        })
    ));
    assert!(harness.manager.get(ids[0]).is_some());
    assert_eq!(
        harness.manager.state_of(ids[0]).await,
        Some(LifecycleState::Faulted)
    );
    assert!(stuck.is_attached());
    assert_eq!(root.collection(CHILDREN_ROLE).unwrap().len(), 1);
    assert!(!store.resource_entity(ids[0]).await.unwrap().deleted);
}

#[tokio::test]
async fn test_destroy_unlinks_incoming_and_self_references() {
    let store = MemoryStore::new();
    let lathe_id = seed_resource(&store, "Machine", "Lathe").await;
    let feeder_id = seed_resource(&store, "Machine", "Feeder").await;
    seed_relation(&store, lathe_id, feeder_id, "feeder", false, 0).await;
    seed_relation(&store, feeder_id, feeder_id, "tools", true, 0).await;
    let harness = started(&store).await;
    let lathe = harness.manager.get(lathe_id).unwrap();
    let feeder = harness.manager.get(feeder_id).unwrap();
    assert!(Arc::ptr_eq(
        &lathe.reference("feeder").unwrap().unwrap(),
        &feeder
    ));
    assert!(Arc::ptr_eq(&feeder.collection("tools").unwrap()[0], &feeder));

    assert!(harness.manager.destroy_resource(&feeder).await.unwrap());

    assert!(lathe.reference("feeder").unwrap().is_none());
    assert!(feeder.collection("tools").unwrap().is_empty());
    assert!(!feeder.is_attached());
    assert!(harness.manager.get(feeder_id).is_none());
    let rows = store.relation_rows(feeder_id).await;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.deleted));

    // The unlinked lathe saves without resurrecting the reference.
    harness.manager.save(&lathe).await.unwrap();
    assert!(store
        .relation_rows(lathe_id)
        .await
        .iter()
        .all(|row| row.deleted));
    assert!(harness.reporter.warnings().is_empty());
}

/// Change notifications racing on one resource end with its last state stored.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_changes_persist_last_value() {
    let store = MemoryStore::new();
    let id = seed_resource(&store, "Machine", "Lathe").await;
    let harness = started(&store).await;
    let lathe = harness.manager.get(id).unwrap();

    let writers: Vec<_> = (0..4)
        .map(|writer| {
            let lathe = lathe.clone();
            tokio::spawn(async move {
                for step in 0..25 {
                    lathe.set_property("rpm", json!(writer * 100 + step));
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap();
    }
    lathe.set_property("rpm", json!(1200));
    harness.manager.flush().await.unwrap();

    let entity = store.resource_entity(id).await.unwrap();
    assert_eq!(entity.properties.get("rpm"), Some(&json!(1200)));
    assert_eq!(store.active_resource_count().await, 1);
    assert!(harness.reporter.warnings().is_empty());
}

/// A save stuck in its transaction does not hold back saves of other resources.
#[tokio::test]
async fn test_independent_saves_do_not_wait_for_each_other() {
    let memory = MemoryStore::new();
    seed_resource(&memory, "Machine", "Lathe").await;
    let entered = Arc::new(Notify::new());
    let gate = Arc::new(Notify::new());
    let store = GatedStore {
        inner: memory.clone(),
        gated: AtomicBool::new(true),
        entered: entered.clone(),
        gate: gate.clone(),
    };
    let manager = ResourceManager::new(
        ModuleConfig::default(),
        Arc::new(store),
        Arc::new(common::types()),
        Arc::new(RecordingReporter::new()),
    );
    manager.initialize().await.unwrap();
    manager.start().await.unwrap();

    let slow = manager.create("Machine").unwrap();
    let fast = manager.create("Machine").unwrap();
    let pending = tokio::spawn({
        let manager = manager.clone();
        let slow = slow.clone();
        async move { manager.save(&slow).await }
    });
    entered.notified().await;

    let saved = tokio::time::timeout(Duration::from_secs(5), manager.save(&fast)).await;
    assert!(saved.unwrap().is_ok());
    assert!(!fast.is_transient());
    assert!(slow.is_transient());

    gate.notify_one();
    let slow_id = pending.await.unwrap().unwrap();
    assert_ne!(slow_id, fast.id());
    assert_eq!(memory.active_resource_count().await, 3);
}
