#![allow(dead_code)]

use async_trait::async_trait;
use resource_management::capabilities::Capabilities;
use resource_management::config::ModuleConfig;
use resource_management::error::BoxError;
use resource_management::lifecycle::ResourceManager;
use resource_management::model::{ReferenceDecl, Resource, ResourceBehavior, ResourceId};
use resource_management::reporting::RecordingReporter;
use resource_management::store::{
    ContextMode, MemoryStore, RelationEntity, ResourceEntity, UnitOfWorkFactory,
};
use resource_management::types::TypeRegistry;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Transition a test machine fails on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    None,
    Initialize,
    Start,
    Stop,
    Panic,
}

pub const MACHINING: &str = "machining";

const MACHINE_REFERENCES: &[ReferenceDecl] = &[
    ReferenceDecl::single("feeder"),
    ReferenceDecl::collection("tools"),
];

/// Public test resource with a configurable failure.
pub struct Machine {
    pub fault: Fault,
}

#[async_trait]
impl ResourceBehavior for Machine {
    fn references(&self) -> &'static [ReferenceDecl] {
        MACHINE_REFERENCES
    }

    fn capabilities(&self) -> Option<Capabilities> {
        Some(Capabilities::of([MACHINING]))
    }

    async fn initialize(&self, _resource: &Resource) -> Result<(), BoxError> {
        match self.fault {
            Fault::Initialize => Err("initialize failed".into()),
            Fault::Panic => panic!("machine panicked"),
            _ => Ok(()),
        }
    }

    async fn start(&self, _resource: &Resource) -> Result<(), BoxError> {
        match self.fault {
            Fault::Start => Err("start failed".into()),
            _ => Ok(()),
        }
    }

    async fn stop(&self, _resource: &Resource) -> Result<(), BoxError> {
        match self.fault {
            Fault::Stop => Err("stop failed".into()),
            _ => Ok(()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Resource without a public facet.
pub struct Sensor;

impl ResourceBehavior for Sensor {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn types() -> TypeRegistry {
    TypeRegistry::with_defaults()
        .register("Machine", || Box::new(Machine { fault: Fault::None }))
        .register("BrokenMachine", || Box::new(Machine { fault: Fault::Initialize }))
        .register("FlakyMachine", || Box::new(Machine { fault: Fault::Start }))
        .register("StuckMachine", || Box::new(Machine { fault: Fault::Stop }))
        .register("PanickingMachine", || Box::new(Machine { fault: Fault::Panic }))
        .register("Sensor", || Box::new(Sensor))
}

pub struct Harness {
    pub store: MemoryStore,
    pub reporter: Arc<RecordingReporter>,
    pub manager: Arc<ResourceManager>,
}

pub fn harness(store: &MemoryStore) -> Harness {
    harness_with(store, ModuleConfig::default())
}

pub fn harness_with(store: &MemoryStore, config: ModuleConfig) -> Harness {
    let reporter = Arc::new(RecordingReporter::new());
    let manager = ResourceManager::new(
        config,
        Arc::new(store.clone()),
        Arc::new(types()),
        reporter.clone(),
    );
    Harness {
        store: store.clone(),
        reporter,
        manager,
    }
}

/// Boots a manager on `store` through initialize and start.
pub async fn started(store: &MemoryStore) -> Harness {
    let harness = harness(store);
    harness.manager.initialize().await.unwrap();
    harness.manager.start().await.unwrap();
    harness
}

/// Writes a resource row directly to the store.
pub async fn seed_resource(store: &MemoryStore, type_name: &str, name: &str) -> ResourceId {
    let mut uow = store.open(ContextMode::ReadWrite).await.unwrap();
    let id = uow.resources().add(ResourceEntity {
        id: 0,
        type_name: type_name.to_string(),
        name: name.to_string(),
        properties: BTreeMap::new(),
        deleted: false,
    });
    uow.commit().unwrap();
    id
}

/// Writes a relation row directly to the store.
pub async fn seed_relation(
    store: &MemoryStore,
    source_id: ResourceId,
    target_id: ResourceId,
    role: &str,
    is_collection: bool,
    position: u32,
) {
    let mut uow = store.open(ContextMode::ReadWrite).await.unwrap();
    uow.relations().add(RelationEntity {
        id: 0,
        source_id,
        target_id,
        role: role.to_string(),
        is_collection,
        position,
        deleted: false,
    });
    uow.commit().unwrap();
}

/// Seeds a root group holding `children` in order, each pointing back as parent.
pub async fn seed_plant(
    store: &MemoryStore,
    children: &[(&str, &str)],
) -> (ResourceId, Vec<ResourceId>) {
    let root = seed_resource(store, "ResourceGroup", "Plant").await;
    let mut ids = Vec::new();
    for (position, (type_name, name)) in children.iter().enumerate() {
        let id = seed_resource(store, type_name, name).await;
        seed_relation(store, root, id, "children", true, position as u32).await;
        seed_relation(store, id, root, "parent", false, 0).await;
        ids.push(id);
    }
    (root, ids)
}
