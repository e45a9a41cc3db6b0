use super::fanout::fan_out;
use super::graph::ResourceGraph;
use super::{LifecycleState, Transition};
use crate::config::ModuleConfig;
use crate::error::ResourceError;
use crate::events::ManagerEvent;
use crate::linker::ResourceLinker;
use crate::model::accessor::{save_to_entity, SaveSession};
use crate::model::resource::ResourceHooks;
use crate::model::{RelationAccessor, Resource, ResourceEntityAccessor, ResourceId};
use crate::persistence::{PersistenceActor, PersistenceClient};
use crate::reporting::ErrorReporting;
use crate::store::{ContextMode, UnitOfWorkFactory};
use crate::types::ResourceTypeController;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const SOURCE: &str = "ResourceManager";

/// Graph-wide startup and shutdown phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupPhase {
    LoadResources,
    Initializing,
    Initialized,
    Starting,
    Started,
    Stopping,
    Stopped,
}

impl StartupPhase {
    /// Transitions applied to a resource inserted during this phase.
    fn insertion_transitions(self) -> &'static [Transition] {
        match self {
            StartupPhase::LoadResources | StartupPhase::Stopping | StartupPhase::Stopped => &[],
            StartupPhase::Initializing | StartupPhase::Initialized => &[Transition::Initialize],
            StartupPhase::Starting | StartupPhase::Started => {
                &[Transition::Initialize, Transition::Start]
            }
        }
    }
}

impl Display for StartupPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Owner of the resource graph.
///
/// The manager loads the graph from the store, drives every node through its
/// lifecycle and persists mutations. It must be created inside a tokio
/// runtime because it spawns the persistence coordinator.
///
/// # Example
///
/// ```ignore
/// let manager = ResourceManager::new(config, store, types, reporting);
/// manager.initialize().await?;
/// manager.start().await?;
///
/// let cell = manager.create("Cell")?;
/// manager.save(&cell).await?;
///
/// manager.stop().await?;
/// manager.dispose().await?;
/// ```
pub struct ResourceManager {
    config: ModuleConfig,
    store: Arc<dyn UnitOfWorkFactory>,
    types: Arc<dyn ResourceTypeController>,
    reporting: Arc<dyn ErrorReporting>,
    linker: ResourceLinker,
    pub(crate) graph: Arc<ResourceGraph>,
    phase: RwLock<StartupPhase>,
    events: broadcast::Sender<ManagerEvent>,
    persistence: RwLock<Option<PersistenceClient>>,
    coordinator: Mutex<Option<JoinHandle<()>>>,
}

impl ResourceManager {
    pub fn new(
        config: ModuleConfig,
        store: Arc<dyn UnitOfWorkFactory>,
        types: Arc<dyn ResourceTypeController>,
        reporting: Arc<dyn ErrorReporting>,
    ) -> Arc<Self> {
        let (actor, client) = PersistenceActor::new();
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        Arc::new_cyclic(|me: &Weak<Self>| {
            let coordinator = tokio::spawn(actor.run(me.clone()));
            Self {
                config,
                store,
                types,
                reporting,
                linker: ResourceLinker::new(),
                graph: Arc::new(ResourceGraph::default()),
                phase: RwLock::new(StartupPhase::LoadResources),
                events,
                persistence: RwLock::new(Some(client)),
                coordinator: Mutex::new(Some(coordinator)),
            }
        })
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    pub fn phase(&self) -> StartupPhase {
        *self.phase.read()
    }

    fn set_phase(&self, phase: StartupPhase) {
        *self.phase.write() = phase;
        info!(%phase, "Phase changed");
    }

    /// Number of resources in the live graph.
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.len() == 0
    }

    /// Lifecycle state of a live resource.
    pub async fn state_of(&self, id: ResourceId) -> Option<LifecycleState> {
        let wrapper = self.graph.get(id)?;
        Some(wrapper.state().await)
    }

    /// Subscribes to resource-added and capability-changed events.
    pub fn subscribe(&self) -> broadcast::Receiver<ManagerEvent> {
        self.events.subscribe()
    }

    pub(crate) fn report(&self, source: &str, error: &ResourceError) {
        self.reporting.report_warning(source, error);
    }

    // =========================================================================
    // Graph lifecycle
    // =========================================================================

    /// Loads the graph from the store and initializes every resource.
    ///
    /// An empty store is seeded with one resource of the configured default
    /// type.
    #[tracing::instrument(skip(self))]
    pub async fn initialize(&self) -> Result<(), ResourceError> {
        self.set_phase(StartupPhase::LoadResources);

        let accessors = {
            let mut uow = self.store.open(ContextMode::ReadOnly).await?;
            ResourceEntityAccessor::fetch_all(uow.as_mut())
        };

        if accessors.is_empty() {
            info!(
                resource_type = %self.config.default_resource,
                "Store is empty, creating default resource"
            );
            let root = self.create(&self.config.default_resource)?;
            self.save(&root).await?;
        } else {
            self.load(accessors).await;
        }

        self.set_phase(StartupPhase::Initializing);
        self.transition_all(Transition::Initialize).await;
        self.set_phase(StartupPhase::Initialized);
        info!(resources = self.graph.len(), "Resources initialized");
        Ok(())
    }

    async fn load(&self, accessors: Vec<ResourceEntityAccessor>) {
        let parallelism = self.config.max_parallelism;

        // Instantiate
        let mut relations: HashMap<ResourceId, Vec<RelationAccessor>> = HashMap::new();
        let mut pending = Vec::with_capacity(accessors.len());
        for mut accessor in accessors {
            if self.graph.get(accessor.id).is_some() {
                debug!(id = accessor.id, "Already live, not reloading");
                continue;
            }
            relations.insert(accessor.id, std::mem::take(&mut accessor.relations));
            pending.push((accessor.id, accessor));
        }
        let types = self.types.clone();
        let instantiated = fan_out(pending, parallelism, move |accessor| {
            let types = types.clone();
            async move { accessor.instantiate(types.as_ref()) }
        })
        .await;

        let mut resources = Vec::with_capacity(instantiated.len());
        for (id, outcome) in instantiated {
            match outcome.and_then(|created| created) {
                Ok(resource) => resources.push(resource),
                Err(e) => {
                    warn!(id, error = %e, "Failed to instantiate resource");
                    self.report(SOURCE, &e);
                }
            }
        }
        self.graph.populate(resources.iter().cloned());
        debug!(resources = resources.len(), "Graph populated");

        // Link
        let pending: Vec<_> = resources
            .iter()
            .map(|resource| {
                let links = relations.remove(&resource.id()).unwrap_or_default();
                (resource.id(), (resource.clone(), links))
            })
            .collect();
        let graph = self.graph.clone();
        let linker = self.linker;
        let linked = fan_out(pending, parallelism, move |(resource, links)| {
            let graph = graph.clone();
            async move { linker.link_references(&resource, &links, |id| graph.resource(id)) }
        })
        .await;
        for (id, outcome) in linked {
            if let Err(e) = outcome {
                warn!(id, error = %e, "Failed to link resource");
                self.report(SOURCE, &e);
            }
        }

        // Register hooks only once the graph is complete, so linking stays silent.
        for resource in &resources {
            self.register(resource);
        }
        info!(resources = resources.len(), "Resources loaded");
    }

    /// Starts every resource.
    #[tracing::instrument(skip(self))]
    pub async fn start(&self) -> Result<(), ResourceError> {
        self.set_phase(StartupPhase::Starting);
        // Resources saved while the graph was stopped are still created.
        self.transition_all(Transition::Initialize).await;
        self.transition_all(Transition::Start).await;
        self.set_phase(StartupPhase::Started);
        Ok(())
    }

    /// Stops every resource. Nodes failing to stop stay enumerable.
    #[tracing::instrument(skip(self))]
    pub async fn stop(&self) -> Result<(), ResourceError> {
        self.set_phase(StartupPhase::Stopping);
        self.transition_all(Transition::Stop).await;
        self.set_phase(StartupPhase::Stopped);
        Ok(())
    }

    /// Persists pending notifications, unhooks every resource and shuts the
    /// persistence coordinator down. Calling it twice is harmless.
    #[tracing::instrument(skip(self))]
    pub async fn dispose(&self) -> Result<(), ResourceError> {
        let client = self.persistence.read().clone();
        if let Some(client) = client {
            client.flush().await?;
        }

        for resource in self.graph.resources() {
            resource.detach();
        }
        drop(self.persistence.write().take());

        let coordinator = self.coordinator.lock().take();
        if let Some(coordinator) = coordinator {
            coordinator
                .await
                .map_err(|e| ResourceError::Panicked(e.to_string()))?;
        }
        info!(resources = self.graph.len(), "Disposed");
        Ok(())
    }

    async fn transition_all(&self, transition: Transition) {
        let wrappers = self.graph.wrappers();
        let total = wrappers.len();
        let outcomes = fan_out(wrappers, self.config.max_parallelism, move |wrapper| async move {
            wrapper.apply(transition).await
        })
        .await;

        let mut failed = 0;
        for (id, outcome) in outcomes {
            if let Err(e) = outcome.and_then(|applied| applied) {
                failed += 1;
                self.handle_failure(id, transition, &e).await;
            }
        }
        info!(%transition, total, failed, "Transition completed");
    }

    async fn handle_failure(&self, id: ResourceId, transition: Transition, error: &ResourceError) {
        warn!(id, %transition, error = %error, "Lifecycle transition failed");
        if let Some(wrapper) = self.graph.get(id) {
            wrapper.error_occurred().await;
        }
        if transition != Transition::Stop {
            self.graph.retract_public(id);
        }
        self.report(SOURCE, error);
    }

    // =========================================================================
    // CRUD
    // =========================================================================

    /// Creates a transient resource of `type_name`. It is neither persisted
    /// nor part of the graph until saved.
    pub fn create(&self, type_name: &str) -> Result<Arc<Resource>, ResourceError> {
        let resource = self.types.create(type_name)?;
        debug!(resource = %resource, "Created");
        Ok(resource)
    }

    /// Same as [`create`](Self::create).
    pub fn instantiate(&self, type_name: &str) -> Result<Arc<Resource>, ResourceError> {
        self.create(type_name)
    }

    /// Live resource by id, public or not, faulted or not.
    pub fn get(&self, id: ResourceId) -> Option<Arc<Resource>> {
        self.graph.resource(id)
    }

    /// Every resource without a parent, as a snapshot.
    pub fn get_roots(&self) -> Vec<Arc<Resource>> {
        self.graph
            .resources()
            .into_iter()
            .filter(|resource| resource.parent().is_none())
            .collect()
    }

    /// Persists `resource`, its relations and every transient resource it
    /// references, in one transaction. Returns the resource id.
    #[tracing::instrument(skip(self, resource), fields(resource = %resource))]
    pub async fn save(&self, resource: &Arc<Resource>) -> Result<ResourceId, ResourceError> {
        let mut uow = self.store.open(ContextMode::ReadWrite).await?;
        let mut session = SaveSession::default();
        let id = save_to_entity(uow.as_mut(), &mut session, resource)?;
        self.linker
            .save_references(uow.as_mut(), &mut session, resource, id)?;
        let fresh = session.commit(uow)?;

        self.insert_saved(fresh).await;
        Ok(id)
    }

    /// Persists a single collection of `resource`.
    pub(crate) async fn save_collection(
        &self,
        resource: &Arc<Resource>,
        role: &str,
    ) -> Result<ResourceId, ResourceError> {
        let mut uow = self.store.open(ContextMode::ReadWrite).await?;
        let mut session = SaveSession::default();
        self.linker
            .save_single_collection(uow.as_mut(), &mut session, resource, role)?;
        let id = session.id_of(resource).unwrap_or_else(|| resource.id());
        let fresh = session.commit(uow)?;

        self.insert_saved(fresh).await;
        Ok(id)
    }

    async fn insert_saved(&self, fresh: Vec<Arc<Resource>>) {
        for resource in fresh {
            self.add_resource(resource).await;
        }
    }

    async fn add_resource(&self, resource: Arc<Resource>) {
        let id = resource.id();
        let wrapper = self.graph.insert(resource.clone());
        self.register(&resource);

        for transition in self.phase().insertion_transitions() {
            if let Err(e) = wrapper.apply(*transition).await {
                self.handle_failure(id, *transition, &e).await;
                break;
            }
        }

        info!(resource = %resource, size = self.graph.len(), "Added");
        if self.graph.is_published(id) {
            // No subscriber is not an error.
            let _ = self.events.send(ManagerEvent::ResourceAdded(resource));
        }
    }

    fn register(&self, resource: &Arc<Resource>) {
        let Some(persistence) = self.persistence.read().clone() else {
            debug!(resource = %resource, "Coordinator closed, not tracking");
            return;
        };
        resource.attach(ResourceHooks {
            persistence,
            events: self.events.clone(),
            auto_save: self.linker.auto_save_collections(resource),
        });
    }

    /// Starts one resource. Failures are reported, not returned.
    pub async fn start_resource(&self, resource: &Arc<Resource>) -> bool {
        self.transition_one(resource, Transition::Start).await
    }

    /// Stops one resource. Failures are reported, not returned.
    pub async fn stop_resource(&self, resource: &Arc<Resource>) -> bool {
        self.transition_one(resource, Transition::Stop).await
    }

    async fn transition_one(&self, resource: &Arc<Resource>, transition: Transition) -> bool {
        let id = resource.id();
        let Some(wrapper) = self.graph.get(id) else {
            self.report(SOURCE, &ResourceError::UnknownResource(id));
            return false;
        };
        match wrapper.apply(transition).await {
            Ok(_) => true,
            Err(e) => {
                self.handle_failure(id, transition, &e).await;
                false
            }
        }
    }

    /// Removes `resource` from the store and the live graph.
    ///
    /// A permanent destroy also deletes the relation history. Returns whether
    /// the resource was part of the live graph; the store deletion is
    /// committed either way. A resource that fails to stop is faulted and
    /// kept: neither the store nor the graph is touched.
    #[tracing::instrument(skip(self, resource), fields(resource = %resource))]
    pub async fn destroy(
        &self,
        resource: &Arc<Resource>,
        permanent: bool,
    ) -> Result<bool, ResourceError> {
        let id = resource.id();
        if let Some(wrapper) = self.graph.get(id) {
            if let Err(e) = wrapper.apply(Transition::Stop).await {
                warn!(id, error = %e, "Stop failed, resource not destroyed");
                wrapper.error_occurred().await;
                return Err(e);
            }
        }

        let mut uow = self.store.open(ContextMode::ReadWrite).await?;
        if uow.resources().get_by_key(id).is_none() {
            return Err(ResourceError::UnknownResource(id));
        }
        let relations = uow.relations().involving(id, permanent);
        for relation in &relations {
            uow.relations().remove(relation.id, permanent)?;
        }
        uow.resources().remove(id, permanent)?;
        uow.commit()?;

        for relation in relations.iter().filter(|relation| !relation.deleted) {
            if let Some(other) = self.graph.resource(relation.opposite(id)) {
                self.linker.remove_linking(&other, resource);
            }
        }
        resource.detach();
        self.types.destroy(resource);

        let removed = self.graph.remove(id);
        info!(id, permanent, removed, size = self.graph.len(), "Destroyed");
        Ok(removed)
    }

    /// Same as [`destroy`](Self::destroy) with `permanent = false`.
    pub async fn destroy_resource(&self, resource: &Arc<Resource>) -> Result<bool, ResourceError> {
        self.destroy(resource, false).await
    }

    /// Waits until every notification raised so far was persisted.
    pub async fn flush(&self) -> Result<(), ResourceError> {
        let client = self
            .persistence
            .read()
            .clone()
            .ok_or(ResourceError::CoordinatorClosed)?;
        client.flush().await
    }
}
