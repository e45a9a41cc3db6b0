//! # Resource Nodes
//!
//! A [`Resource`] is one node of the plant graph. It is always handled through
//! an `Arc`: the manager owns the canonical graph, every other component only
//! holds handles or ids into it.
//!
//! ## Type-specific behavior
//!
//! The node itself is generic. What a machine or a station actually does lives
//! in its [`ResourceBehavior`], created by the type controller. The behavior
//! also declares the node's reference roles ([`ReferenceDecl`]) and, for
//! public resources, the initial [`Capabilities`].
//!
//! ## Change notifications
//!
//! Once the manager registered a node, every setter reports the mutation to
//! the persistence coordinator. Scalar and reference changes send a
//! resource-changed notification; collection mutations only notify when the
//! collection is auto-save. Linking during boot uses the crate-internal
//! `link_*` methods, which never notify.

use crate::capabilities::Capabilities;
use crate::error::{BoxError, ResourceError};
use crate::events::ManagerEvent;
use crate::persistence::PersistenceClient;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Debug, Display, Formatter};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tracing::debug;

/// Store-assigned identity of a resource.
pub type ResourceId = i64;

/// Id of a resource that was never saved.
pub const TRANSIENT_ID: ResourceId = 0;

/// Relation role under which the parent reference is persisted.
pub const PARENT_ROLE: &str = "parent";

/// Declaration of one named reference role of a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceDecl {
    pub role: &'static str,
    pub collection: bool,
    pub auto_save: bool,
}

impl ReferenceDecl {
    pub const fn single(role: &'static str) -> Self {
        Self {
            role,
            collection: false,
            auto_save: false,
        }
    }

    pub const fn collection(role: &'static str) -> Self {
        Self {
            role,
            collection: true,
            auto_save: false,
        }
    }

    /// Mutations of this collection are persisted without an explicit save.
    pub const fn auto_save(self) -> Self {
        Self {
            auto_save: true,
            ..self
        }
    }
}

/// Type-specific part of a resource.
///
/// All hooks have no-op defaults. Lifecycle hooks receive the node they
/// belong to, so a behavior can read its properties and references.
#[async_trait]
pub trait ResourceBehavior: Send + Sync + 'static {
    /// Reference roles of this type.
    fn references(&self) -> &'static [ReferenceDecl] {
        &[]
    }

    /// Initial capabilities. `Some` marks the resource as public.
    fn capabilities(&self) -> Option<Capabilities> {
        None
    }

    async fn initialize(&self, _resource: &Resource) -> Result<(), BoxError> {
        Ok(())
    }

    async fn start(&self, _resource: &Resource) -> Result<(), BoxError> {
        Ok(())
    }

    async fn stop(&self, _resource: &Resource) -> Result<(), BoxError> {
        Ok(())
    }

    /// Releases runtime resources when the type controller destroys the node.
    fn release(&self, _resource: &Resource) {}

    fn as_any(&self) -> &dyn Any;
}

/// Hooks installed by the manager when it registers a node.
#[derive(Clone)]
pub(crate) struct ResourceHooks {
    pub persistence: PersistenceClient,
    pub events: broadcast::Sender<ManagerEvent>,
    pub auto_save: BTreeSet<String>,
}

#[derive(Debug)]
enum Reference {
    Single(Option<Arc<Resource>>),
    Collection(Vec<Arc<Resource>>),
}

struct ResourceState {
    name: String,
    properties: BTreeMap<String, Value>,
    parent: Option<Weak<Resource>>,
    references: BTreeMap<&'static str, Reference>,
}

/// One outgoing edge of a resource, as seen by the linker.
#[derive(Debug, Clone)]
pub(crate) struct OutgoingRelation {
    pub role: String,
    pub target: Arc<Resource>,
    pub is_collection: bool,
    pub position: u32,
}

/// A node of the resource graph.
pub struct Resource {
    me: Weak<Resource>,
    id: AtomicI64,
    type_name: String,
    declarations: &'static [ReferenceDecl],
    state: RwLock<ResourceState>,
    capabilities: Option<RwLock<Capabilities>>,
    behavior: Box<dyn ResourceBehavior>,
    hooks: RwLock<Option<ResourceHooks>>,
}

impl Resource {
    /// Creates a transient node named after its type.
    pub fn new(type_name: impl Into<String>, behavior: Box<dyn ResourceBehavior>) -> Arc<Self> {
        let type_name = type_name.into();
        let declarations = behavior.references();
        let references = declarations
            .iter()
            .map(|decl| {
                let reference = if decl.collection {
                    Reference::Collection(Vec::new())
                } else {
                    Reference::Single(None)
                };
                (decl.role, reference)
            })
            .collect();
        let capabilities = behavior.capabilities().map(RwLock::new);

        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            id: AtomicI64::new(TRANSIENT_ID),
            declarations,
            state: RwLock::new(ResourceState {
                name: type_name.clone(),
                properties: BTreeMap::new(),
                parent: None,
                references,
            }),
            type_name,
            capabilities,
            behavior,
            hooks: RwLock::new(None),
        })
    }

    pub fn id(&self) -> ResourceId {
        self.id.load(Ordering::SeqCst)
    }

    pub fn is_transient(&self) -> bool {
        self.id() == TRANSIENT_ID
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn name(&self) -> String {
        self.state.read().name.clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.state.write().name = name.into();
        self.raise_changed();
    }

    pub fn property(&self, key: &str) -> Option<Value> {
        self.state.read().properties.get(key).cloned()
    }

    pub fn properties(&self) -> BTreeMap<String, Value> {
        self.state.read().properties.clone()
    }

    pub fn set_property(&self, key: impl Into<String>, value: Value) {
        self.state.write().properties.insert(key.into(), value);
        self.raise_changed();
    }

    pub fn parent(&self) -> Option<Arc<Resource>> {
        self.state.read().parent.as_ref().and_then(Weak::upgrade)
    }

    pub fn set_parent(&self, parent: Option<&Arc<Resource>>) {
        self.state.write().parent = parent.map(Arc::downgrade);
        self.raise_changed();
    }

    pub fn declared_references(&self) -> &'static [ReferenceDecl] {
        self.declarations
    }

    /// Current target of a single reference role.
    pub fn reference(&self, role: &str) -> Result<Option<Arc<Resource>>, ResourceError> {
        match self.state.read().references.get(role) {
            Some(Reference::Single(target)) => Ok(target.clone()),
            _ => Err(self.unknown_relation(role)),
        }
    }

    pub fn set_reference(
        &self,
        role: &str,
        target: Option<Arc<Resource>>,
    ) -> Result<(), ResourceError> {
        {
            let mut state = self.state.write();
            match state.references.get_mut(role) {
                Some(Reference::Single(slot)) => *slot = target,
                _ => return Err(self.unknown_relation(role)),
            }
        }
        self.raise_changed();
        Ok(())
    }

    /// Snapshot of a collection role, in order.
    pub fn collection(&self, role: &str) -> Result<Vec<Arc<Resource>>, ResourceError> {
        match self.state.read().references.get(role) {
            Some(Reference::Collection(items)) => Ok(items.clone()),
            _ => Err(self.unknown_relation(role)),
        }
    }

    pub fn add_to(&self, role: &str, target: Arc<Resource>) -> Result<(), ResourceError> {
        {
            let mut state = self.state.write();
            match state.references.get_mut(role) {
                Some(Reference::Collection(items)) => items.push(target),
                _ => return Err(self.unknown_relation(role)),
            }
        }
        self.raise_collection_changed(role);
        Ok(())
    }

    /// Removes every occurrence of `target`. Returns whether one was present.
    pub fn remove_from(&self, role: &str, target: &Arc<Resource>) -> Result<bool, ResourceError> {
        let removed = {
            let mut state = self.state.write();
            match state.references.get_mut(role) {
                Some(Reference::Collection(items)) => {
                    let before = items.len();
                    items.retain(|item| !Arc::ptr_eq(item, target));
                    before != items.len()
                }
                _ => return Err(self.unknown_relation(role)),
            }
        };
        if removed {
            self.raise_collection_changed(role);
        }
        Ok(removed)
    }

    /// Whether the manager tracks this resource's changes.
    pub fn is_attached(&self) -> bool {
        self.hooks.read().is_some()
    }

    /// Whether the resource carries a public capability facet.
    pub fn is_public(&self) -> bool {
        self.capabilities.is_some()
    }

    /// Current capabilities; the sentinel for non-public resources.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
            .as_ref()
            .map(|caps| caps.read().clone())
            .unwrap_or_default()
    }

    /// Replaces the capability declaration and notifies subscribers.
    pub fn set_capabilities(&self, capabilities: Capabilities) -> Result<(), ResourceError> {
        let slot = self
            .capabilities
            .as_ref()
            .ok_or_else(|| ResourceError::NotPublic(self.to_string()))?;
        *slot.write() = capabilities.clone();

        let hooks = self.hooks.read().clone();
        if let (Some(hooks), Some(me)) = (hooks, self.me.upgrade()) {
            // No subscriber is not an error.
            let _ = hooks.events.send(ManagerEvent::CapabilitiesChanged {
                source: me,
                capabilities,
            });
        }
        Ok(())
    }

    pub fn behavior(&self) -> &dyn ResourceBehavior {
        self.behavior.as_ref()
    }

    /// Downcasts the behavior to its concrete type.
    pub fn behavior_as<T: ResourceBehavior>(&self) -> Option<&T> {
        self.behavior.as_any().downcast_ref::<T>()
    }

    /// Reports a mutation the setters cannot see, e.g. inside the behavior.
    pub fn raise_changed(&self) {
        let hooks = self.hooks.read().clone();
        if let (Some(hooks), Some(me)) = (hooks, self.me.upgrade()) {
            hooks.persistence.resource_changed(me);
        }
    }

    fn raise_collection_changed(&self, role: &str) {
        let hooks = self.hooks.read().clone();
        if let (Some(hooks), Some(me)) = (hooks, self.me.upgrade()) {
            if hooks.auto_save.contains(role) {
                hooks.persistence.collection_changed(me, role);
            }
        }
    }

    // Must not take the state lock, callers may hold it.
    fn unknown_relation(&self, role: &str) -> ResourceError {
        ResourceError::UnknownRelation {
            resource: format!("{} #{}", self.type_name, self.id()),
            role: role.to_string(),
        }
    }

    // --- Crate internal: used by accessor, linker and manager ---

    pub(crate) fn restore(&self, id: ResourceId, name: &str, properties: BTreeMap<String, Value>) {
        self.id.store(id, Ordering::SeqCst);
        let mut state = self.state.write();
        state.name = name.to_string();
        state.properties = properties;
    }

    pub(crate) fn assign_id(&self, id: ResourceId) {
        self.id.store(id, Ordering::SeqCst);
        debug!(resource = %self, "Assigned id");
    }

    pub(crate) fn attach(&self, hooks: ResourceHooks) {
        *self.hooks.write() = Some(hooks);
    }

    pub(crate) fn detach(&self) {
        *self.hooks.write() = None;
    }

    /// Sets one edge without notifying. Collections append in call order.
    pub(crate) fn link(
        &self,
        role: &str,
        target: Arc<Resource>,
        is_collection: bool,
    ) -> Result<(), ResourceError> {
        let mut state = self.state.write();
        if role == PARENT_ROLE && !is_collection {
            state.parent = Some(Arc::downgrade(&target));
            return Ok(());
        }
        match (state.references.get_mut(role), is_collection) {
            (Some(Reference::Single(slot)), false) => *slot = Some(target),
            (Some(Reference::Collection(items)), true) => items.push(target),
            _ => return Err(self.unknown_relation(role)),
        }
        Ok(())
    }

    /// Drops every edge to `other`, parent included. Does not notify.
    pub(crate) fn unlink(&self, other: &Resource) -> bool {
        let mut state = self.state.write();
        let mut changed = false;
        let points_to_other = state
            .parent
            .as_ref()
            .is_some_and(|parent| std::ptr::eq(parent.as_ptr(), other));
        if points_to_other {
            state.parent = None;
            changed = true;
        }
        for reference in state.references.values_mut() {
            match reference {
                Reference::Single(slot) => {
                    if slot
                        .as_ref()
                        .is_some_and(|target| std::ptr::eq(Arc::as_ptr(target), other))
                    {
                        *slot = None;
                        changed = true;
                    }
                }
                Reference::Collection(items) => {
                    let before = items.len();
                    items.retain(|item| !std::ptr::eq(Arc::as_ptr(item), other));
                    changed |= before != items.len();
                }
            }
        }
        changed
    }

    /// Outgoing edges, optionally limited to one role.
    pub(crate) fn outgoing(&self, scope: Option<&str>) -> Vec<OutgoingRelation> {
        let state = self.state.read();
        let in_scope = |role: &str| scope.map_or(true, |wanted| wanted == role);
        let mut relations = Vec::new();

        if in_scope(PARENT_ROLE) {
            if let Some(parent) = state.parent.as_ref().and_then(Weak::upgrade) {
                relations.push(OutgoingRelation {
                    role: PARENT_ROLE.to_string(),
                    target: parent,
                    is_collection: false,
                    position: 0,
                });
            }
        }
        for (role, reference) in state.references.iter().filter(|(role, _)| in_scope(**role)) {
            match reference {
                Reference::Single(Some(target)) => relations.push(OutgoingRelation {
                    role: role.to_string(),
                    target: target.clone(),
                    is_collection: false,
                    position: 0,
                }),
                Reference::Single(None) => {}
                Reference::Collection(items) => {
                    relations.extend(items.iter().enumerate().map(|(position, target)| {
                        OutgoingRelation {
                            role: role.to_string(),
                            target: target.clone(),
                            is_collection: true,
                            position: position as u32,
                        }
                    }))
                }
            }
        }
        relations
    }
}

impl Display for Resource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} '{}' (#{})", self.type_name, self.name(), self.id())
    }
}

impl Debug for Resource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id())
            .field("type_name", &self.type_name)
            .field("name", &self.name())
            .finish()
    }
}
