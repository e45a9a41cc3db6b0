//! The graph arena: every live resource by id, plus the public subset.

use super::ResourceWrapper;
use crate::model::{Resource, ResourceId};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Canonical owner of the live graph.
///
/// Boot fills it with a single bulk write ([`populate`](Self::populate)),
/// afterwards resources are inserted and removed one at a time. Locks are
/// taken in the order wrappers, then public.
#[derive(Debug, Default)]
pub(crate) struct ResourceGraph {
    wrappers: RwLock<HashMap<ResourceId, Arc<ResourceWrapper>>>,
    public: RwLock<BTreeMap<ResourceId, Arc<Resource>>>,
}

impl ResourceGraph {
    pub fn populate(&self, resources: impl IntoIterator<Item = Arc<Resource>>) {
        let mut wrappers = self.wrappers.write();
        let mut public = self.public.write();
        for resource in resources {
            if resource.is_public() {
                public.insert(resource.id(), resource.clone());
            }
            wrappers.insert(resource.id(), Arc::new(ResourceWrapper::new(resource)));
        }
    }

    pub fn insert(&self, resource: Arc<Resource>) -> Arc<ResourceWrapper> {
        let mut wrappers = self.wrappers.write();
        let wrapper = wrappers
            .entry(resource.id())
            .or_insert_with(|| Arc::new(ResourceWrapper::new(resource.clone())))
            .clone();
        if resource.is_public() {
            self.public.write().insert(resource.id(), resource);
        }
        wrapper
    }

    pub fn get(&self, id: ResourceId) -> Option<Arc<ResourceWrapper>> {
        self.wrappers.read().get(&id).cloned()
    }

    pub fn resource(&self, id: ResourceId) -> Option<Arc<Resource>> {
        self.wrappers
            .read()
            .get(&id)
            .map(|wrapper| wrapper.target().clone())
    }

    /// Snapshot of all wrappers.
    pub fn wrappers(&self) -> Vec<(ResourceId, Arc<ResourceWrapper>)> {
        self.wrappers
            .read()
            .iter()
            .map(|(id, wrapper)| (*id, wrapper.clone()))
            .collect()
    }

    /// Snapshot of all resources.
    pub fn resources(&self) -> Vec<Arc<Resource>> {
        self.wrappers
            .read()
            .values()
            .map(|wrapper| wrapper.target().clone())
            .collect()
    }

    /// Removes the resource from the graph and the public subset.
    pub fn remove(&self, id: ResourceId) -> bool {
        let removed = self.wrappers.write().remove(&id).is_some();
        self.public.write().remove(&id);
        removed
    }

    /// Hides the resource from queries while keeping it in the graph.
    pub fn retract_public(&self, id: ResourceId) -> bool {
        self.public.write().remove(&id).is_some()
    }

    pub fn is_published(&self, id: ResourceId) -> bool {
        self.public.read().contains_key(&id)
    }

    /// Snapshot of the public subset, ordered by id.
    pub fn public_snapshot(&self) -> Vec<Arc<Resource>> {
        self.public.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.wrappers.read().len()
    }
}
