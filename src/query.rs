//! # Capability Queries
//!
//! The rest of the platform only sees the public subset of the graph. A
//! resource is returned by a query when:
//!
//! 1. it has a public capability facet and is still published (faulted nodes
//!    are retracted),
//! 2. its capabilities are not the `None` sentinel,
//! 3. its behavior is of the requested type `T`,
//! 4. the caller's predicate accepts it.
//!
//! Single-result queries insist on exactly one match. Zero and several
//! matches both fail with [`ResourceError::NotFound`].

use crate::capabilities::Capabilities;
use crate::error::ResourceError;
use crate::lifecycle::graph::ResourceGraph;
use crate::lifecycle::ResourceManager;
use crate::model::{Resource, ResourceBehavior, ResourceId};
use std::marker::PhantomData;
use std::sync::Arc;

type Predicate = Arc<dyn Fn(&Resource) -> bool + Send + Sync>;

/// Lazy result of a multi-match query.
///
/// Every call to [`iter`](Self::iter) evaluates the query again against the
/// current public subset.
pub struct ResourceSelection<T> {
    graph: Arc<ResourceGraph>,
    predicate: Predicate,
    _behavior: PhantomData<fn() -> T>,
}

impl<T: ResourceBehavior> ResourceSelection<T> {
    pub fn iter(&self) -> impl Iterator<Item = Arc<Resource>> + '_ {
        self.graph
            .public_snapshot()
            .into_iter()
            .filter(move |resource| matches::<T>(resource, self.predicate.as_ref()))
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }

    pub fn to_vec(&self) -> Vec<Arc<Resource>> {
        self.iter().collect()
    }
}

impl<T> Clone for ResourceSelection<T> {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph.clone(),
            predicate: self.predicate.clone(),
            _behavior: PhantomData,
        }
    }
}

fn matches<T: ResourceBehavior>(
    resource: &Resource,
    predicate: &(dyn Fn(&Resource) -> bool + Send + Sync),
) -> bool {
    resource.is_public()
        && !resource.capabilities().is_none()
        && resource.behavior_as::<T>().is_some()
        && predicate(resource)
}

impl ResourceManager {
    /// The single public resource of type `T` accepted by `predicate`.
    pub fn get_resource<T, F>(&self, predicate: F) -> Result<Arc<Resource>, ResourceError>
    where
        T: ResourceBehavior,
        F: Fn(&Resource) -> bool + Send + Sync + 'static,
    {
        let mut found = self.get_resources::<T, F>(predicate).to_vec();
        match found.len() {
            1 => Ok(found.remove(0)),
            matches => Err(ResourceError::NotFound { matches }),
        }
    }

    pub fn get_resource_by_id<T: ResourceBehavior>(
        &self,
        id: ResourceId,
    ) -> Result<Arc<Resource>, ResourceError> {
        self.get_resource::<T, _>(move |resource| resource.id() == id)
    }

    pub fn get_resource_by_name<T: ResourceBehavior>(
        &self,
        name: &str,
    ) -> Result<Arc<Resource>, ResourceError> {
        let name = name.to_string();
        self.get_resource::<T, _>(move |resource| resource.name() == name)
    }

    /// The single public resource of type `T` providing every role of `required`.
    pub fn get_resource_with_capabilities<T: ResourceBehavior>(
        &self,
        required: &Capabilities,
    ) -> Result<Arc<Resource>, ResourceError> {
        let required = required.clone();
        self.get_resource::<T, _>(move |resource| required.provided_by(&resource.capabilities()))
    }

    /// All public resources of type `T` accepted by `predicate`.
    pub fn get_resources<T, F>(&self, predicate: F) -> ResourceSelection<T>
    where
        T: ResourceBehavior,
        F: Fn(&Resource) -> bool + Send + Sync + 'static,
    {
        ResourceSelection {
            graph: self.graph.clone(),
            predicate: Arc::new(predicate),
            _behavior: PhantomData,
        }
    }

    pub fn get_resources_with_capabilities<T: ResourceBehavior>(
        &self,
        required: &Capabilities,
    ) -> ResourceSelection<T> {
        let required = required.clone();
        self.get_resources::<T, _>(move |resource| required.provided_by(&resource.capabilities()))
    }

    pub fn get_all_resources<T: ResourceBehavior>(&self) -> ResourceSelection<T> {
        self.get_resources::<T, _>(|_| true)
    }
}
