//! # Resource Types
//!
//! The manager never constructs behaviors itself. It asks a
//! [`ResourceTypeController`] for an instance of a named type and hands the
//! instance back when the resource is destroyed.
//!
//! [`TypeRegistry`] is a closure-based controller: each type name maps to a
//! factory producing a fresh behavior.
//!
//! ```
//! use resource_management::types::TypeRegistry;
//! use resource_management::model::ResourceGroup;
//!
//! let types = TypeRegistry::with_defaults()
//!     .register("Cell", || Box::new(ResourceGroup));
//! assert!(types.contains("Cell"));
//! ```

use crate::error::ResourceError;
use crate::model::{Resource, ResourceBehavior, ResourceGroup, RESOURCE_GROUP_TYPE};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Creates and releases typed resource instances.
pub trait ResourceTypeController: Send + Sync {
    /// Creates a transient instance of `type_name`.
    fn create(&self, type_name: &str) -> Result<Arc<Resource>, ResourceError>;

    /// Releases the type-specific runtime resources of an instance.
    fn destroy(&self, resource: &Arc<Resource>);
}

pub type BehaviorFactory = Arc<dyn Fn() -> Box<dyn ResourceBehavior> + Send + Sync>;

#[derive(Clone, Default)]
pub struct TypeRegistry {
    factories: HashMap<String, BehaviorFactory>,
}

impl TypeRegistry {
    /// Registry without any type.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry knowing the built-in [`ResourceGroup`].
    pub fn with_defaults() -> Self {
        Self::new().register(RESOURCE_GROUP_TYPE, || Box::new(ResourceGroup))
    }

    pub fn register<F>(mut self, type_name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn ResourceBehavior> + Send + Sync + 'static,
    {
        self.factories.insert(type_name.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }
}

impl ResourceTypeController for TypeRegistry {
    fn create(&self, type_name: &str) -> Result<Arc<Resource>, ResourceError> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| ResourceError::UnknownType(type_name.to_string()))?;
        Ok(Resource::new(type_name, factory()))
    }

    fn destroy(&self, resource: &Arc<Resource>) {
        resource.behavior().release(resource);
        debug!(resource = %resource, "Released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static RELEASED: AtomicUsize = AtomicUsize::new(0);

    struct Lamp;

    impl ResourceBehavior for Lamp {
        fn release(&self, _resource: &Resource) {
            RELEASED.fetch_add(1, Ordering::SeqCst);
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn creates_fresh_instances_per_call() {
        let types = TypeRegistry::with_defaults().register("Lamp", || Box::new(Lamp));
        let first = types.create("Lamp").unwrap();
        let second = types.create("Lamp").unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.type_name(), "Lamp");
        assert!(types.contains(RESOURCE_GROUP_TYPE));
    }

    #[test]
    fn unknown_type_is_an_error() {
        let types = TypeRegistry::new();
        assert!(matches!(
            types.create("Lamp"),
            Err(ResourceError::UnknownType(name)) if name == "Lamp"
        ));
    }

    #[test]
    fn destroy_releases_behavior() {
        let types = TypeRegistry::new().register("Lamp", || Box::new(Lamp));
        let lamp = types.create("Lamp").unwrap();
        types.destroy(&lamp);
        assert_eq!(RELEASED.load(Ordering::SeqCst), 1);
    }
}
