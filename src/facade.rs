//! # Resource Facade
//!
//! The entry point other platform modules use. It only forwards to the
//! manager, but it is bound to the module lifecycle: the module activates it
//! once every resource is started and deactivates it before stopping them.
//! While inactive, every call fails with [`ResourceError::FacadeInactive`].

use crate::capabilities::Capabilities;
use crate::error::ResourceError;
use crate::events::ManagerEvent;
use crate::lifecycle::ResourceManager;
use crate::model::{Resource, ResourceBehavior, ResourceId};
use crate::query::ResourceSelection;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

pub struct ResourceFacade {
    manager: Arc<ResourceManager>,
    activated: AtomicBool,
    state_changed: broadcast::Sender<bool>,
}

impl ResourceFacade {
    pub fn new(manager: Arc<ResourceManager>) -> Self {
        let (state_changed, _) = broadcast::channel(8);
        Self {
            manager,
            activated: AtomicBool::new(false),
            state_changed,
        }
    }

    pub fn activate(&self) {
        self.set_activated(true);
    }

    pub fn deactivate(&self) {
        self.set_activated(false);
    }

    fn set_activated(&self, activated: bool) {
        if self.activated.swap(activated, Ordering::SeqCst) != activated {
            info!(activated, "Facade state changed");
            let _ = self.state_changed.send(activated);
        }
    }

    pub fn is_activated(&self) -> bool {
        self.activated.load(Ordering::SeqCst)
    }

    /// Receives `true` on activation and `false` on deactivation.
    pub fn state_changes(&self) -> broadcast::Receiver<bool> {
        self.state_changed.subscribe()
    }

    pub fn validate_health_state(&self) -> Result<(), ResourceError> {
        if self.is_activated() {
            Ok(())
        } else {
            Err(ResourceError::FacadeInactive)
        }
    }

    pub fn get_resource<T, F>(&self, predicate: F) -> Result<Arc<Resource>, ResourceError>
    where
        T: ResourceBehavior,
        F: Fn(&Resource) -> bool + Send + Sync + 'static,
    {
        self.validate_health_state()?;
        self.manager.get_resource::<T, F>(predicate)
    }

    pub fn get_resource_by_id<T: ResourceBehavior>(
        &self,
        id: ResourceId,
    ) -> Result<Arc<Resource>, ResourceError> {
        self.validate_health_state()?;
        self.manager.get_resource_by_id::<T>(id)
    }

    pub fn get_resource_by_name<T: ResourceBehavior>(
        &self,
        name: &str,
    ) -> Result<Arc<Resource>, ResourceError> {
        self.validate_health_state()?;
        self.manager.get_resource_by_name::<T>(name)
    }

    pub fn get_resource_with_capabilities<T: ResourceBehavior>(
        &self,
        required: &Capabilities,
    ) -> Result<Arc<Resource>, ResourceError> {
        self.validate_health_state()?;
        self.manager.get_resource_with_capabilities::<T>(required)
    }

    pub fn get_resources<T, F>(&self, predicate: F) -> Result<ResourceSelection<T>, ResourceError>
    where
        T: ResourceBehavior,
        F: Fn(&Resource) -> bool + Send + Sync + 'static,
    {
        self.validate_health_state()?;
        Ok(self.manager.get_resources::<T, F>(predicate))
    }

    pub fn get_resources_with_capabilities<T: ResourceBehavior>(
        &self,
        required: &Capabilities,
    ) -> Result<ResourceSelection<T>, ResourceError> {
        self.validate_health_state()?;
        Ok(self.manager.get_resources_with_capabilities::<T>(required))
    }

    pub fn get_all_resources<T: ResourceBehavior>(
        &self,
    ) -> Result<ResourceSelection<T>, ResourceError> {
        self.validate_health_state()?;
        Ok(self.manager.get_all_resources::<T>())
    }

    pub fn get_roots(&self) -> Result<Vec<Arc<Resource>>, ResourceError> {
        self.validate_health_state()?;
        Ok(self.manager.get_roots())
    }

    /// Subscribes to resource-added and capability-changed events.
    pub fn subscribe(&self) -> Result<broadcast::Receiver<ManagerEvent>, ResourceError> {
        self.validate_health_state()?;
        Ok(self.manager.subscribe())
    }
}
