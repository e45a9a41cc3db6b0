use super::ResourceManager;
use crate::config::ModuleConfig;
use crate::error::ResourceError;
use crate::facade::ResourceFacade;
use crate::reporting::ErrorReporting;
use crate::store::UnitOfWorkFactory;
use crate::types::ResourceTypeController;
use std::sync::Arc;
use tracing::info;

/// The resource module as a host sees it.
///
/// `ResourceModule` is responsible for:
/// - **Wiring**: creating the manager from the store, type controller and
///   error reporting the host provides, and the facade on top of it.
/// - **Lifecycle**: booting the graph and activating the facade in
///   [`start`](Self::start), and the reverse in [`shutdown`](Self::shutdown).
///
/// # Example
///
/// ```ignore
/// let module = ResourceModule::new(config, store, types, reporting);
/// module.start().await?;
///
/// let facade = module.facade();
/// let station = facade.get_resource_by_name::<Station>("Station 1")?;
///
/// module.shutdown().await?;
/// ```
pub struct ResourceModule {
    manager: Arc<ResourceManager>,
    facade: Arc<ResourceFacade>,
}

impl ResourceModule {
    /// Creates the manager and the facade. Must run inside a tokio runtime.
    pub fn new(
        config: ModuleConfig,
        store: Arc<dyn UnitOfWorkFactory>,
        types: Arc<dyn ResourceTypeController>,
        reporting: Arc<dyn ErrorReporting>,
    ) -> Self {
        let manager = ResourceManager::new(config, store, types, reporting);
        let facade = Arc::new(ResourceFacade::new(manager.clone()));
        Self { manager, facade }
    }

    pub fn manager(&self) -> &Arc<ResourceManager> {
        &self.manager
    }

    pub fn facade(&self) -> Arc<ResourceFacade> {
        self.facade.clone()
    }

    /// Loads, initializes and starts the graph, then activates the facade.
    pub async fn start(&self) -> Result<(), ResourceError> {
        info!("Starting resource module...");
        self.manager.initialize().await?;
        self.manager.start().await?;
        self.facade.activate();
        info!(resources = self.manager.len(), "Resource module started");
        Ok(())
    }

    /// Deactivates the facade, stops every resource and flushes pending saves.
    pub async fn shutdown(self) -> Result<(), ResourceError> {
        info!("Shutting down resource module...");
        self.facade.deactivate();
        self.manager.stop().await?;
        self.manager.dispose().await?;
        info!("Resource module shutdown complete.");
        Ok(())
    }
}
