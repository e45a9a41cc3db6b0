//! # Resource Management Demo
//!
//! Boots an in-memory plant, adds two stations below the default root group,
//! queries them by capability and shuts the module down again.

use async_trait::async_trait;
use resource_management::capabilities::Capabilities;
use resource_management::config::ModuleConfig;
use resource_management::error::{BoxError, ResourceError};
use resource_management::events::ManagerEvent;
use resource_management::lifecycle::tracing::setup_tracing;
use resource_management::lifecycle::ResourceModule;
use resource_management::model::{Resource, ResourceBehavior, CHILDREN_ROLE};
use resource_management::reporting::TracingReporter;
use resource_management::store::MemoryStore;
use resource_management::types::TypeRegistry;
use serde_json::json;
use std::any::Any;
use std::sync::Arc;
use tracing::{info, Instrument};

/// A workstation that can assemble or test parts.
struct Station;

#[async_trait]
impl ResourceBehavior for Station {
    fn capabilities(&self) -> Option<Capabilities> {
        Some(Capabilities::of(["assembly"]))
    }

    async fn start(&self, resource: &Resource) -> Result<(), BoxError> {
        info!(station = %resource, "Station online");
        Ok(())
    }

    async fn stop(&self, resource: &Resource) -> Result<(), BoxError> {
        info!(station = %resource, "Station offline");
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[tokio::main]
async fn main() -> Result<(), ResourceError> {
    setup_tracing();

    info!("Starting resource module demo");

    let types = TypeRegistry::with_defaults().register("Station", || Box::new(Station));
    let module = ResourceModule::new(
        ModuleConfig::default(),
        Arc::new(MemoryStore::new()),
        Arc::new(types),
        Arc::new(TracingReporter),
    );
    module.start().await?;

    let manager = module.manager().clone();
    let facade = module.facade();
    let mut events = facade.subscribe()?;

    // The empty store was seeded with a single root group.
    let root = facade
        .get_roots()?
        .into_iter()
        .next()
        .ok_or(ResourceError::NotFound { matches: 0 })?;
    info!(root = %root, "Plant root");

    let span = tracing::info_span!("plant_setup");
    async {
        for (name, slot) in [("Station 1", 1), ("Station 2", 2)] {
            let station = manager.create("Station")?;
            station.set_name(name);
            station.set_property("slot", json!(slot));
            station.set_parent(Some(&root));
            // The children collection is auto-save: this persists the station.
            root.add_to(CHILDREN_ROLE, station)?;
        }
        manager.flush().await
    }
    .instrument(span)
    .await?;

    while let Ok(event) = events.try_recv() {
        if let ManagerEvent::ResourceAdded(resource) = event {
            info!(resource = %resource, "Resource added");
        }
    }

    let second = facade.get_resource_by_name::<Station>("Station 2")?;
    second.set_capabilities(Capabilities::of(["assembly", "testing"]))?;

    let tester = facade.get_resource_with_capabilities::<Station>(&Capabilities::of(["testing"]))?;
    info!(station = %tester, "Found testing station");

    let assembly =
        facade.get_resources_with_capabilities::<Station>(&Capabilities::of(["assembly"]))?;
    info!(count = assembly.count(), "Assembly stations");

    module.shutdown().await?;

    info!("Demo completed successfully");
    Ok(())
}
