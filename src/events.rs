//! Events broadcast by the resource manager.

use crate::capabilities::Capabilities;
use crate::model::Resource;
use std::sync::Arc;

/// Notification sent to every subscriber of
/// [`ResourceManager::subscribe`](crate::lifecycle::ResourceManager::subscribe).
///
/// Events are sent on the thread that detected the change. Subscribers that
/// lag behind the channel capacity miss the oldest events.
#[derive(Debug, Clone)]
pub enum ManagerEvent {
    /// A public resource was inserted into the graph.
    ResourceAdded(Arc<Resource>),
    /// A public resource replaced its capability declaration.
    CapabilitiesChanged {
        source: Arc<Resource>,
        capabilities: Capabilities,
    },
}
