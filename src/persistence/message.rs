use crate::model::Resource;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Notification sent to the persistence coordinator.
#[derive(Debug)]
pub enum PersistenceRequest {
    /// A scalar property or reference of the resource changed.
    ResourceChanged { resource: Arc<Resource> },
    /// An auto-save collection of the resource was mutated.
    CollectionChanged { resource: Arc<Resource>, role: String },
    /// Answered once every earlier notification was persisted.
    Flush { respond_to: oneshot::Sender<()> },
}
