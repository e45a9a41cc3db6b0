use super::PersistenceRequest;
use crate::error::ResourceError;
use crate::model::Resource;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Sending half of the persistence coordinator.
///
/// Notifications are fire-and-forget so they can be sent from synchronous
/// setters. Only [`flush`](PersistenceClient::flush) waits for an answer.
#[derive(Clone, Debug)]
pub struct PersistenceClient {
    sender: mpsc::UnboundedSender<PersistenceRequest>,
}

impl PersistenceClient {
    pub fn new(sender: mpsc::UnboundedSender<PersistenceRequest>) -> Self {
        Self { sender }
    }

    pub fn resource_changed(&self, resource: Arc<Resource>) {
        if self
            .sender
            .send(PersistenceRequest::ResourceChanged { resource })
            .is_err()
        {
            debug!("Coordinator closed, dropping notification");
        }
    }

    pub fn collection_changed(&self, resource: Arc<Resource>, role: &str) {
        let request = PersistenceRequest::CollectionChanged {
            resource,
            role: role.to_string(),
        };
        if self.sender.send(request).is_err() {
            debug!(role, "Coordinator closed, dropping notification");
        }
    }

    /// Waits until every notification sent before this call was persisted.
    pub async fn flush(&self) -> Result<(), ResourceError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(PersistenceRequest::Flush { respond_to })
            .map_err(|_| ResourceError::CoordinatorClosed)?;
        response.await.map_err(|_| ResourceError::CoordinatorClosed)
    }
}
