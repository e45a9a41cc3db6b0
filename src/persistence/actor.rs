use super::{PersistenceClient, PersistenceRequest};
use crate::lifecycle::ResourceManager;
use crate::model::Resource;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

const SOURCE: &str = "PersistenceCoordinator";

/// Consumes change notifications and runs one save transaction per
/// notification.
///
/// Saves run as independent tasks, so saves of unrelated resources proceed
/// concurrently. Saves touching the same rows serialize in the store.
pub struct PersistenceActor {
    receiver: mpsc::UnboundedReceiver<PersistenceRequest>,
    in_flight: JoinSet<()>,
}

impl PersistenceActor {
    pub fn new() -> (Self, PersistenceClient) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let actor = Self {
            receiver,
            in_flight: JoinSet::new(),
        };
        (actor, PersistenceClient::new(sender))
    }

    /// Runs the coordinator loop until every client was dropped.
    ///
    /// The manager is held weakly so the coordinator does not keep it alive.
    pub async fn run(mut self, manager: Weak<ResourceManager>) {
        info!("Persistence coordinator started");
        let mut handled = 0usize;

        loop {
            tokio::select! {
                request = self.receiver.recv() => match request {
                    Some(PersistenceRequest::ResourceChanged { resource }) => {
                        debug!(resource = %resource, "Resource changed");
                        handled += 1;
                        self.spawn_save(manager.clone(), resource, None);
                    }
                    Some(PersistenceRequest::CollectionChanged { resource, role }) => {
                        debug!(resource = %resource, %role, "Collection changed");
                        handled += 1;
                        self.spawn_save(manager.clone(), resource, Some(role));
                    }
                    Some(PersistenceRequest::Flush { respond_to }) => {
                        self.drain().await;
                        let _ = respond_to.send(());
                    }
                    None => break,
                },
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "Save task failed");
                    }
                }
            }
        }

        self.drain().await;
        info!(handled, "Shutdown");
    }

    fn spawn_save(
        &mut self,
        manager: Weak<ResourceManager>,
        resource: Arc<Resource>,
        role: Option<String>,
    ) {
        self.in_flight.spawn(async move {
            let Some(manager) = manager.upgrade() else {
                debug!(resource = %resource, "Manager gone, dropping save");
                return;
            };
            let result = match &role {
                Some(role) => manager.save_collection(&resource, role).await,
                None => manager.save(&resource).await,
            };
            if let Err(e) = result {
                manager.report(SOURCE, &e);
            }
        });
    }

    async fn drain(&mut self) {
        while let Some(joined) = self.in_flight.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Save task failed");
            }
        }
    }
}
