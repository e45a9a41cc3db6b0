//! # Mock Coordinator
//!
//! Utilities for testing notification senders without a running manager.
//!
//! Use [`create_mock_client`] to get a client and the receiver it sends to,
//! then assert on the next request with the `expect_*` helpers.

use super::{PersistenceClient, PersistenceRequest};
use crate::model::Resource;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Creates a client whose requests arrive at the returned receiver.
pub fn create_mock_client() -> (PersistenceClient, mpsc::UnboundedReceiver<PersistenceRequest>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (PersistenceClient::new(sender), receiver)
}

/// Helper to verify that the next message is a ResourceChanged notification
pub async fn expect_resource_changed(
    receiver: &mut mpsc::UnboundedReceiver<PersistenceRequest>,
) -> Option<Arc<Resource>> {
    match receiver.recv().await {
        Some(PersistenceRequest::ResourceChanged { resource }) => Some(resource),
        _ => None,
    }
}

/// Helper to verify that the next message is a CollectionChanged notification
pub async fn expect_collection_changed(
    receiver: &mut mpsc::UnboundedReceiver<PersistenceRequest>,
) -> Option<(Arc<Resource>, String)> {
    match receiver.recv().await {
        Some(PersistenceRequest::CollectionChanged { resource, role }) => Some((resource, role)),
        _ => None,
    }
}

/// Helper to verify that the next message is a Flush request
pub async fn expect_flush(
    receiver: &mut mpsc::UnboundedReceiver<PersistenceRequest>,
) -> Option<oneshot::Sender<()>> {
    match receiver.recv().await {
        Some(PersistenceRequest::Flush { respond_to }) => Some(respond_to),
        _ => None,
    }
}
