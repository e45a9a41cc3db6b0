//! # Store Interfaces
//!
//! The resource core does not own a database. It talks to the store through a
//! narrow unit-of-work interface:
//!
//! - [`UnitOfWorkFactory::open`] acquires a transaction scope,
//! - [`UnitOfWork::resources`] / [`UnitOfWork::relations`] expose the two
//!   repositories,
//! - [`UnitOfWork::commit`] makes the changes durable.
//!
//! Dropping a unit of work without committing rolls it back, on every exit
//! path including early returns through `?`.
//!
//! [`memory::MemoryStore`] is the in-process implementation used by the demo
//! binary and the tests.

pub mod memory;

use crate::model::ResourceId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use memory::MemoryStore;

/// Errors reported by a store implementation.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum StoreError {
    #[error("Store is unavailable: {0}")]
    Unavailable(String),
    #[error("Commit failed: {0}")]
    CommitFailed(String),
    #[error("Context is read-only")]
    ReadOnly,
    #[error("Entity not found: {0}")]
    EntityNotFound(i64),
}

/// Access mode of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMode {
    /// Snapshot reads, commit is refused.
    ReadOnly,
    /// Exclusive transaction, serialized against other writers.
    ReadWrite,
}

/// Persisted row of one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceEntity {
    pub id: ResourceId,
    pub type_name: String,
    pub name: String,
    pub properties: BTreeMap<String, serde_json::Value>,
    /// Soft-deleted rows stay recoverable but are not loaded at boot.
    pub deleted: bool,
}

/// Persisted row of one directed relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationEntity {
    pub id: i64,
    pub source_id: ResourceId,
    pub target_id: ResourceId,
    pub role: String,
    pub is_collection: bool,
    pub position: u32,
    /// Soft-deleted rows form the relation history of a resource.
    pub deleted: bool,
}

impl RelationEntity {
    /// The endpoint on the other side of `id`.
    pub fn opposite(&self, id: ResourceId) -> ResourceId {
        if self.source_id == id {
            self.target_id
        } else {
            self.source_id
        }
    }
}

pub trait ResourceRepository {
    /// Fetches a row by id, including soft-deleted rows.
    fn get_by_key(&self, id: ResourceId) -> Option<ResourceEntity>;

    /// All rows that are not soft-deleted.
    fn active(&self) -> Vec<ResourceEntity>;

    /// Inserts a new row and returns the id assigned by the store.
    fn add(&mut self, entity: ResourceEntity) -> ResourceId;

    fn update(&mut self, entity: ResourceEntity) -> Result<(), StoreError>;

    /// Soft-deletes the row, or removes it entirely when `permanent`.
    fn remove(&mut self, id: ResourceId, permanent: bool) -> Result<(), StoreError>;
}

pub trait RelationRepository {
    /// Active relations owned by `source_id`.
    fn by_source(&self, source_id: ResourceId) -> Vec<RelationEntity>;

    /// Relations with `id` on either end, optionally including history rows.
    fn involving(&self, id: ResourceId, include_deleted: bool) -> Vec<RelationEntity>;

    fn add(&mut self, relation: RelationEntity) -> i64;

    fn update_position(&mut self, id: i64, position: u32) -> Result<(), StoreError>;

    fn remove(&mut self, id: i64, permanent: bool) -> Result<(), StoreError>;
}

/// A transaction scope over both repositories.
pub trait UnitOfWork: Send {
    fn mode(&self) -> ContextMode;

    fn resources(&mut self) -> &mut dyn ResourceRepository;

    fn relations(&mut self) -> &mut dyn RelationRepository;

    /// Makes every staged change durable. Consumes the scope.
    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Opens units of work. Implemented by the host's persistence layer.
#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    async fn open(&self, mode: ContextMode) -> Result<Box<dyn UnitOfWork>, StoreError>;
}
