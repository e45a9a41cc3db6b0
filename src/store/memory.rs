//! In-memory store.
//!
//! Write transactions hold an owned lock on the data for their whole lifetime,
//! so concurrent writers serialize at the transaction boundary. Changes are
//! staged on a working copy and only swapped in on commit.

use super::{
    ContextMode, RelationEntity, RelationRepository, ResourceEntity, ResourceRepository,
    StoreError, UnitOfWork, UnitOfWorkFactory,
};
use crate::model::ResourceId;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

#[derive(Debug, Clone, Default)]
struct StoreData {
    resources: BTreeMap<ResourceId, ResourceEntity>,
    relations: BTreeMap<i64, RelationEntity>,
    last_resource_id: ResourceId,
    last_relation_id: i64,
}

/// Store keeping every row in process memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<StoreData>>,
    failing_commits: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` commits fail with [`StoreError::CommitFailed`].
    pub fn fail_next_commits(&self, count: usize) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Copy of a resource row, including soft-deleted ones.
    pub async fn resource_entity(&self, id: ResourceId) -> Option<ResourceEntity> {
        self.data.lock().await.resources.get(&id).cloned()
    }

    /// Number of resource rows that are not soft-deleted.
    pub async fn active_resource_count(&self) -> usize {
        self.data
            .lock()
            .await
            .resources
            .values()
            .filter(|entity| !entity.deleted)
            .count()
    }

    /// Every relation row touching `id`, history included.
    pub async fn relation_rows(&self, id: ResourceId) -> Vec<RelationEntity> {
        self.data.lock().await.involving(id, true)
    }
}

#[async_trait]
impl UnitOfWorkFactory for MemoryStore {
    async fn open(&self, mode: ContextMode) -> Result<Box<dyn UnitOfWork>, StoreError> {
        match mode {
            ContextMode::ReadOnly => {
                let working = self.data.lock().await.clone();
                Ok(Box::new(MemoryUnitOfWork {
                    mode,
                    guard: None,
                    working,
                    failing_commits: self.failing_commits.clone(),
                }))
            }
            ContextMode::ReadWrite => {
                let guard = self.data.clone().lock_owned().await;
                let working = (*guard).clone();
                Ok(Box::new(MemoryUnitOfWork {
                    mode,
                    guard: Some(guard),
                    working,
                    failing_commits: self.failing_commits.clone(),
                }))
            }
        }
    }
}

struct MemoryUnitOfWork {
    mode: ContextMode,
    guard: Option<OwnedMutexGuard<StoreData>>,
    working: StoreData,
    failing_commits: Arc<AtomicUsize>,
}

impl UnitOfWork for MemoryUnitOfWork {
    fn mode(&self) -> ContextMode {
        self.mode
    }

    fn resources(&mut self) -> &mut dyn ResourceRepository {
        &mut self.working
    }

    fn relations(&mut self) -> &mut dyn RelationRepository {
        &mut self.working
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryUnitOfWork {
            guard,
            working,
            failing_commits,
            ..
        } = *self;
        let Some(mut guard) = guard else {
            return Err(StoreError::ReadOnly);
        };
        let injected = failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::CommitFailed("injected failure".to_string()));
        }
        debug!(
            resources = working.resources.len(),
            relations = working.relations.len(),
            "Committed"
        );
        *guard = working;
        Ok(())
    }
}

impl ResourceRepository for StoreData {
    fn get_by_key(&self, id: ResourceId) -> Option<ResourceEntity> {
        self.resources.get(&id).cloned()
    }

    fn active(&self) -> Vec<ResourceEntity> {
        self.resources
            .values()
            .filter(|entity| !entity.deleted)
            .cloned()
            .collect()
    }

    fn add(&mut self, mut entity: ResourceEntity) -> ResourceId {
        self.last_resource_id += 1;
        entity.id = self.last_resource_id;
        self.resources.insert(entity.id, entity);
        self.last_resource_id
    }

    fn update(&mut self, entity: ResourceEntity) -> Result<(), StoreError> {
        match self.resources.get_mut(&entity.id) {
            Some(existing) => {
                *existing = entity;
                Ok(())
            }
            None => Err(StoreError::EntityNotFound(entity.id)),
        }
    }

    fn remove(&mut self, id: ResourceId, permanent: bool) -> Result<(), StoreError> {
        if permanent {
            return self
                .resources
                .remove(&id)
                .map(|_| ())
                .ok_or(StoreError::EntityNotFound(id));
        }
        let entity = self
            .resources
            .get_mut(&id)
            .ok_or(StoreError::EntityNotFound(id))?;
        entity.deleted = true;
        Ok(())
    }
}

impl RelationRepository for StoreData {
    fn by_source(&self, source_id: ResourceId) -> Vec<RelationEntity> {
        self.relations
            .values()
            .filter(|relation| relation.source_id == source_id && !relation.deleted)
            .cloned()
            .collect()
    }

    fn involving(&self, id: ResourceId, include_deleted: bool) -> Vec<RelationEntity> {
        self.relations
            .values()
            .filter(|relation| relation.source_id == id || relation.target_id == id)
            .filter(|relation| include_deleted || !relation.deleted)
            .cloned()
            .collect()
    }

    fn add(&mut self, mut relation: RelationEntity) -> i64 {
        self.last_relation_id += 1;
        relation.id = self.last_relation_id;
        self.relations.insert(relation.id, relation);
        self.last_relation_id
    }

    fn update_position(&mut self, id: i64, position: u32) -> Result<(), StoreError> {
        let relation = self
            .relations
            .get_mut(&id)
            .ok_or(StoreError::EntityNotFound(id))?;
        relation.position = position;
        Ok(())
    }

    fn remove(&mut self, id: i64, permanent: bool) -> Result<(), StoreError> {
        if permanent {
            return self
                .relations
                .remove(&id)
                .map(|_| ())
                .ok_or(StoreError::EntityNotFound(id));
        }
        let relation = self
            .relations
            .get_mut(&id)
            .ok_or(StoreError::EntityNotFound(id))?;
        relation.deleted = true;
        Ok(())
    }
}
