//! # Entity Accessors
//!
//! Flat projection of a resource and its outgoing relations, as read from and
//! written to the store. Accessors only live during load and save translation.

use super::{Resource, ResourceId, TRANSIENT_ID};
use crate::error::ResourceError;
use crate::store::{ResourceEntity, UnitOfWork};
use crate::types::ResourceTypeController;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// One persisted outgoing relation of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationAccessor {
    pub relation_id: i64,
    pub target_id: ResourceId,
    pub role: String,
    pub is_collection: bool,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceEntityAccessor {
    pub id: ResourceId,
    pub type_name: String,
    pub name: String,
    pub properties: BTreeMap<String, Value>,
    pub relations: Vec<RelationAccessor>,
}

impl ResourceEntityAccessor {
    /// Accessor of a resource that was never saved, named after its type.
    pub fn template(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self {
            id: TRANSIENT_ID,
            name: type_name.clone(),
            type_name,
            properties: BTreeMap::new(),
            relations: Vec::new(),
        }
    }

    /// Reads every active resource together with its active outgoing relations.
    pub fn fetch_all(uow: &mut dyn UnitOfWork) -> Vec<Self> {
        let entities = uow.resources().active();
        entities
            .into_iter()
            .map(|entity| {
                let relations = uow
                    .relations()
                    .by_source(entity.id)
                    .into_iter()
                    .map(|relation| RelationAccessor {
                        relation_id: relation.id,
                        target_id: relation.target_id,
                        role: relation.role,
                        is_collection: relation.is_collection,
                        position: relation.position,
                    })
                    .collect();
                Self {
                    id: entity.id,
                    type_name: entity.type_name,
                    name: entity.name,
                    properties: entity.properties,
                    relations,
                }
            })
            .collect()
    }

    /// Creates the live resource and restores its scalar state. References
    /// are left to the linker.
    pub fn instantiate(
        &self,
        types: &dyn ResourceTypeController,
    ) -> Result<Arc<Resource>, ResourceError> {
        let resource = types.create(&self.type_name)?;
        resource.restore(self.id, &self.name, self.properties.clone());
        debug!(resource = %resource, "Instantiated");
        Ok(resource)
    }
}

/// Bookkeeping of one save transaction.
///
/// Tracks which resources were already written and which of them received a
/// fresh id. The ids reach the resources in [`SaveSession::commit`], while the
/// unit of work still holds the store, so a concurrent save of the same
/// resource can never see it as transient after its row was committed.
#[derive(Default)]
pub(crate) struct SaveSession {
    written: HashMap<usize, (Arc<Resource>, ResourceId, bool)>,
}

impl SaveSession {
    fn key(resource: &Arc<Resource>) -> usize {
        Arc::as_ptr(resource) as usize
    }

    /// Id the resource has within this transaction, if it was written.
    pub fn id_of(&self, resource: &Arc<Resource>) -> Option<ResourceId> {
        self.written
            .get(&Self::key(resource))
            .map(|(_, id, _)| *id)
    }

    fn record(&mut self, resource: &Arc<Resource>, id: ResourceId, fresh: bool) {
        self.written
            .insert(Self::key(resource), (resource.clone(), id, fresh));
    }

    fn fresh(&self) -> impl Iterator<Item = (&Arc<Resource>, ResourceId)> {
        self.written
            .values()
            .filter(|(_, _, fresh)| *fresh)
            .map(|(resource, id, _)| (resource, *id))
    }

    /// Commits `uow` and returns the resources that were new, ordered by id.
    ///
    /// New resources carry their store id from just before the commit. If the
    /// commit fails they are made transient again.
    pub fn commit(self, uow: Box<dyn UnitOfWork>) -> Result<Vec<Arc<Resource>>, ResourceError> {
        for (resource, id) in self.fresh() {
            resource.assign_id(id);
        }
        if let Err(e) = uow.commit() {
            for (resource, _) in self.fresh() {
                resource.assign_id(TRANSIENT_ID);
            }
            return Err(e.into());
        }

        let mut fresh: Vec<_> = self.fresh().map(|(resource, _)| resource.clone()).collect();
        fresh.sort_by_key(|resource| resource.id());
        Ok(fresh)
    }
}

/// Writes the scalar state of `resource` and returns its id in this transaction.
///
/// Transient resources are inserted, persistent ones updated. Writing the same
/// resource twice in one session is a no-op.
pub(crate) fn save_to_entity(
    uow: &mut dyn UnitOfWork,
    session: &mut SaveSession,
    resource: &Arc<Resource>,
) -> Result<ResourceId, ResourceError> {
    if let Some(id) = session.id_of(resource) {
        return Ok(id);
    }

    let mut entity = ResourceEntity {
        id: resource.id(),
        type_name: resource.type_name().to_string(),
        name: resource.name(),
        properties: resource.properties(),
        deleted: false,
    };

    if resource.is_transient() {
        let id = uow.resources().add(entity);
        session.record(resource, id, true);
        Ok(id)
    } else {
        let id = entity.id;
        if let Some(existing) = uow.resources().get_by_key(id) {
            entity.deleted = existing.deleted;
        }
        uow.resources().update(entity)?;
        session.record(resource, id, false);
        Ok(id)
    }
}
