//! # Resource Linker
//!
//! Translates between live references and persisted relation rows.
//!
//! Loading happens in two strictly separate phases: every resource is
//! instantiated first, then [`ResourceLinker::link_references`] resolves the
//! relation rows of each resource against the complete id map.
//!
//! Saving computes a delta per source resource. Rows are matched by
//! `(role, target)`, preferring the row at the same position, and each row
//! backs at most one live edge: a collection holding the same target twice
//! keeps two rows. A matching row only gets its position updated, missing
//! rows are added and rows without a live counterpart are soft-deleted so they
//! stay available as relation history. Transient targets found on the way are
//! written in the same transaction and returned to the caller.

use crate::error::ResourceError;
use crate::model::accessor::{save_to_entity, SaveSession};
use crate::model::{RelationAccessor, Resource, ResourceId};
use crate::store::{RelationEntity, UnitOfWork};
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceLinker;

struct WantedRelation {
    role: String,
    target_id: ResourceId,
    is_collection: bool,
    position: u32,
}

impl ResourceLinker {
    pub fn new() -> Self {
        Self
    }

    /// Sets the in-memory references of `resource` from its relation rows.
    ///
    /// Rows pointing to unknown targets or undeclared roles are skipped with a
    /// warning. Returns the number of linked references.
    pub fn link_references<F>(
        &self,
        resource: &Resource,
        relations: &[RelationAccessor],
        lookup: F,
    ) -> usize
    where
        F: Fn(ResourceId) -> Option<Arc<Resource>>,
    {
        let mut ordered: Vec<&RelationAccessor> = relations.iter().collect();
        ordered.sort_by(|a, b| a.role.cmp(&b.role).then(a.position.cmp(&b.position)));

        let mut linked = 0;
        for relation in ordered {
            let Some(target) = lookup(relation.target_id) else {
                warn!(
                    resource = %resource,
                    role = %relation.role,
                    target_id = relation.target_id,
                    "Relation target not found, skipping"
                );
                continue;
            };
            match resource.link(&relation.role, target, relation.is_collection) {
                Ok(()) => linked += 1,
                Err(e) => warn!(error = %e, "Skipping relation"),
            }
        }
        debug!(resource = %resource, linked, "Linked references");
        linked
    }

    /// Persists the full relation delta of `resource`.
    ///
    /// Returns every transient resource that was written along the way.
    pub(crate) fn save_references(
        &self,
        uow: &mut dyn UnitOfWork,
        session: &mut SaveSession,
        resource: &Arc<Resource>,
        source_id: ResourceId,
    ) -> Result<Vec<Arc<Resource>>, ResourceError> {
        self.save_relations(uow, session, resource, source_id, None)
    }

    /// Persists one collection of `resource`.
    pub(crate) fn save_single_collection(
        &self,
        uow: &mut dyn UnitOfWork,
        session: &mut SaveSession,
        resource: &Arc<Resource>,
        role: &str,
    ) -> Result<Vec<Arc<Resource>>, ResourceError> {
        let source_id = save_to_entity(uow, session, resource)?;
        self.save_relations(uow, session, resource, source_id, Some(role))
    }

    fn save_relations(
        &self,
        uow: &mut dyn UnitOfWork,
        session: &mut SaveSession,
        resource: &Arc<Resource>,
        source_id: ResourceId,
        scope: Option<&str>,
    ) -> Result<Vec<Arc<Resource>>, ResourceError> {
        let mut discovered = Vec::new();
        let mut queue = VecDeque::from([(resource.clone(), source_id, scope)]);

        while let Some((current, current_id, scope)) = queue.pop_front() {
            let mut wanted = Vec::new();
            for relation in current.outgoing(scope) {
                let target_id = match session.id_of(&relation.target) {
                    Some(id) => id,
                    None if relation.target.is_transient() => {
                        let id = save_to_entity(uow, session, &relation.target)?;
                        discovered.push(relation.target.clone());
                        queue.push_back((relation.target.clone(), id, None));
                        id
                    }
                    None => relation.target.id(),
                };
                wanted.push(WantedRelation {
                    role: relation.role,
                    target_id,
                    is_collection: relation.is_collection,
                    position: relation.position,
                });
            }
            Self::apply_delta(uow, current_id, scope, wanted)?;
        }
        Ok(discovered)
    }

    fn apply_delta(
        uow: &mut dyn UnitOfWork,
        source_id: ResourceId,
        scope: Option<&str>,
        wanted: Vec<WantedRelation>,
    ) -> Result<(), ResourceError> {
        let mut existing: Vec<RelationEntity> = uow
            .relations()
            .by_source(source_id)
            .into_iter()
            .filter(|row| scope.map_or(true, |role| row.role == role))
            .collect();

        for relation in wanted {
            let same_edge = |row: &RelationEntity| {
                row.role == relation.role && row.target_id == relation.target_id
            };
            let matching = existing
                .iter()
                .position(|row| same_edge(row) && row.position == relation.position)
                .or_else(|| existing.iter().position(same_edge));
            match matching {
                Some(index) => {
                    let row = existing.swap_remove(index);
                    if row.position != relation.position {
                        uow.relations().update_position(row.id, relation.position)?;
                    }
                }
                None => {
                    uow.relations().add(RelationEntity {
                        id: 0,
                        source_id,
                        target_id: relation.target_id,
                        role: relation.role,
                        is_collection: relation.is_collection,
                        position: relation.position,
                        deleted: false,
                    });
                }
            }
        }

        for stale in existing {
            debug!(source_id, role = %stale.role, target_id = stale.target_id, "Removing relation");
            uow.relations().remove(stale.id, false)?;
        }
        Ok(())
    }

    /// Removes every in-memory edge between the two resources, both directions.
    pub fn remove_linking(&self, resource: &Resource, reference: &Resource) -> bool {
        let forward = resource.unlink(reference);
        let backward = reference.unlink(resource);
        forward || backward
    }

    /// Collection roles of `resource` that persist on mutation.
    pub fn auto_save_collections(&self, resource: &Resource) -> BTreeSet<String> {
        resource
            .declared_references()
            .iter()
            .filter(|decl| decl.collection && decl.auto_save)
            .map(|decl| decl.role.to_string())
            .collect()
    }
}
