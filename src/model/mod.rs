//! The resource graph model: nodes, their behaviors and the flat accessor
//! form used for store translation.

pub mod accessor;
pub mod group;
pub mod resource;

pub use accessor::{RelationAccessor, ResourceEntityAccessor};
pub use group::{ResourceGroup, CHILDREN_ROLE, RESOURCE_GROUP_TYPE};
pub use resource::{
    ReferenceDecl, Resource, ResourceBehavior, ResourceId, PARENT_ROLE, TRANSIENT_ID,
};
