//! Built-in grouping resource.

use super::{ReferenceDecl, ResourceBehavior};
use std::any::Any;

/// Type name of [`ResourceGroup`], also the default root type.
pub const RESOURCE_GROUP_TYPE: &str = "ResourceGroup";

/// Role of the children collection of a group.
pub const CHILDREN_ROLE: &str = "children";

const GROUP_REFERENCES: &[ReferenceDecl] = &[ReferenceDecl::collection(CHILDREN_ROLE).auto_save()];

/// Logical node that only organizes other resources.
///
/// Adding or removing a child persists the collection right away.
#[derive(Debug, Default)]
pub struct ResourceGroup;

impl ResourceBehavior for ResourceGroup {
    fn references(&self) -> &'static [ReferenceDecl] {
        GROUP_REFERENCES
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
