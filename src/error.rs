//! # Resource Errors
//!
//! This module defines the common error type used throughout the resource core.
//! Store and configuration failures have their own enums and convert into
//! [`ResourceError`] where they cross into a manager operation.

use crate::lifecycle::Transition;
use crate::model::ResourceId;
use crate::store::StoreError;

/// Error type returned by resource behavior hooks.
///
/// Behaviors are free to fail with any error; the manager wraps it into
/// [`ResourceError::Lifecycle`] together with the resource and the transition.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur within the resource core.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    /// A single-result query did not find exactly one match.
    ///
    /// Zero and several matches are reported through the same variant; callers
    /// must not pick one of several physical devices by accident.
    #[error("Resource not found ({matches} matches)")]
    NotFound { matches: usize },
    #[error("Unknown resource: {0}")]
    UnknownResource(ResourceId),
    #[error("Unknown resource type: {0}")]
    UnknownType(String),
    #[error("Resource {resource} has no relation named '{role}'")]
    UnknownRelation { resource: String, role: String },
    #[error("Resource {0} is not public")]
    NotPublic(String),
    #[error("{transition} of {resource} failed: {source}")]
    Lifecycle {
        resource: String,
        transition: Transition,
        source: BoxError,
    },
    #[error("Cannot {transition} {resource} before it was initialized")]
    InvalidTransition {
        resource: String,
        transition: Transition,
    },
    #[error("Worker panicked: {0}")]
    Panicked(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Persistence coordinator closed")]
    CoordinatorClosed,
    #[error("Resource facade is not activated")]
    FacadeInactive,
}
