//! # Lifecycle
//!
//! The runtime side of the resource core.
//!
//! - [`ResourceManager`] owns the graph, runs the startup state machine and
//!   persists mutations.
//! - [`ResourceWrapper`] tracks the lifecycle state of a single resource.
//! - [`ResourceModule`] wires manager and facade together and is what a host
//!   starts and shuts down.
//! - [`tracing`] installs the log subscriber.

mod fanout;
pub(crate) mod graph;
pub mod manager;
pub mod module;
pub mod tracing;
pub mod wrapper;

pub use manager::{ResourceManager, StartupPhase};
pub use module::ResourceModule;
pub use wrapper::{LifecycleState, ResourceWrapper, Transition};
