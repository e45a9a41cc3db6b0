//! # Resource Management
//!
//! > **The resource graph of a modular automation platform.**
//!
//! Every physical or logical entity of a plant (machines, stations, sensors,
//! grouping nodes) is a node of one in-memory object graph. This crate loads
//! that graph from a store, drives every node through its lifecycle, writes
//! mutations back and answers capability-based queries for the rest of the
//! platform.
//!
//! ## Core Concepts
//!
//! ### Resources and behaviors
//! A [`Resource`](model::Resource) is generic: identity, name, JSON properties,
//! a parent and named references. What a resource *does* lives in its
//! [`ResourceBehavior`](model::ResourceBehavior), which the host's
//! [`ResourceTypeController`](types::ResourceTypeController) creates from a type
//! name.
//!
//! ### Bulk lifecycle with fault isolation
//! Boot and shutdown fan out over every node with a bounded worker pool. A node
//! failing its transition is marked faulted, hidden from queries and reported;
//! its siblings carry on.
//!
//! ### Mutation-driven persistence
//! Tracked resources report changes as messages to a persistence coordinator
//! task. Each notification runs its own transaction. See [`persistence`].
//!
//! ### Public subset
//! Only resources with a capability facet are visible to queries. See
//! [`query`] and [`capabilities`].
//!
//! ## Module Tour
//!
//! - [`model`]: resources, behaviors, entity accessors, the built-in group.
//! - [`store`]: unit-of-work interfaces and the in-memory store.
//! - [`linker`]: relation rows to live references and back.
//! - [`lifecycle`]: [`ResourceManager`](lifecycle::ResourceManager),
//!   [`ResourceModule`](lifecycle::ResourceModule), tracing setup.
//! - [`facade`]: lifecycle-bound entry point for other modules.
//! - [`config`], [`error`], [`events`], [`reporting`]: the supporting cast.
//!
//! ## Running the Demo
//!
//! ```bash
//! RUST_LOG=info cargo run
//! ```

pub mod capabilities;
pub mod config;
pub mod error;
pub mod events;
pub mod facade;
pub mod lifecycle;
pub mod linker;
pub mod model;
pub mod persistence;
pub mod query;
pub mod reporting;
pub mod store;
pub mod types;
