//! # Mutation-driven Persistence
//!
//! Resources report their mutations as messages to a single coordinator task
//! instead of invoking store code from inside a setter.
//!
//! - [`PersistenceClient`] is the cloneable sending half. The manager installs
//!   a clone into every tracked resource.
//! - [`PersistenceActor`] owns the receiver. Each notification becomes its own
//!   save transaction, newly surfaced resources are inserted into the graph
//!   exactly as with an explicit save.
//! - [`mock`] provides a channel-backed client for tests.

pub mod actor;
pub mod client;
pub mod message;
pub mod mock;

pub use actor::PersistenceActor;
pub use client::PersistenceClient;
pub use message::PersistenceRequest;
