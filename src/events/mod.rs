//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to lifecycle events emitted by entity instances,
//! supervisors, the shard registry, and the node runtime.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `EntityInstance`, `EntitySupervisor`, `ShardRegistry`,
//!   `Node`.
//! - **Consumers**: the node's subscriber listener (fans out to
//!   `SubscriberSet`) and any test that wants to observe runtime behavior.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
