//! Node runtime: wiring and lifecycle.
//!
//! This module contains the embedded runtime of a devicehub node. The only
//! public API from here is [`Node`], which wires the journal, event bus,
//! shard registry, and gateway together, serves the HTTP surface, and
//! drives graceful shutdown.
//!
//! Internal modules:
//! - [`node`]: component wiring, HTTP serving, shutdown with grace;
//! - [`shutdown`]: cross-platform termination-signal handling.

mod node;
mod shutdown;

pub use node::Node;
