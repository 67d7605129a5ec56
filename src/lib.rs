//! # devicehub
//!
//! **Devicehub** is a sharded, event-sourced device runtime for Rust.
//!
//! Each device is an independent, uniquely-keyed state machine hosted as a
//! single-writer entity: commands for one key are processed strictly one at
//! a time, every transition is durably appended to a journal before the
//! caller sees a reply, and a per-entity supervisor recreates a failed
//! instance from its log with exponential backoff. A shard registry keeps
//! at most one live instance per key cluster-wide, and an ask gateway lets
//! callers address a device by key without knowing where it runs.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   HTTP caller                HTTP caller
//!       │                          │
//!       ▼                          ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Gateway  request(key, command) → reply | timeout | unavailable   │
//! └──────┬────────────────────────────────────────────────────────────┘
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  ShardRegistry (key → one live entity)                            │
//! │  - shard_of(key) → MembershipOracle.owner_of(shard)               │
//! │  - lazy create on first reference, evict on rebalance             │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!  ┌────────────┐    ┌────────────┐    ┌────────────┐
//!  │ Supervisor │    │ Supervisor │    │ Supervisor │   (one per key)
//!  │  backoff   │    │  backoff   │    │  backoff   │
//!  └─────┬──────┘    └─────┬──────┘    └─────┬──────┘
//!        ▼                 ▼                 ▼
//!  ┌────────────┐    ┌────────────┐    ┌────────────┐
//!  │  Instance  │    │  Instance  │    │  Instance  │   (single-writer
//!  │ transition │    │ transition │    │ transition │    command loop)
//!  │   apply    │    │   apply    │    │   apply    │
//!  └─────┬──────┘    └─────┬──────┘    └─────┬──────┘
//!        ▼                 ▼                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Journal  append / read_from / snapshots   (per-key partitions)   │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Lifecycle of one command
//! ```text
//! POST /device/37
//!   ├─► Gateway.request("37", Start)
//!   ├─► Registry.resolve("37")              (create + recover if absent)
//!   ├─► Envelope{ Start, reply-slot } ─► entity mailbox
//!   ├─► transition(Idle, Start) = Persist{ Started, reply Started }
//!   ├─► journal.append(37, 1, Started)      (durable before anything else)
//!   ├─► apply → Running, snapshot every 5th event
//!   ├─► reply-slot ← Started                (persist-then-reply)
//!   └─► 202 "started device 37"; heartbeat Tick re-arms while Running
//! ```
//!
//! ## Features
//! | Area             | Description                                            | Key types / traits                    |
//! |------------------|--------------------------------------------------------|---------------------------------------|
//! | **State machine**| Pure transition/apply split; replay-safe recovery.     | [`State`], [`CommandKind`], [`apply`] |
//! | **Journal**      | Append-only per-key log with snapshots.                | [`Journal`], [`MemoryJournal`]        |
//! | **Supervision**  | Restart-forever with backoff and jitter.               | [`BackoffPolicy`], [`JitterPolicy`]   |
//! | **Sharding**     | Key → shard → owning node, rebalance-aware.            | [`ShardRegistry`], [`MembershipOracle`] |
//! | **Gateway**      | Ask with timeout; HTTP surface included.               | [`Gateway`], [`router`]               |
//! | **Observability**| Broadcast bus + pluggable subscribers.                 | [`Bus`], [`Subscribe`], [`LogWriter`] |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use devicehub::{
//!     CommandKind, Config, LogWriter, MemoryJournal, Node, StaticMembership, Subscribe,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config::default();
//!     let journal = Arc::new(MemoryJournal::new());
//!     let oracle = Arc::new(StaticMembership::single_node("local"));
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!
//!     let node = Node::new(cfg, journal, oracle, subs);
//!
//!     // Embedded use without HTTP:
//!     let gateway = node.gateway();
//!     let reply = gateway.request("37", CommandKind::Start).await?;
//!     println!("device 37: {reply:?}");
//!
//!     // Or serve the HTTP surface until SIGTERM:
//!     node.run(([0, 0, 0, 0], 8080).into()).await?;
//!     Ok(())
//! }
//! ```

mod config;
mod device;
mod entity;
mod error;
mod events;
mod gateway;
mod journal;
mod policies;
mod registry;
mod runtime;
mod subscribers;

// ---- Public re-exports ----

pub use config::Config;
pub use device::{apply, transition, CommandKind, DeviceEvent, Effect, Reply, State};
pub use entity::{EntityRef, Envelope};
pub use error::{EntityError, GatewayError, JournalError, RegistryError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use gateway::{router, Gateway};
pub use journal::{Journal, JournalRef, MemoryJournal, SequenceNr, Snapshot};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use registry::{
    shard_of, MembershipOracle, NodeId, ShardId, ShardRegistry, StaticMembership,
};
pub use runtime::Node;
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
