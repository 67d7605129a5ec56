//! Shard/location registry: key → exactly one live entity.
//!
//! The registry is the cluster-wide location map. It never touches entity
//! state; it only decides **where** an entity lives and **whether** it is
//! allowed to live here.
//!
//! ## Architecture
//! ```text
//! resolve(key)
//!   ├─► shard = shard_of(key)
//!   ├─► owner = oracle.owner_of(shard)
//!   │     ├─ remote  → Err(NotOwner)      (forwarding is external)
//!   │     └─ local   → live handle, or create:
//!   │                    mailbox + child token + spawn EntitySupervisor
//!   └─► EntityRef (location-transparent mailbox handle)
//!
//! oracle epoch change ─► rebalance listener ─► evict entities whose shard
//!                                              moved away (lazy recreation
//!                                              on the new owner)
//! ```
//!
//! ## Rules
//! - At most one live instance per key on this node; the deterministic
//!   shard function plus the oracle extend that to the cluster.
//! - Eviction and passivation cancel the supervisor and join it before the
//!   handle is forgotten, so a later resolve never races a dying writer.
//! - All creation is lazy; a rebalance only tears down, it never pre-warms.

mod membership;
mod shard;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::entity::{EntityParams, EntityRef, EntitySupervisor, Envelope};
use crate::error::RegistryError;
use crate::events::{Bus, Event, EventKind};
use crate::journal::JournalRef;
use crate::policies::BackoffPolicy;

pub use membership::{MembershipOracle, NodeId, StaticMembership};
pub use shard::shard_of;

/// Identifier of one shard; keys are hashed into a fixed number of these.
pub type ShardId = u32;

/// Handle to one live, supervised entity.
struct Handle {
    shard: ShardId,
    tx: mpsc::Sender<Envelope>,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// Cluster-aware map from entity key to live entity handle.
pub struct ShardRegistry {
    entities: RwLock<HashMap<String, Handle>>,
    journal: JournalRef,
    oracle: Arc<dyn MembershipOracle>,
    bus: Bus,
    params: EntityParams,
    backoff: BackoffPolicy,
    shard_count: u32,
    mailbox_capacity: usize,
    runtime_token: CancellationToken,
}

impl ShardRegistry {
    /// Creates a registry bound to this node's journal and membership view.
    pub fn new(
        cfg: &Config,
        journal: JournalRef,
        oracle: Arc<dyn MembershipOracle>,
        bus: Bus,
        runtime_token: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            entities: RwLock::new(HashMap::new()),
            journal,
            oracle,
            bus,
            params: EntityParams::from_config(cfg),
            backoff: cfg.backoff,
            shard_count: cfg.shard_count_clamped(),
            mailbox_capacity: cfg.mailbox_capacity.max(1),
            runtime_token,
        })
    }

    /// Spawns the listener that reacts to membership epoch changes.
    ///
    /// Call once during node init.
    pub fn spawn_rebalance_listener(self: &Arc<Self>) {
        let me = Arc::clone(self);
        let mut epochs = self.oracle.subscribe();
        let token = self.runtime_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = epochs.changed() => {
                        if changed.is_err() {
                            break; // oracle dropped
                        }
                        me.bus.publish(Event::new(EventKind::MembershipChanged));
                        me.evict_moved().await;
                    }
                }
            }
        });
    }

    /// Resolves `key` to a live entity handle, creating the entity if the
    /// key's shard is owned locally and no instance exists yet.
    pub async fn resolve(&self, key: &str) -> Result<EntityRef, RegistryError> {
        if self.runtime_token.is_cancelled() {
            return Err(RegistryError::Stopped);
        }

        let shard = shard_of(key, self.shard_count);
        let owner = self.oracle.owner_of(shard)?;
        if owner != self.oracle.local_node() {
            return Err(RegistryError::NotOwner { shard, owner });
        }

        // Fast path: already live.
        {
            let entities = self.entities.read().await;
            if let Some(handle) = entities.get(key) {
                if !handle.join.is_finished() {
                    return Ok(EntityRef::new(Arc::from(key), handle.tx.clone()));
                }
            }
        }

        let mut entities = self.entities.write().await;
        // Double-check under the write lock; another resolve may have won.
        if let Some(handle) = entities.get(key) {
            if !handle.join.is_finished() {
                return Ok(EntityRef::new(Arc::from(key), handle.tx.clone()));
            }
            // A finished supervisor (panic) leaves a dead handle; replace it.
            entities.remove(key);
        }

        let (tx, rx) = mpsc::channel(self.mailbox_capacity);
        let cancel = self.runtime_token.child_token();
        let supervisor = EntitySupervisor {
            key: Arc::from(key),
            journal: Arc::clone(&self.journal),
            bus: self.bus.clone(),
            params: self.params,
            backoff: self.backoff,
        };
        let join = tokio::spawn(supervisor.run(rx, cancel.clone()));

        entities.insert(
            key.to_string(),
            Handle {
                shard,
                tx: tx.clone(),
                cancel,
                join,
            },
        );

        Ok(EntityRef::new(Arc::from(key), tx))
    }

    /// Deliberately stops the entity for `key` and forgets its handle.
    ///
    /// Returns false when no instance was live. The entity is recreated
    /// (through recovery) on the next resolve.
    pub async fn passivate(&self, key: &str) -> bool {
        let handle = {
            let mut entities = self.entities.write().await;
            entities.remove(key)
        };
        match handle {
            Some(handle) => {
                Self::stop_and_join(key, handle).await;
                true
            }
            None => false,
        }
    }

    /// Sorted keys of currently live entities.
    pub async fn live_keys(&self) -> Vec<String> {
        let entities = self.entities.read().await;
        let mut keys: Vec<String> = entities.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Cancels every live entity and joins them: the shutdown path.
    ///
    /// Handles are forgotten only after their supervisor joined, so if this
    /// future is abandoned at a grace deadline, [`ShardRegistry::live_keys`]
    /// still names the entities that did not stop in time.
    pub async fn cancel_all(&self) {
        {
            let entities = self.entities.read().await;
            for handle in entities.values() {
                handle.cancel.cancel();
            }
        }

        loop {
            let entry = {
                let mut entities = self.entities.write().await;
                let key = entities.keys().next().cloned();
                key.and_then(|k| entities.remove_entry(&k))
            };
            match entry {
                Some((key, handle)) => Self::join_quietly(&key, handle.join).await,
                None => break,
            }
        }
    }

    /// Evicts entities whose shard is no longer owned locally.
    async fn evict_moved(&self) {
        let local = self.oracle.local_node();
        let moved: Vec<(String, Handle)> = {
            let mut entities = self.entities.write().await;
            let gone: Vec<String> = entities
                .iter()
                .filter(|(_, handle)| {
                    // When ownership cannot be confirmed, err on the side of
                    // eviction; one-instance-per-key outranks availability.
                    !matches!(self.oracle.owner_of(handle.shard), Ok(ref o) if *o == local)
                })
                .map(|(key, _)| key.clone())
                .collect();
            gone.into_iter()
                .filter_map(|key| entities.remove_entry(&key))
                .collect()
        };

        for (key, handle) in moved {
            let shard = handle.shard;
            Self::stop_and_join(&key, handle).await;
            self.bus.publish(
                Event::new(EventKind::EntityEvicted)
                    .with_key(key.as_str())
                    .with_shard(shard),
            );
        }
    }

    async fn stop_and_join(key: &str, handle: Handle) {
        handle.cancel.cancel();
        Self::join_quietly(key, handle.join).await;
    }

    async fn join_quietly(key: &str, join: JoinHandle<()>) {
        if let Err(err) = join.await {
            tracing::warn!(key, ?err, "entity supervisor terminated abnormally");
        }
    }
}
