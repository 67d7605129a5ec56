//! Global runtime configuration.
//!
//! [`Config`] centralizes the tunables consumed by the entity runtime:
//! ask timeout, snapshot cadence, restart backoff, heartbeat interval,
//! shard count, and channel capacities.
//!
//! ## Sentinel values
//! - `snapshot_every = 0` → snapshotting disabled
//! - `shard_count` is clamped to a minimum of 1 by accessors

use std::time::Duration;

use crate::policies::{BackoffPolicy, JitterPolicy};

/// Configuration for a devicehub node.
///
/// All fields are public; prefer the accessors where sentinel handling
/// matters so the `0` checks stay in one place.
#[derive(Clone, Debug)]
pub struct Config {
    /// How long the gateway waits for an entity's durable reply.
    ///
    /// Timing out releases the caller only; the entity-side command keeps
    /// running to completion.
    pub ask_timeout: Duration,

    /// Interval between heartbeat ticks of a `Running` device.
    pub heartbeat_interval: Duration,

    /// Write a snapshot after every this many persisted events.
    ///
    /// `0` disables snapshotting; recovery then replays the full log.
    pub snapshot_every: u64,

    /// Number of most-recent snapshots retained per key.
    ///
    /// Older snapshots are pruned from the recovery path after each write.
    pub snapshot_keep: usize,

    /// Restart backoff applied by each per-entity supervisor.
    pub backoff: BackoffPolicy,

    /// Fixed number of shards keys are hashed into.
    ///
    /// Must be identical on every node of a cluster; changing it reshuffles
    /// key placement.
    pub shard_count: u32,

    /// Capacity of each entity's inbound command mailbox.
    pub mailbox_capacity: usize,

    /// Capacity of the runtime event bus ring buffer.
    ///
    /// Slow subscribers lagging behind more than this many events observe
    /// `Lagged` and skip older items.
    pub bus_capacity: usize,

    /// Maximum wait for entities to stop during shutdown before the node
    /// reports `GraceExceeded`.
    pub grace: Duration,
}

impl Config {
    /// Returns the snapshot cadence as an `Option`.
    ///
    /// - `None` → snapshotting disabled
    /// - `Some(n)` → snapshot after every `n` persisted events
    #[inline]
    pub fn snapshot_interval(&self) -> Option<u64> {
        if self.snapshot_every == 0 {
            None
        } else {
            Some(self.snapshot_every)
        }
    }

    /// Returns the shard count clamped to a minimum of 1.
    #[inline]
    pub fn shard_count_clamped(&self) -> u32 {
        self.shard_count.max(1)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `ask_timeout = 3s`
    /// - `heartbeat_interval = 10s`
    /// - `snapshot_every = 5`, `snapshot_keep = 3`
    /// - `backoff = 200ms × 2.0 capped at 5s, ±10% jitter`
    /// - `shard_count = 64`
    /// - `mailbox_capacity = 64`, `bus_capacity = 1024`
    /// - `grace = 30s`
    fn default() -> Self {
        Self {
            ask_timeout: Duration::from_secs(3),
            heartbeat_interval: Duration::from_secs(10),
            snapshot_every: 5,
            snapshot_keep: 3,
            backoff: BackoffPolicy {
                first: Duration::from_millis(200),
                max: Duration::from_secs(5),
                factor: 2.0,
                jitter: JitterPolicy::Proportional { factor: 0.1 },
            },
            shard_count: 64,
            mailbox_capacity: 64,
            bus_capacity: 1024,
            grace: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_interval_sentinel() {
        let mut cfg = Config::default();
        assert_eq!(cfg.snapshot_interval(), Some(5));

        cfg.snapshot_every = 0;
        assert_eq!(cfg.snapshot_interval(), None);
    }

    #[test]
    fn test_clamped_accessors() {
        let mut cfg = Config::default();
        cfg.shard_count = 0;
        cfg.bus_capacity = 0;
        assert_eq!(cfg.shard_count_clamped(), 1);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
