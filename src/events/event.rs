//! Runtime events emitted by entities, supervisors, and the registry.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Entity lifecycle**: recovery attempts, durable appends, snapshots
//! - **Supervision**: restart scheduling after failures
//! - **Routing**: membership changes and shard eviction
//! - **Node shutdown**: signal handling and grace accounting
//!
//! ## Ordering guarantees
//! Each event carries a globally unique sequence number (`seq`) that
//! increases monotonically; use it to restore order when events are
//! observed out of order across subscribers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Entity lifecycle ===
    /// An entity instance is starting a recovery attempt.
    ///
    /// Sets: `key`, `attempt`.
    EntityStarting,

    /// Recovery finished; state was rebuilt from snapshot + replay.
    ///
    /// Sets: `key`, `sequence_nr` (highest replayed).
    EntityRecovered,

    /// A domain event was durably appended.
    ///
    /// Sets: `key`, `sequence_nr`.
    EventPersisted,

    /// A snapshot was written and older snapshots pruned.
    ///
    /// Sets: `key`, `sequence_nr`.
    SnapshotWritten,

    /// A durable append or snapshot write failed; the instance terminates.
    ///
    /// Sets: `key`, `reason`.
    PersistFailed,

    /// A `Running` device emitted its periodic heartbeat signal.
    ///
    /// Downstream delivery of the signal is an external collaborator; the
    /// bus record is the observable effect.
    ///
    /// Sets: `key`.
    HeartbeatEmitted,

    /// An entity stopped cleanly (passivation, eviction, or shutdown).
    ///
    /// Sets: `key`, optional `reason`.
    EntityStopped,

    // === Supervision ===
    /// A restart was scheduled after an instance failure.
    ///
    /// Sets: `key`, `attempt`, `delay_ms`, `reason`.
    BackoffScheduled,

    // === Routing ===
    /// The membership oracle reported a new epoch.
    ///
    /// Sets: nothing beyond `seq`/`at`.
    MembershipChanged,

    /// A live entity was evicted because its shard moved to another node.
    ///
    /// Sets: `key`, `shard`.
    EntityEvicted,

    // === Node shutdown ===
    /// Shutdown requested (OS signal observed).
    ShutdownRequested,

    /// All entities stopped within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some entities did not stop in time.
    GraceExceeded,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Entity key, if applicable.
    pub key: Option<Arc<str>>,
    /// Shard the key hashes into, where relevant.
    pub shard: Option<u32>,
    /// Journal sequence number, for persistence-related kinds.
    pub sequence_nr: Option<u64>,
    /// Recovery attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Backoff delay before the next attempt, in milliseconds.
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors, eviction cause, ...).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// the next global sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            key: None,
            shard: None,
            sequence_nr: None,
            attempt: None,
            delay_ms: None,
            reason: None,
        }
    }

    /// Attaches an entity key.
    #[inline]
    pub fn with_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Attaches a shard id.
    #[inline]
    pub fn with_shard(mut self, shard: u32) -> Self {
        self.shard = Some(shard);
        self
    }

    /// Attaches a journal sequence number.
    #[inline]
    pub fn with_sequence_nr(mut self, nr: u64) -> Self {
        self.sequence_nr = Some(nr);
        self
    }

    /// Attaches a recovery attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::EntityStarting);
        let b = Event::new(EventKind::EntityStarting);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_builders_attach_metadata() {
        let ev = Event::new(EventKind::BackoffScheduled)
            .with_key("dev-7")
            .with_attempt(3)
            .with_delay(Duration::from_millis(800))
            .with_reason("journal i/o failure: disk full");

        assert_eq!(ev.key.as_deref(), Some("dev-7"));
        assert_eq!(ev.attempt, Some(3));
        assert_eq!(ev.delay_ms, Some(800));
        assert!(ev.reason.as_deref().unwrap().contains("disk full"));
    }

    #[test]
    fn test_delay_saturates_at_u32_max() {
        let ev = Event::new(EventKind::BackoffScheduled).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }
}
