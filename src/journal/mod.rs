//! Event-log collaborator contract.
//!
//! The [`Journal`] trait is the seam between the entity runtime and stable
//! storage: an append-only, per-key ordered sequence of [`DeviceEvent`]s plus
//! periodic full-state snapshots. The runtime depends only on this contract;
//! codecs and backends live behind it.
//!
//! ## Contract
//! - `append` takes a strictly increasing `sequence_nr` per key (`last + 1`,
//!   starting at 1) and must reject anything else.
//! - `read_from(key, after)` returns the ordered suffix of events with
//!   sequence numbers greater than `after`.
//! - Snapshots are tagged with the sequence number at which they were taken;
//!   `prune_snapshots` trims the recovery path to the newest `keep`.
//! - Appends for different keys must not block each other; appends for one
//!   key are already serialized by its single-writer entity.

mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::device::{DeviceEvent, State};
use crate::error::JournalError;

pub use memory::MemoryJournal;

/// Per-key, strictly increasing event sequence number. The first event of a
/// key has sequence number 1.
pub type SequenceNr = u64;

/// Captured copy of a device's state, tagged with the event-sequence offset
/// at which it was taken. Bounds replay cost on recovery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Snapshot {
    /// Sequence number of the last event folded into `state`.
    pub sequence_nr: SequenceNr,
    /// The captured state.
    pub state: State,
}

/// Append-only event log with snapshot support.
///
/// Implementations must be safe for concurrent use from many entities; each
/// entity only ever touches its own key.
#[async_trait]
pub trait Journal: Send + Sync + 'static {
    /// Durably appends one event for `key` at `sequence_nr`.
    ///
    /// `sequence_nr` must be exactly one past the key's last appended number
    /// (1 for an empty partition); anything else fails with
    /// [`JournalError::SequenceConflict`].
    async fn append(
        &self,
        key: &str,
        sequence_nr: SequenceNr,
        event: &DeviceEvent,
    ) -> Result<(), JournalError>;

    /// Reads the ordered events of `key` with sequence numbers greater than
    /// `after`. An unknown key yields an empty sequence.
    async fn read_from(
        &self,
        key: &str,
        after: SequenceNr,
    ) -> Result<Vec<DeviceEvent>, JournalError>;

    /// Writes a snapshot of `state` taken at `sequence_nr`.
    async fn write_snapshot(
        &self,
        key: &str,
        sequence_nr: SequenceNr,
        state: State,
    ) -> Result<(), JournalError>;

    /// Returns the most recent snapshot for `key`, if any.
    async fn latest_snapshot(&self, key: &str) -> Result<Option<Snapshot>, JournalError>;

    /// Discards all but the newest `keep` snapshots from the recovery path.
    async fn prune_snapshots(&self, key: &str, keep: usize) -> Result<(), JournalError>;
}

/// Shared handle to a journal implementation.
pub type JournalRef = Arc<dyn Journal>;
