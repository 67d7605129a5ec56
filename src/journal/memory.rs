//! In-memory journal.
//!
//! [`MemoryJournal`] is the development and test backend for the [`Journal`]
//! contract. Payloads are stored in their serialized form and decoded on
//! read, so anything that would fail against a real backend (an event type
//! that does not round-trip) fails here too.
//!
//! Partitions are per key: the outer map lock is held only long enough to
//! look up or create a key's partition, after which all work happens under
//! that partition's own lock. Appends for different keys never contend.
//!
//! For failure-path tests, [`MemoryJournal::fail_writes`] makes subsequent
//! appends and snapshot writes fail with a transient I/O error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::device::{DeviceEvent, State};
use crate::error::JournalError;
use crate::journal::{Journal, SequenceNr, Snapshot};

#[derive(Default)]
struct Partition {
    /// Events in append order; `events[i]` has sequence number `i + 1`.
    events: Vec<serde_json::Value>,
    /// Snapshots in write order (oldest first).
    snapshots: Vec<(SequenceNr, serde_json::Value)>,
}

/// In-memory, per-key-partitioned journal.
#[derive(Default)]
pub struct MemoryJournal {
    partitions: Mutex<HashMap<String, Arc<Mutex<Partition>>>>,
    fail_writes: AtomicBool,
}

impl MemoryJournal {
    /// Creates an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// When `fail` is true, subsequent appends and snapshot writes fail with
    /// a transient I/O error. Reads are unaffected.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Decoded events currently stored for `key`, in order.
    pub fn events(&self, key: &str) -> Vec<DeviceEvent> {
        let part = self.partition(key);
        let part = part.lock().expect("partition lock");
        part.events
            .iter()
            .map(|v| serde_json::from_value(v.clone()).expect("stored event decodes"))
            .collect()
    }

    /// Number of events currently stored for `key`.
    pub fn event_count(&self, key: &str) -> usize {
        self.partition(key).lock().expect("partition lock").events.len()
    }

    /// Sequence numbers of the snapshots currently reachable for `key`,
    /// oldest first.
    pub fn snapshot_sequence_nrs(&self, key: &str) -> Vec<SequenceNr> {
        self.partition(key)
            .lock()
            .expect("partition lock")
            .snapshots
            .iter()
            .map(|(nr, _)| *nr)
            .collect()
    }

    fn partition(&self, key: &str) -> Arc<Mutex<Partition>> {
        let mut map = self.partitions.lock().expect("partitions lock");
        Arc::clone(map.entry(key.to_string()).or_default())
    }

    fn check_writable(&self) -> Result<(), JournalError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(JournalError::Io {
                reason: "injected write failure".to_string(),
            });
        }
        Ok(())
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, JournalError> {
    serde_json::to_value(value).map_err(|e| JournalError::Codec {
        reason: e.to_string(),
    })
}

fn decode<T: serde::de::DeserializeOwned>(value: &serde_json::Value) -> Result<T, JournalError> {
    serde_json::from_value(value.clone()).map_err(|e| JournalError::Codec {
        reason: e.to_string(),
    })
}

#[async_trait]
impl Journal for MemoryJournal {
    async fn append(
        &self,
        key: &str,
        sequence_nr: SequenceNr,
        event: &DeviceEvent,
    ) -> Result<(), JournalError> {
        self.check_writable()?;
        let payload = encode(event)?;

        let part = self.partition(key);
        let mut part = part.lock().expect("partition lock");
        let expected = part.events.len() as SequenceNr + 1;
        if sequence_nr != expected {
            return Err(JournalError::SequenceConflict {
                key: key.to_string(),
                expected,
                got: sequence_nr,
            });
        }
        part.events.push(payload);
        Ok(())
    }

    async fn read_from(
        &self,
        key: &str,
        after: SequenceNr,
    ) -> Result<Vec<DeviceEvent>, JournalError> {
        let part = self.partition(key);
        let part = part.lock().expect("partition lock");
        part.events
            .iter()
            .skip(after as usize)
            .map(decode)
            .collect()
    }

    async fn write_snapshot(
        &self,
        key: &str,
        sequence_nr: SequenceNr,
        state: State,
    ) -> Result<(), JournalError> {
        self.check_writable()?;
        let payload = encode(&state)?;

        let part = self.partition(key);
        let mut part = part.lock().expect("partition lock");
        part.snapshots.push((sequence_nr, payload));
        Ok(())
    }

    async fn latest_snapshot(&self, key: &str) -> Result<Option<Snapshot>, JournalError> {
        let part = self.partition(key);
        let part = part.lock().expect("partition lock");
        match part.snapshots.last() {
            None => Ok(None),
            Some((nr, payload)) => Ok(Some(Snapshot {
                sequence_nr: *nr,
                state: decode(payload)?,
            })),
        }
    }

    async fn prune_snapshots(&self, key: &str, keep: usize) -> Result<(), JournalError> {
        let part = self.partition(key);
        let mut part = part.lock().expect("partition lock");
        let len = part.snapshots.len();
        if len > keep {
            part.snapshots.drain(..len - keep);
        }
        Ok(())
    }
}
