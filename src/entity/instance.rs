//! Entity instance: the single-threaded incarnation of one device.
//!
//! One instance owns one [`State`], one inbound mailbox, and one
//! monotonically increasing event-sequence counter. Its life is a loop:
//!
//! ```text
//! recover (snapshot + suffix replay)
//!   └─► synthetic Tick if recovered Running
//! loop {
//!   ├─► next mailbox envelope, heartbeat deadline, or cancellation
//!   ├─► transition(state, command)
//!   │     ├─ None            → nothing
//!   │     ├─ Reply           → fulfill reply slot now
//!   │     └─ Persist         → append ─► apply ─► maybe snapshot ─► reply
//!   └─► re-arm heartbeat while Running
//! }
//! ```
//!
//! ## Rules
//! - Commands are processed **strictly one at a time**; the next envelope is
//!   not taken until the current one's durable effects are complete.
//! - **Persist-then-reply**: the reply slot is fulfilled only after the
//!   append (and any snapshot write) returned success, never before.
//! - On a persistence failure the in-memory state is **not** mutated; the
//!   instance returns an error so its supervisor can restart it, and the
//!   in-flight caller's reply slot is dropped unfulfilled.
//! - The heartbeat is one re-armed timer slot: armed while `Running`, left
//!   to lapse as a no-op after a transition to `Idle`, re-armed exactly once
//!   after recovery via the synthetic `Tick`.

use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, Sleep};
use tokio_util::sync::CancellationToken;

use crate::device::{apply, transition, CommandKind, Effect, State};
use crate::entity::{Envelope, EntityParams};
use crate::error::{EntityError, JournalError};
use crate::events::{Bus, Event, EventKind};
use crate::journal::{JournalRef, SequenceNr};

/// Live incarnation of one device key.
pub(crate) struct EntityInstance {
    key: Arc<str>,
    state: State,
    sequence_nr: SequenceNr,
    journal: JournalRef,
    bus: Bus,
    params: EntityParams,
}

impl EntityInstance {
    /// Rebuilds an instance from its journal: latest snapshot (if any), then
    /// replay of the event suffix. Replay runs only [`apply`]; no command
    /// side effects are repeated.
    pub(crate) async fn recover(
        key: Arc<str>,
        journal: JournalRef,
        bus: Bus,
        params: EntityParams,
    ) -> Result<Self, EntityError> {
        let snapshot = journal
            .latest_snapshot(&key)
            .await
            .map_err(EntityError::Recovery)?;
        let (mut state, mut sequence_nr) = match snapshot {
            Some(s) => (s.state, s.sequence_nr),
            None => (State::default(), 0),
        };

        let suffix = journal
            .read_from(&key, sequence_nr)
            .await
            .map_err(EntityError::Recovery)?;
        for event in &suffix {
            state = apply(state, event);
            sequence_nr += 1;
        }

        bus.publish(
            Event::new(EventKind::EntityRecovered)
                .with_key(Arc::clone(&key))
                .with_sequence_nr(sequence_nr),
        );

        Ok(Self {
            key,
            state,
            sequence_nr,
            journal,
            bus,
            params,
        })
    }

    /// Runs the command loop until cancellation or mailbox close (clean
    /// exit) or a persistence failure (supervised restart).
    pub(crate) async fn run(
        mut self,
        rx: &mut mpsc::Receiver<Envelope>,
        token: &CancellationToken,
    ) -> Result<(), EntityError> {
        let heartbeat = time::sleep(time::Duration::ZERO);
        tokio::pin!(heartbeat);
        let mut armed = false;

        // Synthetic tick: a device recovered as Running resumes its
        // heartbeat without waiting for an external command.
        if self.state == State::Running {
            self.tick(&mut armed, heartbeat.as_mut());
        }

        loop {
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                maybe = rx.recv() => match maybe {
                    Some(envelope) => {
                        self.handle(envelope, &mut armed, heartbeat.as_mut()).await?;
                    }
                    // Mailbox closed: the registry dropped this entity.
                    None => return Ok(()),
                },
                _ = heartbeat.as_mut(), if armed => {
                    armed = false;
                    self.tick(&mut armed, heartbeat.as_mut());
                }
            }
        }
    }

    /// Processes one envelope to completion, durable effects included.
    async fn handle(
        &mut self,
        envelope: Envelope,
        armed: &mut bool,
        heartbeat: Pin<&mut Sleep>,
    ) -> Result<(), EntityError> {
        if envelope.kind == CommandKind::Tick {
            self.tick(armed, heartbeat);
            return Ok(());
        }

        match transition(&self.key, self.state, envelope.kind) {
            Effect::None => {}
            Effect::Reply { reply } => {
                if let Some(slot) = envelope.reply {
                    let _ = slot.send(reply);
                }
            }
            Effect::Persist { event, reply } => {
                let next = self.sequence_nr + 1;
                self.journal
                    .append(&self.key, next, &event)
                    .await
                    .map_err(|e| self.persist_failed(e))?;

                self.state = apply(self.state, &event);
                self.sequence_nr = next;
                self.bus.publish(
                    Event::new(EventKind::EventPersisted)
                        .with_key(Arc::clone(&self.key))
                        .with_sequence_nr(next),
                );

                self.maybe_snapshot().await?;

                if let Some(slot) = envelope.reply {
                    let _ = slot.send(reply);
                }

                // A device that just started begins heartbeating at once.
                if self.state == State::Running {
                    self.tick(armed, heartbeat);
                }
            }
        }
        Ok(())
    }

    /// Heartbeat tick: emit the signal and re-arm while `Running`; lapse
    /// while `Idle`.
    fn tick(&self, armed: &mut bool, heartbeat: Pin<&mut Sleep>) {
        if self.state == State::Running {
            self.bus
                .publish(Event::new(EventKind::HeartbeatEmitted).with_key(Arc::clone(&self.key)));
            heartbeat.reset(Instant::now() + self.params.heartbeat_interval);
            *armed = true;
        } else {
            *armed = false;
        }
    }

    /// Writes a snapshot after every configured number of persisted events
    /// and prunes the recovery path to the retained count.
    async fn maybe_snapshot(&self) -> Result<(), EntityError> {
        let Some(every) = self.params.snapshot_every else {
            return Ok(());
        };
        if self.sequence_nr % every != 0 {
            return Ok(());
        }

        self.journal
            .write_snapshot(&self.key, self.sequence_nr, self.state)
            .await
            .map_err(|e| self.persist_failed(e))?;
        self.journal
            .prune_snapshots(&self.key, self.params.snapshot_keep)
            .await
            .map_err(|e| self.persist_failed(e))?;

        self.bus.publish(
            Event::new(EventKind::SnapshotWritten)
                .with_key(Arc::clone(&self.key))
                .with_sequence_nr(self.sequence_nr),
        );
        Ok(())
    }

    fn persist_failed(&self, err: JournalError) -> EntityError {
        self.bus.publish(
            Event::new(EventKind::PersistFailed)
                .with_key(Arc::clone(&self.key))
                .with_reason(err.to_string()),
        );
        EntityError::Persist(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceEvent;
    use crate::journal::{Journal, MemoryJournal};
    use std::time::Duration;

    fn test_params() -> EntityParams {
        EntityParams {
            heartbeat_interval: Duration::from_millis(50),
            snapshot_every: Some(5),
            snapshot_keep: 3,
        }
    }

    async fn recovered(journal: &Arc<MemoryJournal>, key: &str) -> EntityInstance {
        EntityInstance::recover(
            Arc::from(key),
            Arc::clone(journal) as JournalRef,
            Bus::new(64),
            test_params(),
        )
        .await
        .expect("recovery")
    }

    #[tokio::test]
    async fn test_recover_from_empty_journal_is_idle() {
        let journal = Arc::new(MemoryJournal::new());
        let instance = recovered(&journal, "37").await;
        assert_eq!(instance.state, State::Idle);
        assert_eq!(instance.sequence_nr, 0);
    }

    #[tokio::test]
    async fn test_recover_replays_full_log() {
        let journal = Arc::new(MemoryJournal::new());
        journal
            .append("37", 1, &DeviceEvent::Started { device: "37".into() })
            .await
            .unwrap();
        journal
            .append("37", 2, &DeviceEvent::Stopped { device: "37".into() })
            .await
            .unwrap();
        journal
            .append("37", 3, &DeviceEvent::Started { device: "37".into() })
            .await
            .unwrap();

        let instance = recovered(&journal, "37").await;
        assert_eq!(instance.state, State::Running);
        assert_eq!(instance.sequence_nr, 3);
    }

    #[tokio::test]
    async fn test_recover_short_circuits_from_snapshot() {
        let journal = Arc::new(MemoryJournal::new());
        // Events 1..=2 are superseded by the snapshot at 2; only the suffix
        // at 3 is replayed.
        journal
            .append("37", 1, &DeviceEvent::Started { device: "37".into() })
            .await
            .unwrap();
        journal
            .append("37", 2, &DeviceEvent::Stopped { device: "37".into() })
            .await
            .unwrap();
        journal.write_snapshot("37", 2, State::Idle).await.unwrap();
        journal
            .append("37", 3, &DeviceEvent::Started { device: "37".into() })
            .await
            .unwrap();

        let instance = recovered(&journal, "37").await;
        assert_eq!(instance.state, State::Running);
        assert_eq!(instance.sequence_nr, 3);
    }

    #[tokio::test]
    async fn test_persist_then_reply_ordering_on_failure() {
        let journal = Arc::new(MemoryJournal::new());
        let instance = recovered(&journal, "37").await;
        let (tx, mut rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        let run_token = token.clone();

        journal.fail_writes(true);
        let handle = tokio::spawn(async move { instance.run(&mut rx, &run_token).await });

        let (envelope, reply_rx) = Envelope::ask(CommandKind::Start);
        tx.send(envelope).await.unwrap();

        // The instance dies with a persistence error, no reply, no event.
        let res = handle.await.unwrap();
        assert!(matches!(res, Err(EntityError::Persist(_))));
        assert!(reply_rx.await.is_err(), "reply slot must be dropped");
        assert_eq!(journal.event_count("37"), 0);
    }

    #[tokio::test]
    async fn test_recovered_running_device_resumes_heartbeat() {
        let journal = Arc::new(MemoryJournal::new());
        journal
            .append("37", 1, &DeviceEvent::Started { device: "37".into() })
            .await
            .unwrap();

        let bus = Bus::new(64);
        let mut events = bus.subscribe();
        let instance = EntityInstance::recover(
            Arc::from("37"),
            Arc::clone(&journal) as JournalRef,
            bus.clone(),
            test_params(),
        )
        .await
        .unwrap();

        let (_tx, mut rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        let run_token = token.clone();
        let handle = tokio::spawn(async move { instance.run(&mut rx, &run_token).await });

        // No external command is issued; the synthetic tick must emit.
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let ev = tokio::time::timeout_at(deadline, events.recv())
                .await
                .expect("heartbeat before deadline")
                .expect("bus open");
            if ev.kind == EventKind::HeartbeatEmitted {
                break;
            }
        }

        token.cancel();
        handle.await.unwrap().unwrap();
    }
}
