//! Command envelopes and the entity mailbox handle.
//!
//! A caller that expects an answer creates an [`Envelope`] with a one-shot
//! reply slot; the entity fulfills the slot exactly once, after any durable
//! effect of the command has completed. Fire-and-forget commands (the
//! heartbeat `Tick`) travel in an envelope without a slot.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::device::{CommandKind, Reply};

/// One command in flight to an entity.
#[derive(Debug)]
pub struct Envelope {
    /// The command to run.
    pub kind: CommandKind,
    /// Reply slot, present for request-response commands.
    ///
    /// Dropped unfulfilled when the command produces no reply (persistence
    /// failure, instance restart); the caller observes that as a timeout.
    pub reply: Option<oneshot::Sender<Reply>>,
}

impl Envelope {
    /// Builds a request-response envelope and the receiver for its reply.
    pub fn ask(kind: CommandKind) -> (Self, oneshot::Receiver<Reply>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                kind,
                reply: Some(tx),
            },
            rx,
        )
    }

    /// Builds a fire-and-forget envelope.
    pub fn tell(kind: CommandKind) -> Self {
        Self { kind, reply: None }
    }
}

/// Location-transparent handle to one live entity's mailbox.
///
/// Cheap to clone; all clones feed the same single-threaded command queue,
/// so commands sent through any clone are processed strictly one at a time
/// in arrival order.
#[derive(Clone, Debug)]
pub struct EntityRef {
    key: Arc<str>,
    tx: mpsc::Sender<Envelope>,
}

impl EntityRef {
    pub(crate) fn new(key: Arc<str>, tx: mpsc::Sender<Envelope>) -> Self {
        Self { key, tx }
    }

    /// Key of the entity this handle addresses.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Enqueues an envelope, waiting for mailbox capacity.
    ///
    /// Fails only when the entity is gone for good (passivated, evicted, or
    /// shut down) and its mailbox has been closed.
    pub async fn send(&self, envelope: Envelope) -> Result<(), Envelope> {
        self.tx.send(envelope).await.map_err(|e| e.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_envelope_carries_reply_slot() {
        let (env, mut rx) = Envelope::ask(CommandKind::Start);
        assert_eq!(env.kind, CommandKind::Start);
        env.reply.expect("slot").send(Reply::Started).unwrap();
        assert_eq!(rx.try_recv().unwrap(), Reply::Started);
    }

    #[test]
    fn test_dropped_slot_closes_receiver() {
        let (env, mut rx) = Envelope::ask(CommandKind::Stop);
        drop(env);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_tell_has_no_slot() {
        assert!(Envelope::tell(CommandKind::Tick).reply.is_none());
    }
}
