//! Per-entity supervisor: restart-forever with backoff.
//!
//! One supervisor owns one entity's lifecycle. It recreates the instance
//! (through full recovery) after every failure, preserving the key binding,
//! and keeps the mailbox alive across restarts so commands queued during a
//! backoff window are processed by the next incarnation.
//!
//! ```text
//! loop {
//!   ├─► publish EntityStarting{ key, attempt }
//!   ├─► EntityInstance::recover(key) ─► instance.run(mailbox, token)
//!   │       │
//!   │       ├─ Ok  (cancelled / mailbox closed) ─► EntityStopped, exit
//!   │       └─ Err (persistence failure) ─►
//!   │            ├─► delay = backoff.next(attempt)
//!   │            ├─► publish BackoffScheduled{ key, delay, attempt }
//!   │            └─► sleep(delay) (cancellable), continue
//! }
//! ```
//!
//! Restarts are unbounded: the key is meaningful indefinitely, so there is
//! no attempt cap after which the entity would be abandoned.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::entity::instance::EntityInstance;
use crate::entity::{Envelope, EntityParams};
use crate::events::{Bus, Event, EventKind};
use crate::journal::JournalRef;
use crate::policies::BackoffPolicy;

/// Supervises one entity key: recover, run, back off, repeat.
pub(crate) struct EntitySupervisor {
    pub key: Arc<str>,
    pub journal: JournalRef,
    pub bus: Bus,
    pub params: EntityParams,
    pub backoff: BackoffPolicy,
}

impl EntitySupervisor {
    /// Runs until cancellation or mailbox close. Failures never escape; they
    /// are answered with a delayed restart.
    pub(crate) async fn run(self, mut rx: mpsc::Receiver<Envelope>, token: CancellationToken) {
        let mut attempt: u32 = 0;

        loop {
            if token.is_cancelled() {
                break;
            }

            self.bus.publish(
                Event::new(EventKind::EntityStarting)
                    .with_key(Arc::clone(&self.key))
                    .with_attempt(attempt + 1),
            );

            let result = async {
                let instance = EntityInstance::recover(
                    Arc::clone(&self.key),
                    Arc::clone(&self.journal),
                    self.bus.clone(),
                    self.params,
                )
                .await?;
                instance.run(&mut rx, &token).await
            }
            .await;

            match result {
                Ok(()) => {
                    self.bus.publish(
                        Event::new(EventKind::EntityStopped).with_key(Arc::clone(&self.key)),
                    );
                    break;
                }
                Err(err) => {
                    let delay = self.backoff.next(attempt);
                    attempt = attempt.saturating_add(1);

                    self.bus.publish(
                        Event::new(EventKind::BackoffScheduled)
                            .with_key(Arc::clone(&self.key))
                            .with_attempt(attempt)
                            .with_delay(delay)
                            .with_reason(err.to_string()),
                    );

                    let sleep = time::sleep(delay);
                    tokio::pin!(sleep);
                    tokio::select! {
                        _ = &mut sleep => {}
                        _ = token.cancelled() => break,
                    }
                }
            }
        }
    }
}
