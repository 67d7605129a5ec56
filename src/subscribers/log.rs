//! Logging subscriber.
//!
//! [`LogWriter`] renders runtime events through `tracing` in a compact
//! key=value form.
//!
//! ## Example output
//! ```text
//! [starting] key=dev-37 attempt=1
//! [recovered] key=dev-37 sequence_nr=12
//! [persisted] key=dev-37 sequence_nr=13
//! [heartbeat] key=dev-37
//! [backoff] key=dev-37 delay_ms=400 attempt=2 reason="journal i/o failure"
//! [shutdown-requested]
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event-to-log subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Constructs a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    fn name(&self) -> &'static str {
        "log-writer"
    }

    async fn on_event(&self, e: &Event) {
        let key = e.key.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::EntityStarting => {
                tracing::info!(key, attempt = e.attempt, "[starting]");
            }
            EventKind::EntityRecovered => {
                tracing::info!(key, sequence_nr = e.sequence_nr, "[recovered]");
            }
            EventKind::EventPersisted => {
                tracing::debug!(key, sequence_nr = e.sequence_nr, "[persisted]");
            }
            EventKind::SnapshotWritten => {
                tracing::info!(key, sequence_nr = e.sequence_nr, "[snapshot]");
            }
            EventKind::PersistFailed => {
                tracing::error!(key, reason = e.reason.as_deref(), "[persist-failed]");
            }
            EventKind::HeartbeatEmitted => {
                tracing::info!(key, "[heartbeat]");
            }
            EventKind::EntityStopped => {
                tracing::info!(key, reason = e.reason.as_deref(), "[stopped]");
            }
            EventKind::BackoffScheduled => {
                tracing::warn!(
                    key,
                    delay_ms = e.delay_ms,
                    attempt = e.attempt,
                    reason = e.reason.as_deref(),
                    "[backoff]"
                );
            }
            EventKind::MembershipChanged => {
                tracing::info!("[membership-changed]");
            }
            EventKind::EntityEvicted => {
                tracing::info!(key, shard = e.shard, "[evicted]");
            }
            EventKind::ShutdownRequested => {
                tracing::info!("[shutdown-requested]");
            }
            EventKind::AllStoppedWithin => {
                tracing::info!("[all-stopped-within-grace]");
            }
            EventKind::GraceExceeded => {
                tracing::error!("[grace-exceeded]");
            }
        }
    }
}
