//! Error types used across the devicehub runtime.
//!
//! Each layer owns one enum:
//!
//! - [`JournalError`] — durable-append / snapshot / replay failures.
//! - [`EntityError`] — failures that terminate an entity instance.
//! - [`RegistryError`] — key resolution and shard-ownership failures.
//! - [`GatewayError`] — the only errors a caller of the ask surface sees.
//! - [`RuntimeError`] — failures of the node runtime itself.
//!
//! All enums provide `as_label()` returning a short stable snake_case tag
//! for logs and metrics.

use std::time::Duration;
use thiserror::Error;

use crate::registry::{NodeId, ShardId};

/// Errors raised by the event-log collaborator.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum JournalError {
    /// Append carried a sequence number that is not `last + 1` for the key.
    ///
    /// This indicates a writer bug or a second live writer for the same key,
    /// never a transient condition.
    #[error("sequence conflict for key {key:?}: expected {expected}, got {got}")]
    SequenceConflict {
        /// Entity key whose partition rejected the append.
        key: String,
        /// The sequence number the partition would accept next.
        expected: u64,
        /// The sequence number that was offered.
        got: u64,
    },

    /// Storage I/O failed; the operation may succeed if retried later.
    #[error("journal i/o failure: {reason}")]
    Io {
        /// Backend-specific description.
        reason: String,
    },

    /// A persisted payload could not be decoded during replay.
    #[error("journal codec failure: {reason}")]
    Codec {
        /// Decoder-specific description.
        reason: String,
    },
}

impl JournalError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            JournalError::SequenceConflict { .. } => "journal_sequence_conflict",
            JournalError::Io { .. } => "journal_io",
            JournalError::Codec { .. } => "journal_codec",
        }
    }

    /// Indicates whether a supervised restart has a chance of clearing the error.
    ///
    /// I/O failures are transient by assumption. Sequence conflicts and codec
    /// failures are not: replaying the same log will hit them again.
    pub fn is_transient(&self) -> bool {
        matches!(self, JournalError::Io { .. })
    }
}

/// Errors that terminate one entity instance.
///
/// These never cross entity boundaries. The per-entity supervisor is the sole
/// consumer and answers every variant with a backoff-delayed restart.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EntityError {
    /// A durable append or snapshot write failed mid-command.
    ///
    /// In-memory state was left untouched; the in-flight caller observes a
    /// timeout upstream because the reply slot is dropped unfulfilled.
    #[error("persistence failed: {0}")]
    Persist(#[from] JournalError),

    /// State could not be rebuilt from snapshot + replay on start.
    #[error("recovery failed: {0}")]
    Recovery(#[source] JournalError),
}

impl EntityError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EntityError::Persist(_) => "entity_persist_failed",
            EntityError::Recovery(_) => "entity_recovery_failed",
        }
    }
}

/// Errors raised while resolving a key to a live entity.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The key's shard is owned by another node.
    ///
    /// Cross-node forwarding is an external collaborator concern; the local
    /// registry only reports where the entity lives.
    #[error("shard {shard} is owned by node {owner:?}, not local")]
    NotOwner {
        /// Shard the key hashes into.
        shard: ShardId,
        /// Node the membership oracle named as owner.
        owner: NodeId,
    },

    /// The membership oracle cannot name an owner for the shard.
    #[error("no owner for key: {reason}")]
    Unavailable {
        /// Oracle-specific description (empty membership, mid-rebalance, ...).
        reason: String,
    },

    /// The runtime is shutting down; no new entities are created.
    #[error("registry is stopped")]
    Stopped,
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::NotOwner { .. } => "registry_not_owner",
            RegistryError::Unavailable { .. } => "registry_unavailable",
            RegistryError::Stopped => "registry_stopped",
        }
    }
}

/// Errors surfaced to callers of the ask gateway.
///
/// The gateway hides every internal detail behind a binary outcome: the
/// command either produced a durable reply, or it did not and the caller may
/// retry (`Start`/`Stop` are idempotent).
///
/// # Example
/// ```
/// use devicehub::GatewayError;
/// use std::time::Duration;
///
/// let err = GatewayError::Timeout { timeout: Duration::from_secs(3) };
/// assert_eq!(err.as_label(), "gateway_timeout");
/// ```
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum GatewayError {
    /// No reply arrived within the ask window.
    ///
    /// The entity-side command is not cancelled and may still complete.
    #[error("no reply within {timeout:?}")]
    Timeout {
        /// The configured ask timeout.
        timeout: Duration,
    },

    /// The entity could not be reached; retryable.
    #[error("entity unavailable: {reason}")]
    Unavailable {
        /// Routing-level description.
        reason: String,
    },
}

impl From<RegistryError> for GatewayError {
    fn from(err: RegistryError) -> Self {
        GatewayError::Unavailable {
            reason: err.to_string(),
        }
    }
}

impl GatewayError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            GatewayError::Timeout { .. } => "gateway_timeout",
            GatewayError::Unavailable { .. } => "gateway_unavailable",
        }
    }
}

/// Errors produced by the node runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some entities remained live.
    #[error("shutdown grace {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Keys of entities that did not stop in time.
        stuck: Vec<String>,
    },

    /// The HTTP listener could not be started or failed while serving.
    #[error("http server failure: {0}")]
    Http(#[source] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Http(_) => "runtime_http",
        }
    }
}
