//! Pure state machine of one device.
//!
//! The machine is split into two functions with distinct jobs:
//!
//! - [`transition`] decides **what should happen** for a command: persist an
//!   event and reply, reply without persisting, or nothing. It never touches
//!   storage, timers, or channels.
//! - [`apply`] decides **how state evolves** once an event is a durable fact.
//!   It is total and deterministic; recovery replays only `apply`, so a
//!   restart can never re-run side effects such as heartbeat scheduling or
//!   caller notification.
//!
//! ## Transition table
//! ```text
//! State    Command   Effect
//! ─────    ───────   ──────
//! Idle     Start     persist Started, reply Started   (device begins running)
//! Idle     Stop      reply Stopped                    (idempotent, no event)
//! Idle     Tick      none
//! Running  Start     reply Started                    (idempotent, no event)
//! Running  Stop      persist Stopped, reply Stopped
//! Running  Tick      none                             (instance re-arms heartbeat)
//! ```

use serde::{Deserialize, Serialize};

/// Mode of one device.
///
/// Owned exclusively by the device's entity instance; nothing outside the
/// instance's command loop ever reads or writes it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    /// Device is stopped. The initial state.
    #[default]
    Idle,
    /// Device is running and heartbeating.
    Running,
}

/// Input messages a device accepts.
///
/// Commands are ephemeral and never persisted. `Start` and `Stop` are
/// request-response kinds; the runtime envelope carries their reply slot.
/// `Tick` is the device's own heartbeat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandKind {
    /// Begin running. Idempotent when already running.
    Start,
    /// Stop running. Idempotent when already idle.
    Stop,
    /// Periodic heartbeat, self-delivered while running.
    Tick,
}

/// Value returned to the caller of a request-response command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reply {
    /// The device is running (whether or not this command changed that).
    Started,
    /// The device is idle (whether or not this command changed that).
    Stopped,
}

/// Immutable, persisted fact describing a transition that already happened.
///
/// Events are the only source of truth for state; the in-memory [`State`] is
/// always a left-fold of the event sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceEvent {
    /// The device began running.
    Started {
        /// Key of the device this fact belongs to.
        device: String,
    },
    /// The device stopped running.
    Stopped {
        /// Key of the device this fact belongs to.
        device: String,
    },
}

impl DeviceEvent {
    /// Key of the device this event belongs to.
    pub fn device(&self) -> &str {
        match self {
            DeviceEvent::Started { device } | DeviceEvent::Stopped { device } => device,
        }
    }
}

/// Outcome of [`transition`]: what the runtime must do for a command.
#[derive(Debug, PartialEq, Eq)]
pub enum Effect {
    /// Nothing to persist, nothing to reply.
    None,
    /// Durably append `event`, then release `reply` to the caller.
    ///
    /// The reply must never be released before the append succeeds.
    Persist {
        /// Fact to append to the device's journal.
        event: DeviceEvent,
        /// Value released to the caller after the append.
        reply: Reply,
    },
    /// Release `reply` immediately; no event is emitted.
    Reply {
        /// Value released to the caller.
        reply: Reply,
    },
}

/// Decides the effect of `command` against `state` for the device `key`.
pub fn transition(key: &str, state: State, command: CommandKind) -> Effect {
    match (state, command) {
        (State::Idle, CommandKind::Start) => Effect::Persist {
            event: DeviceEvent::Started {
                device: key.to_string(),
            },
            reply: Reply::Started,
        },
        (State::Idle, CommandKind::Stop) => Effect::Reply {
            reply: Reply::Stopped,
        },
        (State::Idle, CommandKind::Tick) => Effect::None,
        (State::Running, CommandKind::Start) => Effect::Reply {
            reply: Reply::Started,
        },
        (State::Running, CommandKind::Stop) => Effect::Persist {
            event: DeviceEvent::Stopped {
                device: key.to_string(),
            },
            reply: Reply::Stopped,
        },
        (State::Running, CommandKind::Tick) => Effect::None,
    }
}

/// Evolves `state` with an already-durable `event`.
///
/// Total and deterministic; this function alone defines recovery semantics
/// and must reproduce state bit-for-bit from the persisted event stream.
pub fn apply(_state: State, event: &DeviceEvent) -> State {
    match event {
        DeviceEvent::Started { .. } => State::Running,
        DeviceEvent::Stopped { .. } => State::Idle,
    }
}
