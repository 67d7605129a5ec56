//! Device domain model.
//!
//! This module provides the pure state machine of one simulated device:
//! - [`State`] - the device's current mode (`Idle` or `Running`)
//! - [`CommandKind`] - the inputs a device accepts
//! - [`DeviceEvent`] - the persisted facts a device emits
//! - [`Reply`] - the values returned to callers
//! - [`transition`] / [`apply`] - the decision and evolution functions

mod machine;

pub use machine::{apply, transition, CommandKind, DeviceEvent, Effect, Reply, State};
