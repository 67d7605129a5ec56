//! Event subscribers for the devicehub runtime.
//!
//! This module provides the [`Subscribe`] trait and built-in implementations
//! for handling runtime events broadcast through the [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   EntityInstance / Supervisor / Registry ── publish(Event) ──► Bus
//!                                                                 │
//!                                              Node listener ─────┘
//!                                                 │
//!                                          SubscriberSet::emit(&Event)
//!                                            ┌──────┴──────┬────────┐
//!                                            ▼             ▼        ▼
//!                                        [queue S1]   [queue S2]   ...
//!                                            ▼             ▼
//!                                        worker S1     worker S2
//!                                            ▼             ▼
//!                                       on_event(&e)  on_event(&e)
//! ```
//!
//! ## Implementing custom subscribers
//! ```rust
//! use devicehub::{Subscribe, Event, EventKind};
//! use async_trait::async_trait;
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     fn name(&self) -> &'static str { "failure-counter" }
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::PersistFailed {
//!             // increment a counter
//!         }
//!     }
//! }
//! ```

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
