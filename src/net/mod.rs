//! Connection-accepting server and per-connection workers.
//!
//! ```text
//!   subprocess ──TCP──▶ EventServer ──accept──▶ Worker (reader thread)
//!                                                    │ decoded frames
//!                                                    ▼
//!                                              channel registry
//!                                         (one handler per channel)
//! ```
//!
//! Handlers run on the worker's own thread, never on the accepting thread.
//! Handlers that must touch controller-owned state go through the
//! synchronization bridge; purely observational channels (`debug`, `$ISSUE`
//! logging) may be handled in place.

mod server;
mod worker;

pub use server::EventServer;
pub use worker::Worker;

use crate::protocol::Frame;

/// A decoded frame tagged with the worker it arrived on.
///
/// The worker reference lets handlers reply on the same connection.
#[derive(Debug, Clone)]
pub struct Event {
    /// The decoded (or synthesized) frame.
    pub frame: Frame,
    /// The connection the frame belongs to.
    pub worker: Worker,
}

impl Event {
    /// Channel name of the underlying frame.
    pub fn channel(&self) -> &str {
        &self.frame.channel
    }

    /// Payload text, or `""` when null.
    pub fn payload_str(&self) -> &str {
        self.frame.payload_str()
    }

    /// Reply on the connection this event arrived on.
    pub fn reply(&self, channel: &str, payload: Option<&str>) {
        self.worker.send(channel, payload);
    }
}
