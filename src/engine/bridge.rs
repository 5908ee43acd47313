//! Rendezvous between connection workers and the training thread.
//!
//! The `step` handler runs on a worker thread and must not touch training
//! state. It only enqueues here; the training thread dequeues and does every
//! mutation itself (single-writer discipline).

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::error::{Error, Result};
use crate::net::Event;

/// What a worker thread can hand to the training thread.
#[derive(Debug)]
pub enum StepEvent {
    /// An inbound `step` frame, carrying its originating worker for the reply.
    Step(Event),
    /// The peer is gone; wake the training thread instead of letting it block
    /// on a channel that will never fill.
    Disconnected,
}

/// Producer half, cloned into the channel handlers.
#[derive(Debug, Clone)]
pub struct StepSender {
    tx: Sender<StepEvent>,
}

impl StepSender {
    /// Enqueue one event. A dropped consumer means the training loop already
    /// ended; the event is discarded.
    pub fn push(&self, event: StepEvent) {
        let _ = self.tx.send(event);
    }
}

/// Consumer half, owned by the training thread.
#[derive(Debug)]
pub struct StepBridge {
    rx: Receiver<StepEvent>,
}

impl StepBridge {
    /// Create a connected sender/bridge pair.
    pub fn channel() -> (StepSender, StepBridge) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (StepSender { tx }, StepBridge { rx })
    }

    /// Block until the next event arrives.
    ///
    /// With a timeout, a stalled subprocess surfaces as
    /// [`Error::StepTimeout`] instead of hanging the training thread forever.
    /// A fully disconnected channel (every sender dropped) surfaces as
    /// [`Error::Disconnected`].
    pub fn wait_next(&self, timeout: Option<Duration>) -> Result<StepEvent> {
        match timeout {
            Some(timeout) => self.rx.recv_timeout(timeout).map_err(|err| match err {
                RecvTimeoutError::Timeout => Error::StepTimeout,
                RecvTimeoutError::Disconnected => Error::Disconnected,
            }),
            None => self.rx.recv().map_err(|_| Error::Disconnected),
        }
    }
}
