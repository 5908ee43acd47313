//! Crate-wide error taxonomy.
//!
//! Transport-level failures never cross the thread boundary raw: the
//! connection worker absorbs them and re-surfaces them as `$DISCONNECT` /
//! `$ISSUE` events. The variants here are what the training-loop thread and
//! library callers actually see.

use std::io;

use thiserror::Error;

/// Errors surfaced by the coordination layer.
#[derive(Debug, Error)]
pub enum Error {
    /// A wire line could not be parsed into a frame. Terminates the read loop
    /// of the connection it arrived on; other connections are unaffected.
    #[error("malformed frame: {0:?}")]
    MalformedFrame(String),

    /// Socket-level I/O failure. Treated like a clean disconnect for
    /// run-termination purposes.
    #[error("socket failure: {0}")]
    SocketFailure(#[from] io::Error),

    /// Fatal error reported by the subprocess over the `$ISSUE` channel.
    /// Logged; does not by itself terminate a run.
    #[error("subprocess issue: {0}")]
    SubprocessIssue(String),

    /// `choose_one` was called on a (state, action) key with no cached
    /// transitions. Callers must check `has` first; this is a programming
    /// error, not a recoverable condition.
    #[error("no cached transitions for state {state}, action {action}")]
    EmptyCacheKey { state: usize, action: usize },

    /// Results were requested before any termination condition was met.
    #[error("results requested before the optimization terminated")]
    PrematureInvocation,

    /// The subprocess produced no `step` frame within the configured timeout.
    #[error("timed out waiting for a step from the subprocess")]
    StepTimeout,

    /// The peer disconnected while the training loop was waiting on it.
    /// The run ends gracefully; `continue_iterating` is already false.
    #[error("subprocess disconnected")]
    Disconnected,

    /// A state or action tuple does not belong to the registered space.
    #[error("point {0:?} is outside the registered state space")]
    UnknownPoint(Vec<usize>),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
