//! Line-framed wire protocol shared by host and subprocess.
//!
//! One frame is exactly one UTF-8 line: `<channel>~<payload>\n`. The payload
//! is either plain text or minified JSON; a logically-null payload travels as
//! the sentinel token `$NULL` so it can never be confused with an empty
//! string.

mod frame;

pub use frame::{decode, encode, Frame, DELIMITER, NULL_SENTINEL};

/// Channel names with reserved semantics.
///
/// Any other string is an application channel. Channel names come from a
/// small closed set of identifiers and never contain the delimiter.
pub mod channel {
    /// Sent by the acceptor immediately after accept (null payload) and
    /// synthesized locally when a connection opens. Never acknowledged.
    pub const CONNECT: &str = "$CONNECT";
    /// Synthesized locally when the socket closes. Never on the wire.
    pub const DISCONNECT: &str = "$DISCONNECT";
    /// Carries a fatal-error payload (e.g. a subprocess traceback).
    pub const ISSUE: &str = "$ISSUE";
    /// Inbound: chosen action index. Outbound: `{reward, obs, done}` reply.
    pub const STEP: &str = "step";
    /// Outbound: JSON array of the default state's numeric components.
    pub const RESET: &str = "reset";
    /// Outbound, in reply to `$CONNECT`: the state-space description.
    pub const STATE_SPACE: &str = "state_space";
    /// Free-form diagnostic text. Logged, never parsed.
    pub const DEBUG: &str = "debug";
}
