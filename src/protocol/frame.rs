//! Frame encoding and decoding.

use crate::error::{Error, Result};

/// Separates the channel name from the payload on the wire.
///
/// Channel names never contain it; payloads may, because decoding splits on
/// the first occurrence only.
pub const DELIMITER: char = '~';

/// Literal token standing in for a null payload on the wire.
pub const NULL_SENTINEL: &str = "$NULL";

/// One protocol message: a channel name plus an optional payload.
///
/// Ephemeral; constructed per message and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Channel selecting the message semantics.
    pub channel: String,
    /// Payload text. `None` travels on the wire as [`NULL_SENTINEL`].
    pub payload: Option<String>,
}

impl Frame {
    /// Create a frame with a payload.
    pub fn new(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            payload: Some(payload.into()),
        }
    }

    /// Create a frame with a null payload.
    pub fn empty(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            payload: None,
        }
    }

    /// Payload text, or `""` when null.
    pub fn payload_str(&self) -> &str {
        self.payload.as_deref().unwrap_or("")
    }
}

/// Encode one frame as one line.
///
/// Always appends exactly one trailing newline. Callers must ensure neither
/// the channel nor the payload contains raw newline bytes (embedded JSON must
/// be minified); the protocol has no escaping layer.
pub fn encode(channel: &str, payload: Option<&str>) -> String {
    let payload = payload.unwrap_or(NULL_SENTINEL);
    format!("{channel}{DELIMITER}{payload}\n")
}

/// Decode one line into a frame.
///
/// The line may carry its trailing newline or not. An empty line or a line
/// without the delimiter fails with [`Error::MalformedFrame`]; the caller
/// decides whether that is fatal for the connection.
pub fn decode(line: &str) -> Result<Frame> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.is_empty() {
        return Err(Error::MalformedFrame(String::from("empty line")));
    }
    let (channel, payload) = line
        .split_once(DELIMITER)
        .ok_or_else(|| Error::MalformedFrame(line.to_string()))?;
    if channel.is_empty() {
        return Err(Error::MalformedFrame(line.to_string()));
    }
    let payload = if payload == NULL_SENTINEL {
        None
    } else {
        Some(payload.to_string())
    };
    Ok(Frame {
        channel: channel.to_string(),
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let line = encode("step", Some("2"));
        assert_eq!(line, "step~2\n");
        let frame = decode(&line).unwrap();
        assert_eq!(frame.channel, "step");
        assert_eq!(frame.payload.as_deref(), Some("2"));
    }

    #[test]
    fn test_round_trip_json_payload() {
        let payload = r#"{"reward":1.5,"obs":[0.0,2.0],"done":false}"#;
        let frame = decode(&encode("step", Some(payload))).unwrap();
        assert_eq!(frame.payload.as_deref(), Some(payload));
    }

    #[test]
    fn test_null_payload_round_trips_as_null() {
        let line = encode("$CONNECT", None);
        assert_eq!(line, "$CONNECT~$NULL\n");
        let frame = decode(&line).unwrap();
        assert_eq!(frame.payload, None);
        // The sentinel is recognized as logical null, never surfaced as the
        // literal string "$NULL".
        assert_eq!(frame.payload_str(), "");
    }

    #[test]
    fn test_payload_may_contain_delimiter() {
        let frame = decode(&encode("debug", Some("a~b~c"))).unwrap();
        assert_eq!(frame.payload.as_deref(), Some("a~b~c"));
    }

    #[test]
    fn test_empty_line_is_malformed() {
        assert!(matches!(decode(""), Err(Error::MalformedFrame(_))));
        assert!(matches!(decode("\n"), Err(Error::MalformedFrame(_))));
    }

    #[test]
    fn test_line_without_delimiter_is_malformed() {
        assert!(matches!(decode("step"), Err(Error::MalformedFrame(_))));
    }

    #[test]
    fn test_missing_channel_is_malformed() {
        assert!(matches!(decode("~payload"), Err(Error::MalformedFrame(_))));
    }

    #[test]
    fn test_decode_tolerates_crlf() {
        let frame = decode("debug~hello\r\n").unwrap();
        assert_eq!(frame.payload.as_deref(), Some("hello"));
    }
}
