//! # Message Protocol
//!
//! A message is any JSON value: object, array, string, number, boolean or
//! null. No schema is enforced beyond syntactic validity.
//!
//! Messages are serialized as compact UTF-8 JSON with non-ASCII characters
//! written literally (never `\uXXXX`-escaped) before being framed by
//! [`FrameCodec`](super::framing::FrameCodec).

use serde_json::{json, Value};

use super::error::{Result, SocketError};

/// A single JSON message exchanged between client and server.
pub type Message = Value;

/// Key of the single field in a [`status`] object.
pub const STATUS_KEY: &str = "Status";

/// Serialize a message to JSON bytes for transmission.
pub fn to_bytes(message: &Message) -> Result<Vec<u8>> {
    serde_json::to_vec(message).map_err(SocketError::Encode)
}

/// Deserialize a message from the payload of a received frame.
pub fn from_bytes(bytes: &[u8]) -> Result<Message> {
    serde_json::from_slice(bytes).map_err(SocketError::Decode)
}

/// Build a status object, e.g. `{"Status": "NoObject"}`.
///
/// Handlers use this as the conventional reply to input of an unexpected shape.
pub fn status(text: &str) -> Message {
    json!({ STATUS_KEY: text })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_ascii_is_not_escaped() {
        let bytes = to_bytes(&json!({"greeting": "héllo 世界"})).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, r#"{"greeting":"héllo 世界"}"#);
    }

    #[test]
    fn test_from_bytes_scalars() {
        assert_eq!(from_bytes(b"null").unwrap(), Value::Null);
        assert_eq!(from_bytes(b"42").unwrap(), json!(42));
        assert_eq!(from_bytes(b"[1,\"two\",false]").unwrap(), json!([1, "two", false]));
    }

    #[test]
    fn test_from_bytes_rejects_invalid_json() {
        assert!(matches!(from_bytes(b"{\"open\":"), Err(SocketError::Decode(_))));
    }

    #[test]
    fn test_status_object() {
        assert_eq!(status("NoObject"), json!({"Status": "NoObject"}));
    }
}
