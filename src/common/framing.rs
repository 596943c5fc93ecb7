//! # Frame Codec
//!
//! Turns one [`Message`] into the bytes of one frame and recognizes a complete
//! frame in a receive buffer.
//!
//! ## Marker framing (default)
//!
//! ```text
//! <message>{"json":"payload"}</message>
//! ```
//!
//! There is no length prefix. A receive buffer holds a complete frame when it
//! starts with `<message>` at offset 0 and ends with `</message>` at its very
//! end. The scheme does not escape the markers, so it is fragile: a payload
//! whose JSON text ends with the literal `</message>` bytes at a read boundary
//! is cut short and fails to decode. Use [`Framing::LengthPrefixed`] on
//! channels where both peers are under your control.
//!
//! ## Length-prefixed framing
//!
//! ```text
//! [4 bytes: payload length, big-endian u32] [N bytes: JSON payload]
//! ```

use log::warn;

use super::config::Framing;
use super::error::{Result, SocketError};
use super::messages::{self, Message};

/// Start marker of a marker-framed message.
pub const START_MARKER: &[u8] = b"<message>";
/// End marker of a marker-framed message.
pub const END_MARKER: &[u8] = b"</message>";
/// Size of the length prefix in length-prefixed framing.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Encoder/decoder for one [`Framing`] mode.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    framing: Framing,
    max_frame_bytes: usize,
}

impl FrameCodec {
    pub fn new(framing: Framing, max_frame_bytes: usize) -> Self {
        Self {
            framing,
            max_frame_bytes,
        }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Serialize `message` and wrap it into a single frame.
    pub fn encode(&self, message: &Message) -> Result<Vec<u8>> {
        let payload = messages::to_bytes(message)?;

        match self.framing {
            Framing::Marker => {
                let mut frame =
                    Vec::with_capacity(START_MARKER.len() + payload.len() + END_MARKER.len());
                frame.extend_from_slice(START_MARKER);
                frame.extend_from_slice(&payload);
                frame.extend_from_slice(END_MARKER);
                Ok(frame)
            }
            Framing::LengthPrefixed => {
                let length = u32::try_from(payload.len()).map_err(|_| SocketError::FrameTooLarge {
                    size: payload.len(),
                    max: u32::MAX as usize,
                })?;
                let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
                frame.extend_from_slice(&length.to_be_bytes());
                frame.extend_from_slice(&payload);
                Ok(frame)
            }
        }
    }

    /// Inspect the accumulated receive buffer.
    ///
    /// # Returns
    /// - `Ok(Some(payload))`: `buf` holds a complete frame; `payload` is the JSON text
    /// - `Ok(None)`: keep reading
    /// - `Err(FrameTooLarge)`: the frame can no longer fit within `max_frame_bytes`
    pub fn payload<'a>(&self, buf: &'a [u8]) -> Result<Option<&'a [u8]>> {
        match self.framing {
            Framing::Marker => {
                if buf.len() > self.max_frame_bytes {
                    return Err(SocketError::FrameTooLarge {
                        size: buf.len(),
                        max: self.max_frame_bytes,
                    });
                }
                let complete = buf.len() >= START_MARKER.len() + END_MARKER.len()
                    && buf.starts_with(START_MARKER)
                    && buf.ends_with(END_MARKER);
                if complete {
                    Ok(Some(&buf[START_MARKER.len()..buf.len() - END_MARKER.len()]))
                } else {
                    Ok(None)
                }
            }
            Framing::LengthPrefixed => {
                if buf.len() < LENGTH_PREFIX_SIZE {
                    return Ok(None);
                }
                let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
                prefix.copy_from_slice(&buf[..LENGTH_PREFIX_SIZE]);
                let length = u32::from_be_bytes(prefix) as usize;

                if length > self.max_frame_bytes {
                    return Err(SocketError::FrameTooLarge {
                        size: length,
                        max: self.max_frame_bytes,
                    });
                }

                let end = LENGTH_PREFIX_SIZE + length;
                if buf.len() < end {
                    return Ok(None);
                }
                if buf.len() > end {
                    warn!(
                        "Discarding {} bytes received after a complete frame",
                        buf.len() - end
                    );
                }
                Ok(Some(&buf[LENGTH_PREFIX_SIZE..end]))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn marker() -> FrameCodec {
        FrameCodec::new(Framing::Marker, 1024)
    }

    fn prefixed() -> FrameCodec {
        FrameCodec::new(Framing::LengthPrefixed, 1024)
    }

    #[test]
    fn test_marker_frame_layout() {
        let frame = marker().encode(&json!({"message": "new connection"})).unwrap();
        assert_eq!(frame, b"<message>{\"message\":\"new connection\"}</message>".to_vec());
    }

    #[test]
    fn test_marker_partial_buffers_are_incomplete() {
        let codec = marker();
        let frame = codec.encode(&json!([1, 2, 3])).unwrap();

        for cut in 0..frame.len() {
            assert!(codec.payload(&frame[..cut]).unwrap().is_none(), "cut at {}", cut);
        }
        assert_eq!(codec.payload(&frame).unwrap(), Some(&b"[1,2,3]"[..]));
    }

    #[test]
    fn test_marker_requires_start_at_offset_zero() {
        let codec = marker();
        assert!(codec.payload(b" <message>1</message>").unwrap().is_none());
    }

    #[test]
    fn test_marker_strips_only_outer_markers() {
        let codec = marker();
        let frame = codec.encode(&json!("<message>inner</message>!")).unwrap();
        let payload = codec.payload(&frame).unwrap().unwrap();
        assert_eq!(
            messages::from_bytes(payload).unwrap(),
            json!("<message>inner</message>!")
        );
    }

    #[test]
    fn test_marker_buffer_limit() {
        let codec = FrameCodec::new(Framing::Marker, 16);
        let result = codec.payload(b"<message>\"aaaaaaaaaaaaaaaa\"");
        assert!(matches!(result, Err(SocketError::FrameTooLarge { max: 16, .. })));
    }

    #[test]
    fn test_length_prefixed_frame_layout() {
        let frame = prefixed().encode(&json!(true)).unwrap();
        assert_eq!(&frame[..4], &[0, 0, 0, 4]);
        assert_eq!(&frame[4..], b"true");
        assert_eq!(prefixed().payload(&frame).unwrap(), Some(&b"true"[..]));
        assert!(prefixed().payload(&frame[..6]).unwrap().is_none());
    }

    #[test]
    fn test_length_prefixed_rejects_oversize_declaration() {
        let mut buf = 2_000_000u32.to_be_bytes().to_vec();
        buf.extend_from_slice(b"{}");
        assert!(matches!(
            prefixed().payload(&buf),
            Err(SocketError::FrameTooLarge { size: 2_000_000, .. })
        ));
    }
}
