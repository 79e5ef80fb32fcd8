//! Length-prefixed framing for the local datagram sockets.
//!
//! Every payload exchanged with the engine and the security daemon is
//! wrapped in a frame:
//!
//! ```text
//! +----------------------------+------------------+
//! | Length (2 bytes, LE)       | Payload          |
//! +----------------------------+------------------+
//! ```
//!
//! The sockets are datagram sockets, so message boundaries are already
//! preserved by the transport; the prefix is required by the engine's
//! protocol and must be emitted exactly. On the inbound side the prefix
//! is not trusted: the two header bytes are discarded and the rest of
//! the datagram is the payload.

use bytes::BufMut;

/// Length of the frame header (2 bytes for the u16 length prefix).
pub const HEADER_LEN: usize = 2;

/// Largest datagram the link will read or write.
pub const MAX_DATAGRAM: usize = 8 * 1024;

/// Largest payload that fits a single frame.
pub const MAX_PAYLOAD: usize = MAX_DATAGRAM - HEADER_LEN;

/// Framing failures.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Zero-length payloads are not valid frames.
    #[error("zero-length payload")]
    EmptyPayload,

    /// Payload does not fit the datagram MTU.
    #[error("payload of {size} bytes exceeds maximum of {max}")]
    PayloadTooLarge {
        /// Size of the rejected payload.
        size: usize,
        /// Maximum accepted payload size.
        max: usize,
    },

    /// Datagram shorter than the frame header.
    #[error("datagram of {len} bytes is shorter than the frame header")]
    Truncated {
        /// Size of the rejected datagram.
        len: usize,
    },
}

/// Wrap `payload` in a length-prefixed frame ready for the wire.
///
/// # Errors
///
/// Returns [`FrameError::EmptyPayload`] for empty payloads and
/// [`FrameError::PayloadTooLarge`] for payloads over [`MAX_PAYLOAD`].
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    if payload.is_empty() {
        return Err(FrameError::EmptyPayload);
    }
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    #[allow(clippy::cast_possible_truncation)] // bounded by MAX_PAYLOAD above
    frame.put_u16_le(payload.len() as u16);
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Strip the frame header from one received datagram.
///
/// The datagram transport preserves message boundaries, so the length
/// bytes carry no information we need; they are validated only for
/// presence and then discarded.
///
/// # Errors
///
/// Returns [`FrameError::Truncated`] when the datagram is shorter than
/// the header. Truncated datagrams are a recoverable condition: the
/// caller logs and drops them without tearing down the link.
pub fn decode_frame(datagram: &[u8]) -> Result<&[u8], FrameError> {
    if datagram.len() < HEADER_LEN {
        return Err(FrameError::Truncated {
            len: datagram.len(),
        });
    }
    Ok(&datagram[HEADER_LEN..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let payload = b"wheel command";
        let frame = encode_frame(payload).unwrap();

        assert_eq!(frame.len(), HEADER_LEN + payload.len());
        assert_eq!(&frame[..2], &[13, 0]); // little-endian 13

        let decoded = decode_frame(&frame).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_roundtrip_at_max_payload() {
        let payload = vec![0xA5u8; MAX_PAYLOAD];
        let frame = encode_frame(&payload).unwrap();
        assert_eq!(decode_frame(&frame).unwrap(), &payload[..]);
    }

    #[test]
    fn test_encode_rejects_empty_payload() {
        assert!(matches!(encode_frame(b""), Err(FrameError::EmptyPayload)));
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let payload = vec![0u8; MAX_PAYLOAD + 1];
        assert!(matches!(
            encode_frame(&payload),
            Err(FrameError::PayloadTooLarge { size, max })
            if size == MAX_PAYLOAD + 1 && max == MAX_PAYLOAD
        ));
    }

    #[test]
    fn test_decode_rejects_short_datagram() {
        assert!(matches!(
            decode_frame(&[0x01]),
            Err(FrameError::Truncated { len: 1 })
        ));
        assert!(matches!(
            decode_frame(&[]),
            Err(FrameError::Truncated { len: 0 })
        ));
    }

    #[test]
    fn test_decode_ignores_length_prefix_value() {
        // The transport preserves boundaries; a lying prefix still yields
        // the rest of the datagram.
        let datagram = [0xFF, 0xFF, b'o', b'k'];
        assert_eq!(decode_frame(&datagram).unwrap(), b"ok");
    }

    #[test]
    fn test_header_only_datagram_is_empty_payload() {
        let frame = [0u8, 0u8];
        assert_eq!(decode_frame(&frame).unwrap(), b"");
    }
}
