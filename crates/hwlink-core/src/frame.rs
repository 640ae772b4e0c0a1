//! Request/response frame codec for the fixed-size control channel
//!
//! Pure transformation, no I/O. A request frame is
//!
//! ```text
//! [u16 length][u16 magic][u32 opcode][u32 param1..param4][payload]
//! ```
//!
//! with `length` back-patched to the total frame size minus 4 (the leading
//! length/magic pair is not counted). A response frame is the echoed opcode
//! (widened to 4 bytes) followed by the payload. All fields little-endian.

use crate::error::{ProtocolError, Result};

/// Total size of the transfer buffer the transport exchanges
pub const HW_MONITOR_BUFFER_SIZE: usize = 1024;

/// Largest payload a single frame may carry
pub const MAX_FRAME_PAYLOAD: usize = 1000;

/// Magic tag following the length prefix of every request frame
pub const FRAME_MAGIC: u16 = 0xCDAB;

/// Bytes preceding the payload in a request frame
pub const REQUEST_HEADER_SIZE: usize = 24;

/// Bytes of opcode echo preceding the payload in a response
pub const RESPONSE_OPCODE_SIZE: usize = 4;

/// Encode a command into the wire frame the transport expects
///
/// Payloads longer than [`MAX_FRAME_PAYLOAD`] are a caller error, rejected
/// before anything is written.
pub fn encode_request(
    opcode: u8,
    param1: u32,
    param2: u32,
    param3: u32,
    param4: u32,
    payload: &[u8],
) -> Result<Vec<u8>> {
    if payload.len() > MAX_FRAME_PAYLOAD {
        return Err(ProtocolError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_FRAME_PAYLOAD,
        });
    }

    let mut buf = Vec::with_capacity(REQUEST_HEADER_SIZE + payload.len());
    buf.extend_from_slice(&[0, 0]); // length, back-patched below
    buf.extend_from_slice(&FRAME_MAGIC.to_le_bytes());
    buf.extend_from_slice(&(opcode as u32).to_le_bytes());
    buf.extend_from_slice(&param1.to_le_bytes());
    buf.extend_from_slice(&param2.to_le_bytes());
    buf.extend_from_slice(&param3.to_le_bytes());
    buf.extend_from_slice(&param4.to_le_bytes());
    buf.extend_from_slice(payload);

    let length = (buf.len() - 4) as u16;
    buf[0..2].copy_from_slice(&length.to_le_bytes());

    Ok(buf)
}

/// Split a response buffer into the echoed opcode and the payload
///
/// Fails with [`ProtocolError::MalformedResponse`] when the buffer cannot
/// hold the 4-byte echo.
pub fn decode_response(bytes: &[u8]) -> Result<(u32, &[u8])> {
    if bytes.len() < RESPONSE_OPCODE_SIZE {
        return Err(ProtocolError::MalformedResponse { len: bytes.len() });
    }

    let echoed = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    Ok((echoed, &bytes[RESPONSE_OPCODE_SIZE..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_layout() {
        let frame = encode_request(0x10, 1, 2, 3, 4, &[0xAA, 0xBB]).unwrap();

        assert_eq!(frame.len(), REQUEST_HEADER_SIZE + 2);
        // length = total - 4
        let length = u16::from_le_bytes([frame[0], frame[1]]);
        assert_eq!(length as usize, frame.len() - 4);
        // magic
        assert_eq!(u16::from_le_bytes([frame[2], frame[3]]), FRAME_MAGIC);
        // opcode widened to 4 bytes
        assert_eq!(&frame[4..8], &[0x10, 0, 0, 0]);
        // params
        assert_eq!(u32::from_le_bytes([frame[8], frame[9], frame[10], frame[11]]), 1);
        assert_eq!(u32::from_le_bytes([frame[20], frame[21], frame[22], frame[23]]), 4);
        // payload
        assert_eq!(&frame[24..], &[0xAA, 0xBB]);
    }

    #[test]
    fn round_trip() {
        let payload: Vec<u8> = (0..MAX_FRAME_PAYLOAD as u32).map(|i| i as u8).collect();
        let frame = encode_request(0x15, 31, 0, 0, 0, &payload).unwrap();
        assert_eq!(frame.len(), REQUEST_HEADER_SIZE + MAX_FRAME_PAYLOAD);

        // A device echoing the opcode back: [opcode u32][payload]
        let mut response = Vec::new();
        response.extend_from_slice(&0x15u32.to_le_bytes());
        response.extend_from_slice(&payload);

        let (echoed, decoded) = decode_response(&response).unwrap();
        assert_eq!(echoed, 0x15);
        assert_eq!(decoded, &payload[..]);
    }

    #[test]
    fn oversized_payload_rejected() {
        let payload = vec![0u8; MAX_FRAME_PAYLOAD + 1];
        let err = encode_request(0x10, 0, 0, 0, 0, &payload).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::PayloadTooLarge {
                len: MAX_FRAME_PAYLOAD + 1,
                max: MAX_FRAME_PAYLOAD
            }
        );
    }

    #[test]
    fn short_response_rejected() {
        for len in 0..RESPONSE_OPCODE_SIZE {
            let bytes = vec![0u8; len];
            assert_eq!(
                decode_response(&bytes).unwrap_err(),
                ProtocolError::MalformedResponse { len }
            );
        }
    }

    #[test]
    fn empty_payload_response() {
        let (echoed, payload) = decode_response(&[0x7F, 0, 0, 0]).unwrap();
        assert_eq!(echoed, 0x7F);
        assert!(payload.is_empty());
    }
}
