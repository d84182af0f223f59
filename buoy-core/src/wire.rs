//! Framing: fixed 88-byte layout.
//! sender id (4 bytes LE) + receiver id (4 bytes LE) + kind (40 bytes) + payload (40 bytes).
//! Text fields are NUL-terminated and NUL-padded.

use crate::protocol::{Frame, MessageKind, MAX_PAYLOAD_LEN, TEXT_FIELD_LEN};

const ID_SIZE: usize = 4;
const KIND_OFFSET: usize = 2 * ID_SIZE;
const PAYLOAD_OFFSET: usize = KIND_OFFSET + TEXT_FIELD_LEN;

/// Size of one encoded frame.
pub const FRAME_LEN: usize = PAYLOAD_OFFSET + TEXT_FIELD_LEN;

/// Encode a frame into its fixed-size wire form.
pub fn encode_frame(frame: &Frame) -> Result<[u8; FRAME_LEN], FrameEncodeError> {
    let payload = frame.payload.as_bytes();
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameEncodeError::PayloadTooLong(payload.len()));
    }
    if payload.contains(&0) {
        return Err(FrameEncodeError::EmbeddedNul);
    }
    let mut out = [0u8; FRAME_LEN];
    out[..ID_SIZE].copy_from_slice(&frame.sender_id.to_le_bytes());
    out[ID_SIZE..KIND_OFFSET].copy_from_slice(&frame.receiver_id.to_le_bytes());
    let kind = frame.kind.wire_name().as_bytes();
    out[KIND_OFFSET..KIND_OFFSET + kind.len()].copy_from_slice(kind);
    out[PAYLOAD_OFFSET..PAYLOAD_OFFSET + payload.len()].copy_from_slice(payload);
    Ok(out)
}

/// Error encoding a frame (payload does not fit the text field).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameEncodeError {
    #[error("payload of {0} bytes exceeds 39")]
    PayloadTooLong(usize),
    #[error("payload contains a NUL byte")]
    EmbeddedNul,
}

/// Decode one frame from the front of `bytes`. Trailing bytes past one frame are ignored.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, FrameDecodeError> {
    if bytes.len() < FRAME_LEN {
        return Err(FrameDecodeError::Truncated(bytes.len()));
    }
    let sender_id = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let receiver_id = i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let kind = read_text(&bytes[KIND_OFFSET..PAYLOAD_OFFSET])?;
    let kind: MessageKind = kind
        .parse()
        .map_err(|_| FrameDecodeError::UnknownKind(kind.to_owned()))?;
    let payload = read_text(&bytes[PAYLOAD_OFFSET..FRAME_LEN])?.to_owned();
    Ok(Frame {
        sender_id,
        receiver_id,
        kind,
        payload,
    })
}

fn read_text(field: &[u8]) -> Result<&str, FrameDecodeError> {
    let end = field
        .iter()
        .position(|&b| b == 0)
        .ok_or(FrameDecodeError::Unterminated)?;
    std::str::from_utf8(&field[..end]).map_err(|_| FrameDecodeError::InvalidText)
}

/// Error decoding a frame (short buffer, bad text field, or unknown kind).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameDecodeError {
    #[error("frame truncated: {0} bytes, need 88")]
    Truncated(usize),
    #[error("text field is not NUL-terminated")]
    Unterminated,
    #[error("text field is not valid UTF-8")]
    InvalidText,
    #[error("unknown message kind {0:?}")]
    UnknownKind(String),
}
