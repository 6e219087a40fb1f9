//! Frame codec (RFC 6455 §5): the wire format shared by every message type
//! and the control frames (ping/pong/close). Masking follows §5.3 (a server
//! must reject masked-absent frames from a client unless explicitly
//! configured to tolerate it; a server never masks its own frames).

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::Error;

/// The six opcodes RFC 6455 defines plus the reserved ranges collapsed into
/// a single variant each (a frame using a reserved opcode fails the
/// connection per §5.2, it is never forwarded to the application).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl OpCode {
    fn from_u8(v: u8) -> Option<OpCode> {
        match v {
            0x0 => Some(OpCode::Continuation),
            0x1 => Some(OpCode::Text),
            0x2 => Some(OpCode::Binary),
            0x8 => Some(OpCode::Close),
            0x9 => Some(OpCode::Ping),
            0xA => Some(OpCode::Pong),
            _ => None,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
        }
    }

    /// Control frames (close/ping/pong) must not be fragmented and must
    /// carry a payload of at most 125 bytes (§5.5).
    pub fn is_control(self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }
}

/// One decoded frame: header bits plus an already-unmasked payload.
#[derive(Debug, Clone)]
pub struct Frame {
    pub fin: bool,
    pub rsv1: bool,
    pub opcode: OpCode,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(fin: bool, opcode: OpCode, payload: Bytes) -> Frame {
        Frame {
            fin,
            rsv1: false,
            opcode,
            payload,
        }
    }

    pub fn close(code: u16, reason: &str) -> Frame {
        let mut payload = BytesMut::with_capacity(2 + reason.len());
        payload.put_u16(code);
        payload.extend_from_slice(reason.as_bytes());
        Frame::new(true, OpCode::Close, payload.freeze())
    }
}

/// Attempts to decode one frame from the front of `buf`. Returns `Ok(None)`
/// when `buf` doesn't yet hold a complete frame; on success, the consumed
/// bytes are split off the front of `buf`.
///
/// `mask_required` enforces RFC 6455 §5.1 (a server must reject an
/// unmasked frame from a client) unless the caller's configuration opts
/// out of that check.
pub fn decode(buf: &mut BytesMut, mask_required: bool, max_payload: usize) -> Result<Option<Frame>, Error> {
    if buf.len() < 2 {
        return Ok(None);
    }

    let first = buf[0];
    let second = buf[1];
    let fin = first & 0x80 != 0;
    let rsv1 = first & 0x40 != 0;
    let rsv2 = first & 0x20 != 0;
    let rsv3 = first & 0x10 != 0;
    if rsv2 || rsv3 {
        return Err(Error::new_frame());
    }
    let opcode = OpCode::from_u8(first & 0x0F).ok_or_else(Error::new_frame)?;
    let masked = second & 0x80 != 0;
    if mask_required && !masked {
        return Err(Error::new_frame());
    }

    let len_byte = second & 0x7F;
    let (len_field_size, payload_len): (usize, u64) = match len_byte {
        0..=125 => (0, len_byte as u64),
        126 => {
            if buf.len() < 4 {
                return Ok(None);
            }
            (2, u16::from_be_bytes([buf[2], buf[3]]) as u64)
        }
        127 => {
            if buf.len() < 10 {
                return Ok(None);
            }
            let mut arr = [0u8; 8];
            arr.copy_from_slice(&buf[2..10]);
            (8, u64::from_be_bytes(arr))
        }
        _ => unreachable!("7-bit field"),
    };

    if opcode.is_control() && (payload_len > 125 || !fin) {
        return Err(Error::new_frame());
    }
    if payload_len as usize > max_payload {
        return Err(Error::new_frame());
    }

    let mask_size = if masked { 4 } else { 0 };
    let header_len = 2 + len_field_size + mask_size;
    let total_len = header_len + payload_len as usize;
    if buf.len() < total_len {
        return Ok(None);
    }

    let mut frame_bytes = buf.split_to(total_len);
    frame_bytes.advance(header_len - mask_size);
    let mask_key = if masked {
        let mut key = [0u8; 4];
        key.copy_from_slice(&frame_bytes[..4]);
        frame_bytes.advance(4);
        Some(key)
    } else {
        None
    };

    let mut payload = frame_bytes;
    if let Some(key) = mask_key {
        apply_mask(&mut payload, key);
    }

    Ok(Some(Frame {
        fin,
        rsv1,
        opcode,
        payload: payload.freeze(),
    }))
}

/// Encodes `frame` onto `out`. `mask` is `Some` for client-role output;
/// this crate only ever plays the server role, so it is always `None`,
/// kept as a parameter for the frame codec's use from tests and from any
/// future client-mode reuse.
pub fn encode(frame: &Frame, mask: Option<[u8; 4]>, out: &mut BytesMut) {
    let len = frame.payload.len();
    let mut first = frame.opcode.as_u8();
    if frame.fin {
        first |= 0x80;
    }
    if frame.rsv1 {
        first |= 0x40;
    }
    out.put_u8(first);

    let mask_bit = if mask.is_some() { 0x80 } else { 0x00 };
    if len <= 125 {
        out.put_u8(mask_bit | len as u8);
    } else if len <= 65535 {
        out.put_u8(mask_bit | 126);
        out.put_u16(len as u16);
    } else {
        out.put_u8(mask_bit | 127);
        out.put_u64(len as u64);
    }

    match mask {
        Some(key) => {
            out.extend_from_slice(&key);
            let start = out.len();
            out.extend_from_slice(&frame.payload);
            apply_mask(&mut out[start..], key);
        }
        None => out.extend_from_slice(&frame.payload),
    }
}

fn apply_mask(data: &mut [u8], key: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_masked_text_frame() {
        let frame = Frame::new(true, OpCode::Text, Bytes::from_static(b"hello"));
        let mut out = BytesMut::new();
        encode(&frame, Some([1, 2, 3, 4]), &mut out);

        let decoded = decode(&mut out, true, 1 << 20).unwrap().unwrap();
        assert_eq!(decoded.opcode, OpCode::Text);
        assert_eq!(decoded.payload, Bytes::from_static(b"hello"));
        assert!(out.is_empty());
    }

    #[test]
    fn incomplete_frame_returns_none() {
        let frame = Frame::new(true, OpCode::Binary, Bytes::from_static(b"0123456789"));
        let mut out = BytesMut::new();
        encode(&frame, Some([9, 9, 9, 9]), &mut out);
        out.truncate(out.len() - 1);
        assert!(decode(&mut out, true, 1 << 20).unwrap().is_none());
    }

    #[test]
    fn unmasked_client_frame_rejected_when_required() {
        let frame = Frame::new(true, OpCode::Text, Bytes::from_static(b"hi"));
        let mut out = BytesMut::new();
        encode(&frame, None, &mut out);
        assert!(decode(&mut out, true, 1 << 20).is_err());
    }

    #[test]
    fn fragmented_control_frame_is_rejected() {
        let mut raw = BytesMut::new();
        raw.put_u8(0x09); // FIN=0, opcode=ping
        raw.put_u8(0x80); // masked, len 0
        raw.extend_from_slice(&[0, 0, 0, 0]);
        assert!(decode(&mut raw, true, 1 << 20).is_err());
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let frame = Frame::new(true, OpCode::Binary, Bytes::from(vec![0u8; 200]));
        let mut out = BytesMut::new();
        encode(&frame, Some([1, 1, 1, 1]), &mut out);
        assert!(decode(&mut out, true, 100).is_err());
    }
}
