//! Message assembly (RFC 6455 §5.4): data frames may be split across a
//! leading `Text`/`Binary` frame and zero or more `Continuation` frames;
//! control frames may be interleaved between fragments but never split
//! themselves. [`Reassembler`] turns a stream of [`Frame`]s into a stream
//! of complete [`Message`]s.

use bytes::{Bytes, BytesMut};

use crate::error::Error;
use crate::websocket::close::CloseFrame;
use crate::websocket::frame::{Frame, OpCode};

/// A complete, reassembled WebSocket message.
#[derive(Debug, Clone)]
pub enum Message {
    Text(String),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close(Option<CloseFrame>),
}

impl Message {
    pub fn text(s: impl Into<String>) -> Message {
        Message::Text(s.into())
    }

    pub fn binary(b: impl Into<Bytes>) -> Message {
        Message::Binary(b.into())
    }

    /// Splits this message into the frames needed to send it (a single
    /// frame for control messages and unfragmented data; this
    /// implementation never fragments outbound messages, since nothing in
    /// the design calls for bounding outbound frame size below
    /// `max_frame_size`).
    pub fn into_frame(self) -> Frame {
        match self {
            Message::Text(s) => Frame::new(true, OpCode::Text, Bytes::from(s)),
            Message::Binary(b) => Frame::new(true, OpCode::Binary, b),
            Message::Ping(b) => Frame::new(true, OpCode::Ping, b),
            Message::Pong(b) => Frame::new(true, OpCode::Pong, b),
            Message::Close(Some(close)) => close.into_frame(),
            Message::Close(None) => Frame::new(true, OpCode::Close, Bytes::new()),
        }
    }
}

/// Accumulates fragmented data frames into complete messages. One instance
/// per WebSocket connection direction.
#[derive(Debug, Default)]
pub struct Reassembler {
    state: ReassemblerState,
}

#[derive(Debug)]
enum ReassemblerState {
    Idle,
    Fragmenting { text: bool, buf: BytesMut },
}

impl Default for ReassemblerState {
    fn default() -> Self {
        ReassemblerState::Idle
    }
}

impl Reassembler {
    pub fn new() -> Reassembler {
        Reassembler::default()
    }

    /// Feeds one decoded frame in. Returns `Ok(Some(message))` once a
    /// complete message is assembled (control frames complete
    /// immediately); `Ok(None)` if `frame` was a fragment awaiting more
    /// continuation frames.
    pub fn push(&mut self, frame: Frame) -> Result<Option<Message>, Error> {
        if frame.opcode.is_control() {
            return Ok(Some(match frame.opcode {
                OpCode::Close => Message::Close(match CloseFrame::parse(frame.payload) {
                    Ok(close) => Some(close),
                    Err(_) => None,
                }),
                OpCode::Ping => Message::Ping(frame.payload),
                OpCode::Pong => Message::Pong(frame.payload),
                _ => unreachable!("is_control() covers these"),
            }));
        }

        match (&mut self.state, frame.opcode) {
            (ReassemblerState::Idle, OpCode::Continuation) => Err(Error::new_frame()),
            (ReassemblerState::Idle, OpCode::Text) | (ReassemblerState::Idle, OpCode::Binary) => {
                let text = frame.opcode == OpCode::Text;
                if frame.fin {
                    return Ok(Some(finish(text, BytesMut::from(&frame.payload[..]))?));
                }
                let mut buf = BytesMut::new();
                buf.extend_from_slice(&frame.payload);
                self.state = ReassemblerState::Fragmenting { text, buf };
                Ok(None)
            }
            (ReassemblerState::Fragmenting { .. }, OpCode::Text)
            | (ReassemblerState::Fragmenting { .. }, OpCode::Binary) => Err(Error::new_frame()),
            (ReassemblerState::Fragmenting { buf, .. }, OpCode::Continuation) => {
                buf.extend_from_slice(&frame.payload);
                if frame.fin {
                    let ReassemblerState::Fragmenting { text, buf } =
                        std::mem::replace(&mut self.state, ReassemblerState::Idle)
                    else {
                        unreachable!()
                    };
                    Ok(Some(finish(text, buf)?))
                } else {
                    Ok(None)
                }
            }
            (_, opcode) if opcode.is_control() => unreachable!("handled above"),
            _ => Err(Error::new_frame()),
        }
    }
}

fn finish(text: bool, buf: BytesMut) -> Result<Message, Error> {
    if text {
        let s = String::from_utf8(buf.to_vec()).map_err(|_| Error::new_frame())?;
        Ok(Message::Text(s))
    } else {
        Ok(Message::Binary(buf.freeze()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfragmented_text_completes_immediately() {
        let mut r = Reassembler::new();
        let frame = Frame::new(true, OpCode::Text, Bytes::from_static(b"hi"));
        let msg = r.push(frame).unwrap().unwrap();
        assert!(matches!(msg, Message::Text(s) if s == "hi"));
    }

    #[test]
    fn fragmented_binary_assembles_across_continuations() {
        let mut r = Reassembler::new();
        assert!(r
            .push(Frame::new(false, OpCode::Binary, Bytes::from_static(b"ab")))
            .unwrap()
            .is_none());
        assert!(r
            .push(Frame::new(false, OpCode::Continuation, Bytes::from_static(b"cd")))
            .unwrap()
            .is_none());
        let msg = r
            .push(Frame::new(true, OpCode::Continuation, Bytes::from_static(b"ef")))
            .unwrap()
            .unwrap();
        assert!(matches!(msg, Message::Binary(b) if &b[..] == b"abcdef"));
    }

    #[test]
    fn control_frame_interleaved_mid_fragment_completes_on_its_own() {
        let mut r = Reassembler::new();
        assert!(r
            .push(Frame::new(false, OpCode::Text, Bytes::from_static(b"ab")))
            .unwrap()
            .is_none());
        let ping = r
            .push(Frame::new(true, OpCode::Ping, Bytes::from_static(b"p")))
            .unwrap()
            .unwrap();
        assert!(matches!(ping, Message::Ping(b) if &b[..] == b"p"));
        let msg = r
            .push(Frame::new(true, OpCode::Continuation, Bytes::from_static(b"cd")))
            .unwrap()
            .unwrap();
        assert!(matches!(msg, Message::Text(s) if s == "abcd"));
    }

    #[test]
    fn new_data_frame_while_fragmenting_is_rejected() {
        let mut r = Reassembler::new();
        r.push(Frame::new(false, OpCode::Text, Bytes::from_static(b"a")))
            .unwrap();
        assert!(r
            .push(Frame::new(true, OpCode::Text, Bytes::from_static(b"b")))
            .is_err());
    }

    #[test]
    fn bare_continuation_without_start_is_rejected() {
        let mut r = Reassembler::new();
        assert!(r
            .push(Frame::new(true, OpCode::Continuation, Bytes::from_static(b"a")))
            .is_err());
    }

    #[test]
    fn invalid_utf8_text_is_rejected() {
        let mut r = Reassembler::new();
        let frame = Frame::new(true, OpCode::Text, Bytes::from_static(&[0xFF, 0xFE]));
        assert!(r.push(frame).is_err());
    }
}
