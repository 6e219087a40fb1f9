//! Close protocol (RFC 6455 §7): status codes, the close payload, and the
//! two-sided close handshake with timeouts per spec §6
//! (`ws_close_timeout_ms`, `ws_inbound_close_frame_timeout_ms`).

use bytes::{Buf, Bytes};

use crate::websocket::frame::Frame;

/// The status codes RFC 6455 §7.4.1 defines, plus the registry's
/// reserved-for-library-use range represented as an opaque `u16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    Normal,
    GoingAway,
    ProtocolError,
    Unsupported,
    NoStatusReceived,
    Abnormal,
    InvalidPayload,
    PolicyViolation,
    TooLarge,
    MandatoryExtension,
    InternalError,
    ServiceRestart,
    TryAgainLater,
    TlsHandshake,
    Other(u16),
}

impl CloseCode {
    pub fn as_u16(self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::Unsupported => 1003,
            CloseCode::NoStatusReceived => 1005,
            CloseCode::Abnormal => 1006,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::TooLarge => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::ServiceRestart => 1012,
            CloseCode::TryAgainLater => 1013,
            CloseCode::TlsHandshake => 1015,
            CloseCode::Other(code) => code,
        }
    }

    pub fn from_u16(code: u16) -> CloseCode {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::Unsupported,
            1005 => CloseCode::NoStatusReceived,
            1006 => CloseCode::Abnormal,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::TooLarge,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalError,
            1012 => CloseCode::ServiceRestart,
            1013 => CloseCode::TryAgainLater,
            1015 => CloseCode::TlsHandshake,
            other => CloseCode::Other(other),
        }
    }

    /// 1005/1006/1015 are reserved: RFC 6455 §7.4.1 forbids sending them on
    /// the wire, they only describe the *absence* of a code.
    pub fn is_sendable(self) -> bool {
        !matches!(
            self,
            CloseCode::NoStatusReceived | CloseCode::Abnormal | CloseCode::TlsHandshake
        )
    }
}

/// A parsed close frame payload: an optional code plus UTF-8 reason text.
/// Absent entirely (`Bytes::is_empty()`), per §7.1.5, means code 1005.
#[derive(Debug, Clone)]
pub struct CloseFrame {
    pub code: CloseCode,
    pub reason: String,
}

impl CloseFrame {
    pub fn parse(mut payload: Bytes) -> Result<CloseFrame, CloseCode> {
        if payload.is_empty() {
            return Ok(CloseFrame {
                code: CloseCode::NoStatusReceived,
                reason: String::new(),
            });
        }
        if payload.len() < 2 {
            return Err(CloseCode::ProtocolError);
        }
        let code = payload.get_u16();
        let reason = String::from_utf8(payload.to_vec()).map_err(|_| CloseCode::InvalidPayload)?;
        let code = CloseCode::from_u16(code);
        if matches!(code, CloseCode::NoStatusReceived | CloseCode::Abnormal | CloseCode::TlsHandshake)
            || (1016..=2999).contains(&code.as_u16())
        {
            return Err(CloseCode::ProtocolError);
        }
        Ok(CloseFrame { code, reason })
    }

    pub fn into_frame(self) -> Frame {
        Frame::close(self.code.as_u16(), &self.reason)
    }
}

/// Tracks which side(s) of the close handshake have sent a close frame.
/// The connection is fully closed once both have, or once a timeout fires.
#[derive(Debug, Default)]
pub struct CloseState {
    sent: bool,
    received: bool,
}

impl CloseState {
    pub fn new() -> CloseState {
        CloseState::default()
    }

    pub fn note_sent(&mut self) {
        self.sent = true;
    }

    pub fn note_received(&mut self) {
        self.received = true;
    }

    pub fn sent(&self) -> bool {
        self.sent
    }

    pub fn received(&self) -> bool {
        self.received
    }

    /// True once both sides have exchanged a close frame and the
    /// underlying transport can be shut down immediately.
    pub fn complete(&self) -> bool {
        self.sent && self.received
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_parses_as_no_status() {
        let frame = CloseFrame::parse(Bytes::new()).unwrap();
        assert_eq!(frame.code, CloseCode::NoStatusReceived);
    }

    #[test]
    fn single_byte_payload_is_protocol_error() {
        assert_eq!(
            CloseFrame::parse(Bytes::from_static(b"a")).unwrap_err(),
            CloseCode::ProtocolError
        );
    }

    #[test]
    fn reserved_code_on_wire_is_protocol_error() {
        let mut payload = bytes::BytesMut::new();
        payload.extend_from_slice(&1006u16.to_be_bytes());
        assert_eq!(
            CloseFrame::parse(payload.freeze()).unwrap_err(),
            CloseCode::ProtocolError
        );
    }

    #[test]
    fn valid_code_and_reason_round_trip_through_a_frame() {
        let close = CloseFrame {
            code: CloseCode::Normal,
            reason: "bye".to_owned(),
        };
        let frame = close.into_frame();
        let parsed = CloseFrame::parse(frame.payload).unwrap();
        assert_eq!(parsed.code, CloseCode::Normal);
        assert_eq!(parsed.reason, "bye");
    }

    #[test]
    fn close_state_completes_once_both_sides_sent() {
        let mut state = CloseState::new();
        assert!(!state.complete());
        state.note_sent();
        assert!(!state.complete());
        state.note_received();
        assert!(state.complete());
    }
}
