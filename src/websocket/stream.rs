//! Ties the frame codec, message reassembler, and close protocol into a
//! single duplex stream over an upgraded connection (spec §4: "inbound
//! /outbound frame streams, close protocol with timeouts").

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::WebSocketConfig;
use crate::error::Error;
use crate::rt::Timer;
use crate::websocket::close::CloseState;
use crate::websocket::frame::{self, Frame, OpCode};
use crate::websocket::message::{Message, Reassembler};

#[cfg(feature = "compression")]
use crate::websocket::extensions::PermessageDeflate;

/// A fully negotiated WebSocket connection: reads frames off `io` into
/// whole [`Message`]s and writes messages back out as frames, handling
/// ping/pong and the close handshake internally.
pub struct WebSocketStream<T> {
    io: T,
    read_buf: BytesMut,
    write_buf: BytesMut,
    reassembler: Reassembler,
    close: CloseState,
    cfg: WebSocketConfig,
    timer: Arc<dyn Timer>,
    #[cfg(feature = "compression")]
    deflate: Option<PermessageDeflate>,
}

impl<T> std::fmt::Debug for WebSocketStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketStream")
            .field("close", &self.close)
            .finish()
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> WebSocketStream<T> {
    pub fn new(io: T, leftover: Bytes, cfg: WebSocketConfig, timer: Arc<dyn Timer>) -> Self {
        let mut read_buf = BytesMut::with_capacity(leftover.len().max(4096));
        read_buf.extend_from_slice(&leftover);
        WebSocketStream {
            io,
            read_buf,
            write_buf: BytesMut::new(),
            reassembler: Reassembler::new(),
            close: CloseState::new(),
            cfg,
            timer,
            #[cfg(feature = "compression")]
            deflate: None,
        }
    }

    #[cfg(feature = "compression")]
    pub fn set_deflate(&mut self, deflate: PermessageDeflate) {
        self.deflate = Some(deflate);
    }

    /// Reads and reassembles the next message, automatically replying to
    /// pings and to the peer's close frame (RFC 6455 §5.5.2/§7.1.1). The
    /// caller still receives the `Ping`/`Close` as a [`Message`] for
    /// observability; it does not need to reply itself.
    pub async fn recv(&mut self) -> Result<Option<Message>, Error> {
        loop {
            if let Some(frame) = self.try_decode_frame()? {
                if let Some(message) = self.handle_frame(frame).await? {
                    return Ok(Some(message));
                }
                continue;
            }
            let n = self
                .io
                .read_buf(&mut self.read_buf)
                .await
                .map_err(Error::new_io)?;
            if n == 0 {
                return if self.close.complete() {
                    Ok(None)
                } else {
                    Err(Error::new_connection_closed())
                };
            }
        }
    }

    fn try_decode_frame(&mut self) -> Result<Option<Frame>, Error> {
        frame::decode(&mut self.read_buf, !self.cfg.allow_mask_mismatch, self.cfg.max_frame_size)
    }

    async fn handle_frame(&mut self, mut frame: Frame) -> Result<Option<Message>, Error> {
        #[cfg(feature = "compression")]
        if frame.rsv1 && (frame.opcode == OpCode::Text || frame.opcode == OpCode::Binary) {
            if let Some(deflate) = self.deflate.as_mut() {
                frame.payload = deflate.inflate(&frame.payload)?;
                frame.rsv1 = false;
            } else {
                return Err(Error::new_frame());
            }
        }
        #[cfg(not(feature = "compression"))]
        if frame.rsv1 {
            return Err(Error::new_frame());
        }

        let is_close = frame.opcode == OpCode::Close;
        let message = self.reassembler.push(frame)?;

        if is_close {
            self.close.note_received();
            if !self.close.sent() {
                let reply = match &message {
                    Some(Message::Close(Some(c))) => {
                        Frame::close(c.code.as_u16(), &c.reason)
                    }
                    _ => Frame::new(true, OpCode::Close, Bytes::new()),
                };
                self.write_frame(&reply).await?;
                self.close.note_sent();
            }
        } else if let Some(Message::Ping(payload)) = &message {
            let pong = Frame::new(true, OpCode::Pong, payload.clone());
            self.write_frame(&pong).await?;
        }

        Ok(message)
    }

    /// Sends one message as a single (unfragmented) frame.
    pub async fn send(&mut self, message: Message) -> Result<(), Error> {
        if matches!(message, Message::Close(_)) {
            self.close.note_sent();
        }
        #[cfg(feature = "compression")]
        let frame = self.compress_if_negotiated(message);
        #[cfg(not(feature = "compression"))]
        let frame = message.into_frame();
        self.write_frame(&frame).await
    }

    #[cfg(feature = "compression")]
    fn compress_if_negotiated(&mut self, message: Message) -> Frame {
        let compressible = matches!(message, Message::Text(_) | Message::Binary(_));
        let mut frame = message.into_frame();
        if compressible {
            if let Some(deflate) = self.deflate.as_mut() {
                if let Ok(compressed) = deflate.deflate(&frame.payload) {
                    frame.payload = compressed;
                    frame.rsv1 = true;
                }
            }
        }
        frame
    }

    async fn write_frame(&mut self, frame: &Frame) -> Result<(), Error> {
        self.write_buf.clear();
        frame::encode(frame, None, &mut self.write_buf);
        self.io
            .write_all(&self.write_buf)
            .await
            .map_err(Error::new_io)?;
        self.io.flush().await.map_err(Error::new_io)
    }

    /// Initiates (or completes, if the peer already sent its close frame)
    /// the close handshake, per spec §6's `ws_close_timeout_ms`. Returns
    /// once both sides have exchanged a close frame or the timeout
    /// elapses — either way the transport can then be shut down.
    pub async fn close(&mut self, code: crate::websocket::close::CloseCode, reason: &str) -> Result<(), Error> {
        if !self.close.sent() {
            self.write_frame(&Frame::close(code.as_u16(), reason)).await?;
            self.close.note_sent();
        }

        let timeout = self.cfg.close_timeout;
        let mut deadline = self.timer.sleep(timeout);

        while !self.close.complete() {
            tokio::select! {
                _ = &mut deadline => break,
                recv = self.recv_for_close() => {
                    match recv {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => return Err(e),
                    }
                }
            }
        }
        Ok(())
    }

    async fn recv_for_close(&mut self) -> Result<bool, Error> {
        match self.recv().await? {
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }

    /// Consumes the stream, returning the underlying IO object.
    pub fn into_inner(self) -> T {
        self.io
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rt::TokioTimer;
    use crate::websocket::close::CloseFrame;
    use tokio::io::duplex;

    fn cfg() -> WebSocketConfig {
        WebSocketConfig::default()
    }

    #[tokio::test]
    async fn unmasked_client_frame_round_trips_a_text_message() {
        let (client, server) = duplex(4096);
        let mut ws = WebSocketStream::new(server, Bytes::new(), cfg(), Arc::new(TokioTimer));

        let mut raw = BytesMut::new();
        frame::encode(
            &Frame::new(true, OpCode::Text, Bytes::from_static(b"hi")),
            Some([1, 2, 3, 4]),
            &mut raw,
        );
        let mut client = client;
        client.write_all(&raw).await.unwrap();

        let msg = ws.recv().await.unwrap().unwrap();
        assert!(matches!(msg, Message::Text(s) if s == "hi"));
    }

    #[tokio::test]
    async fn ping_triggers_automatic_pong() {
        let (mut client, server) = duplex(4096);
        let mut ws = WebSocketStream::new(server, Bytes::new(), cfg(), Arc::new(TokioTimer));

        let mut raw = BytesMut::new();
        frame::encode(
            &Frame::new(true, OpCode::Ping, Bytes::from_static(b"p")),
            Some([1, 2, 3, 4]),
            &mut raw,
        );
        client.write_all(&raw).await.unwrap();

        let msg = ws.recv().await.unwrap().unwrap();
        assert!(matches!(msg, Message::Ping(_)));

        let mut reply = [0u8; 64];
        let n = client.read(&mut reply).await.unwrap();
        let mut reply_buf = BytesMut::from(&reply[..n]);
        let decoded = frame::decode(&mut reply_buf, false, 1 << 20).unwrap().unwrap();
        assert_eq!(decoded.opcode, OpCode::Pong);
    }

    #[tokio::test]
    async fn peer_close_frame_gets_echoed_and_marks_received() {
        let (mut client, server) = duplex(4096);
        let mut ws = WebSocketStream::new(server, Bytes::new(), cfg(), Arc::new(TokioTimer));

        let mut raw = BytesMut::new();
        frame::encode(
            &CloseFrame {
                code: crate::websocket::close::CloseCode::Normal,
                reason: String::new(),
            }
            .into_frame(),
            Some([9, 9, 9, 9]),
            &mut raw,
        );
        client.write_all(&raw).await.unwrap();

        let msg = ws.recv().await.unwrap().unwrap();
        assert!(matches!(msg, Message::Close(_)));

        let mut reply = [0u8; 64];
        let n = client.read(&mut reply).await.unwrap();
        assert!(n > 0);
    }
}
