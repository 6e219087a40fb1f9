//! Buffered reader/writer over the connection's I/O, with the read/flush
//! coalescing latch from spec §4.4 ("During an inbound read turn... writes
//! are accumulated and flushed at the end of the read turn").

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::common::watch::Coalesce;
use crate::error::Error;

pub(crate) const INIT_BUFFER_SIZE: usize = 8 * 1024;
pub(crate) const DEFAULT_MAX_BUFFER_SIZE: usize = 8 * 1024 + 4096 * 100;

pub(crate) struct Buffered<T> {
    io: T,
    read_buf: BytesMut,
    write_buf: BytesMut,
    max_buf_size: usize,
    coalesce: Coalesce,
}

impl<T> Buffered<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(io: T) -> Self {
        Buffered {
            io,
            read_buf: BytesMut::with_capacity(INIT_BUFFER_SIZE),
            write_buf: BytesMut::new(),
            max_buf_size: DEFAULT_MAX_BUFFER_SIZE,
            coalesce: Coalesce::default(),
        }
    }

    pub(crate) fn read_buf(&self) -> &BytesMut {
        &self.read_buf
    }

    pub(crate) fn read_buf_mut(&mut self) -> &mut BytesMut {
        &mut self.read_buf
    }

    /// Pulls more bytes from the transport into the read buffer. Returns
    /// `Ok(0)` on EOF.
    pub(crate) async fn fill_read_buf(&mut self) -> Result<usize, Error> {
        if self.read_buf.len() >= self.max_buf_size {
            return Err(Error::new_decode(crate::error::Decode::TooLarge));
        }
        if self.read_buf.capacity() == self.read_buf.len() {
            self.read_buf.reserve(INIT_BUFFER_SIZE);
        }
        self.io
            .read_buf(&mut self.read_buf)
            .await
            .map_err(Error::new_io)
    }

    /// Queues bytes to write. Outside a read turn these should be followed
    /// by a `flush()`; during one, the caller accumulates and relies on the
    /// connection driver to flush once the turn ends.
    pub(crate) fn queue_write(&mut self, bytes: &[u8]) {
        self.write_buf.extend_from_slice(bytes);
    }

    pub(crate) fn has_pending_write(&self) -> bool {
        !self.write_buf.is_empty()
    }

    pub(crate) async fn flush(&mut self) -> Result<(), Error> {
        while self.write_buf.has_remaining() {
            let n = self
                .io
                .write(self.write_buf.chunk())
                .await
                .map_err(Error::new_io)?;
            if n == 0 {
                return Err(Error::new_io(std::io::Error::from(
                    std::io::ErrorKind::WriteZero,
                )));
            }
            self.write_buf.advance(n);
        }
        self.io.flush().await.map_err(Error::new_io)?;
        self.write_buf.clear();
        Ok(())
    }

    pub(crate) async fn shutdown(&mut self) -> Result<(), Error> {
        self.io.shutdown().await.map_err(Error::new_io)
    }

    pub(crate) fn enter_read_turn(&self) {
        self.coalesce.enter_read();
    }

    /// Requests a flush per the read/flush coalescing latch: returns `true`
    /// if the caller should flush right away, `false` if a read turn is in
    /// progress and the flush will happen automatically once it ends.
    pub(crate) fn request_flush(&self) -> bool {
        self.coalesce.request_flush()
    }

    /// Returns whether a flush was requested during the read turn just
    /// ending (spec §4.4's `flush` latch).
    pub(crate) fn exit_read_turn(&self) -> bool {
        self.coalesce.exit_read()
    }

    pub(crate) fn into_inner(self) -> T {
        self.io
    }

    /// Detaches the transport and whatever's left unconsumed in the read
    /// buffer, for handing off to a completed protocol upgrade (spec §4.6):
    /// bytes the peer already sent past the `101` response (e.g. the first
    /// WebSocket frame) belong to the new protocol, not this connection.
    pub(crate) fn into_parts(self) -> (T, bytes::Bytes) {
        (self.io, self.read_buf.freeze())
    }
}
