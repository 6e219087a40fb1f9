use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, Bytes};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Wraps an IO object, replaying a prefix of previously-read bytes before
/// resuming reads from the underlying transport.
///
/// Used by the H2C direct-preface detector (the first 24 bytes read while
/// probing for the HTTP/2 preface must still be visible to whichever
/// protocol ends up being installed) and by [`crate::upgrade::Upgraded`]
/// (an HTTP/1.x connection may have already buffered bytes belonging to the
/// upgraded protocol).
#[derive(Debug)]
pub struct Rewind<T> {
    pre: Option<Bytes>,
    inner: T,
}

impl<T> Rewind<T> {
    /// Wrap `io` with no rewind buffer.
    pub fn new(io: T) -> Self {
        Rewind {
            pre: None,
            inner: io,
        }
    }

    /// Wrap `io`, replaying `buf` before any further reads from `io`.
    pub fn new_buffered(io: T, buf: Bytes) -> Self {
        Rewind {
            pre: if buf.is_empty() { None } else { Some(buf) },
            inner: io,
        }
    }

    /// Push additional already-read bytes to be replayed ahead of the
    /// underlying transport's bytes.
    pub fn rewind(&mut self, bytes: Bytes) {
        debug_assert!(self.pre.is_none(), "rewind overwriting un-consumed buffer");
        self.pre = Some(bytes);
    }

    /// Consume self, returning the inner IO object and any un-replayed
    /// buffered bytes.
    pub fn into_inner(self) -> (T, Bytes) {
        (self.inner, self.pre.unwrap_or_default())
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for Rewind<T> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        if let Some(mut prefix) = self.pre.take() {
            if !prefix.is_empty() {
                let n = std::cmp::min(prefix.len(), buf.remaining());
                buf.put_slice(&prefix[..n]);
                prefix.advance(n);
                if !prefix.is_empty() {
                    self.pre = Some(prefix);
                }
                return Poll::Ready(Ok(()));
            }
        }
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for Rewind<T> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn replays_prefix_before_inner() {
        let inner = std::io::Cursor::new(b"world".to_vec());
        let mut rewind = Rewind::new_buffered(inner, Bytes::from_static(b"hello "));

        let mut out = String::new();
        rewind.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "hello world");
    }
}
