//! HTTP upgrades (spec §4.4/§5): H2C and WebSocket both hand off a
//! connection's transport to a different protocol mid-stream. This module
//! holds the type-erased IO handle and the future an application awaits to
//! receive it once the HTTP state machine has finished writing the
//! switching-protocols response.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::oneshot;

use crate::common::io::Rewind;
use crate::error::Error;

pub(crate) trait Io: AsyncRead + AsyncWrite + Unpin + Send + Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> Io for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// An upgraded connection: the original transport, type-erased, with any
/// bytes the HTTP state machine had already read but not yet consumed.
pub struct Upgraded {
    io: Rewind<Box<dyn Io>>,
}

/// The deconstructed parts of an [`Upgraded`]: the concrete IO type
/// (recovered via [`Upgraded::downcast`]) plus the leftover read buffer.
#[derive(Debug)]
pub struct Parts<T> {
    pub io: T,
    pub read_buf: Bytes,
    _private: (),
}

impl Upgraded {
    pub(crate) fn new<T: AsyncRead + AsyncWrite + Unpin + Send + 'static>(
        io: T,
        read_buf: Bytes,
    ) -> Self {
        Upgraded {
            io: Rewind::new_buffered(Box::new(io), read_buf),
        }
    }

    /// Attempts to recover the original IO type. Returns `self` unchanged
    /// on a type mismatch.
    pub fn downcast<T: AsyncRead + AsyncWrite + Unpin + Send + 'static>(
        self,
    ) -> Result<Parts<T>, Self> {
        let (boxed, buf) = self.io.into_inner();
        if boxed.as_ref().as_any().is::<T>() {
            let raw: *mut (dyn Io) = Box::into_raw(boxed);
            let concrete: Box<T> = unsafe { Box::from_raw(raw as *mut T) };
            Ok(Parts {
                io: *concrete,
                read_buf: buf,
                _private: (),
            })
        } else {
            Err(Upgraded {
                io: Rewind::new_buffered(boxed, buf),
            })
        }
    }
}

impl AsyncRead for Upgraded {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_read(cx, buf)
    }
}

impl AsyncWrite for Upgraded {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.io).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_shutdown(cx)
    }
}

impl fmt::Debug for Upgraded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upgraded").finish()
    }
}

/// A future resolving to an [`Upgraded`] connection once the exchange this
/// was taken from has finished sending its switching-protocols response.
pub struct OnUpgrade {
    rx: Option<oneshot::Receiver<Result<Upgraded, Error>>>,
}

impl OnUpgrade {
    pub(crate) fn none() -> Self {
        OnUpgrade { rx: None }
    }

    pub(crate) fn is_none(&self) -> bool {
        self.rx.is_none()
    }
}

impl Future for OnUpgrade {
    type Output = Result<Upgraded, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.rx {
            Some(ref mut rx) => Pin::new(rx).poll(cx).map(|r| match r {
                Ok(inner) => inner,
                Err(_canceled) => Err(Error::new_canceled()),
            }),
            None => Poll::Ready(Err(Error::new_no_upgrade())),
        }
    }
}

impl fmt::Debug for OnUpgrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnUpgrade").finish()
    }
}

/// The sender half held by the connection driver, fulfilled once it hands
/// the transport off.
pub(crate) struct Pending {
    tx: oneshot::Sender<Result<Upgraded, Error>>,
}

pub(crate) fn pending() -> (Pending, OnUpgrade) {
    let (tx, rx) = oneshot::channel();
    (Pending { tx }, OnUpgrade { rx: Some(rx) })
}

impl Pending {
    pub(crate) fn fulfill(self, upgraded: Upgraded) {
        let _ = self.tx.send(Ok(upgraded));
    }

    /// Signals that no upgrade will occur on this exchange (handled
    /// manually, or simply never requested).
    pub(crate) fn manual(self) {
        let _ = self.tx.send(Err(Error::new_manual_upgrade()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn fulfilled_upgrade_downcasts_to_concrete_type() {
        let (pending, on_upgrade) = pending();
        let (a, _b) = duplex(64);
        pending.fulfill(Upgraded::new(a, Bytes::from_static(b"leftover")));

        let upgraded = on_upgrade.await.unwrap();
        let parts = upgraded.downcast::<tokio::io::DuplexStream>().unwrap();
        assert_eq!(parts.read_buf, Bytes::from_static(b"leftover"));
    }

    #[tokio::test]
    async fn manual_resolves_to_no_upgrade_error() {
        let (pending, on_upgrade) = pending();
        pending.manual();
        let err = on_upgrade.await.unwrap_err();
        assert!(format!("{err}").contains("upgrade"));
    }

    #[tokio::test]
    async fn none_resolves_immediately_with_error() {
        let on_upgrade = OnUpgrade::none();
        assert!(on_upgrade.is_none());
        let err = on_upgrade.await.unwrap_err();
        assert!(format!("{err}").contains("upgrade"));
    }
}
