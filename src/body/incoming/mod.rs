mod channel;

use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::Stream;
use http_body::{Body, Frame, SizeHint};

use self::channel::ChanBody;
pub(crate) use self::channel::Sender;

use crate::body::length::DecodedLength;
use crate::error::Error;

/// A boxed, already-typed byte stream, used wherever the crate needs to
/// hand back a lazy producer without naming its concrete type: the
/// [`Resource`](crate::resource::Resource) capability's `read()`, and any
/// [`Incoming`] built from an arbitrary stream via [`Incoming::wrap_stream`].
pub struct ByteStream(Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>);

impl ByteStream {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, Error>> + Send + 'static,
    {
        ByteStream(Box::pin(stream))
    }
}

impl Stream for ByteStream {
    type Item = Result<Bytes, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.0.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ByteStream")
    }
}

enum Kind {
    Empty,
    Once(Option<Bytes>),
    Chan(ChanBody),
    Wrapped(ByteStream),
    #[cfg(feature = "http2")]
    H2 {
        content_length: DecodedLength,
        data_done: bool,
        recv: h2::RecvStream,
    },
}

/// The single-subscription, backpressure-aware inbound body stream (spec
/// §4.3). Built by the connection (from the wire) or directly from an
/// arbitrary [`Stream`] for tests and in-process composition.
///
/// A `transform` registered before the first poll rewrites every chunk as
/// it's pulled; registering one after subscription has begun, or twice, is
/// a programming error surfaced as [`Error::new_double_subscription`] /
/// [`Error::new_transform_after_subscription`].
#[must_use = "streams do nothing unless polled"]
pub struct Incoming {
    kind: Kind,
    transform: Option<Box<dyn FnMut(Bytes) -> Bytes + Send>>,
    subscribed: AtomicBool,
}

impl Incoming {
    fn new(kind: Kind) -> Self {
        Incoming {
            kind,
            transform: None,
            subscribed: AtomicBool::new(false),
        }
    }

    pub fn empty() -> Self {
        Incoming::new(Kind::Empty)
    }

    pub(crate) fn channel(content_length: DecodedLength) -> (Sender, Self) {
        let (tx, chan) = ChanBody::new(content_length);
        (tx, Incoming::new(Kind::Chan(chan)))
    }

    pub fn wrap_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, Error>> + Send + 'static,
    {
        Incoming::new(Kind::Wrapped(ByteStream::new(stream)))
    }

    #[cfg(feature = "http2")]
    pub(crate) fn h2(recv: h2::RecvStream, mut content_length: DecodedLength) -> Self {
        if !content_length.is_exact() && recv.is_end_stream() {
            content_length = DecodedLength::ZERO;
        }
        Incoming::new(Kind::H2 {
            content_length,
            data_done: false,
            recv,
        })
    }

    /// Registers a per-chunk transform. Fails if this body has already been
    /// polled once.
    pub fn transform<F>(&mut self, f: F) -> Result<(), Error>
    where
        F: FnMut(Bytes) -> Bytes + Send + 'static,
    {
        if self.subscribed.load(Ordering::Acquire) {
            return Err(Error::new_transform_after_subscription());
        }
        if self.transform.is_some() {
            return Err(Error::new_double_subscription());
        }
        self.transform = Some(Box::new(f));
        Ok(())
    }

    fn mark_subscribed(&self) -> Result<(), Error> {
        if self.subscribed.swap(true, Ordering::AcqRel) {
            return Err(Error::new_double_subscription());
        }
        Ok(())
    }
}

impl Body for Incoming {
    type Data = Bytes;
    type Error = Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        if let Err(e) = self.mark_subscribed() {
            return Poll::Ready(Some(Err(e)));
        }

        let raw = match &mut self.kind {
            Kind::Empty => Poll::Ready(None),
            Kind::Once(slot) => Poll::Ready(slot.take().map(|b| Ok(Frame::data(b)))),
            Kind::Chan(chan) => chan.poll_frame(cx),
            Kind::Wrapped(stream) => Pin::new(stream)
                .poll_next(cx)
                .map(|opt| opt.map(|r| r.map(Frame::data))),
            #[cfg(feature = "http2")]
            Kind::H2 {
                data_done,
                recv,
                content_length,
            } => {
                if !*data_done {
                    match futures_util::ready!(recv.poll_data(cx)) {
                        Some(Ok(bytes)) => {
                            let _ = recv.flow_control().release_capacity(bytes.len());
                            content_length.sub_if(bytes.len() as u64);
                            return Poll::Ready(Some(Ok(Frame::data(bytes))));
                        }
                        Some(Err(e)) => return Poll::Ready(Some(Err(Error::new_h2(e)))),
                        None => *data_done = true,
                    }
                }
                match futures_util::ready!(recv.poll_trailers(cx)) {
                    Ok(t) => Poll::Ready(t.map(Frame::trailers).map(Ok)),
                    Err(e) => Poll::Ready(Some(Err(Error::new_h2(e)))),
                }
            }
        };

        match raw {
            Poll::Ready(Some(Ok(frame))) => {
                let frame = match (frame.into_data(), &mut self.transform) {
                    (Ok(data), Some(f)) => Frame::data(f(data)),
                    (Ok(data), None) => Frame::data(data),
                    (Err(frame), _) => frame,
                };
                Poll::Ready(Some(Ok(frame)))
            }
            other => other,
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.kind {
            Kind::Empty => true,
            Kind::Once(slot) => slot.is_none(),
            Kind::Chan(chan) => chan.is_end_stream(),
            Kind::Wrapped(_) => false,
            #[cfg(feature = "http2")]
            Kind::H2 { recv, .. } => recv.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.kind {
            Kind::Empty => SizeHint::with_exact(0),
            Kind::Once(Some(b)) => SizeHint::with_exact(b.len() as u64),
            Kind::Once(None) => SizeHint::with_exact(0),
            Kind::Chan(chan) => chan.size_hint(),
            Kind::Wrapped(_) => SizeHint::default(),
            #[cfg(feature = "http2")]
            Kind::H2 { content_length, .. } => content_length
                .into_opt()
                .map(SizeHint::with_exact)
                .unwrap_or_default(),
        }
    }
}

impl fmt::Debug for Incoming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Incoming").finish()
    }
}

impl From<Bytes> for Incoming {
    fn from(bytes: Bytes) -> Self {
        if bytes.is_empty() {
            Incoming::new(Kind::Once(None))
        } else {
            Incoming::new(Kind::Once(Some(bytes)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn once_body_yields_single_frame_then_ends() {
        let mut body = Incoming::from(Bytes::from_static(b"hello"));
        let collected = BodyExt::collect(&mut body).await.unwrap();
        assert_eq!(collected.to_bytes(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn transform_rewrites_chunks() {
        let mut body = Incoming::from(Bytes::from_static(b"abc"));
        body.transform(|b| {
            let mut v = b.to_vec();
            v.make_ascii_uppercase();
            Bytes::from(v)
        })
        .unwrap();
        let collected = BodyExt::collect(body).await.unwrap();
        assert_eq!(collected.to_bytes(), Bytes::from_static(b"ABC"));
    }

    #[tokio::test]
    async fn double_subscription_fails() {
        let mut body = Incoming::from(Bytes::from_static(b"x"));
        let _ = BodyExt::frame(&mut body).await;
        assert!(body.transform(|b| b).is_err());
    }
}
