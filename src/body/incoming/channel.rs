//! The HTTP/1.x inbound body sink: the connection pushes decoded chunks in
//! here as they arrive off the wire; the exchange's [`Incoming`] pulls them
//! out under backpressure (spec §4.3, §4.4).

use std::task::{Context, Poll};

use bytes::Bytes;
use http::HeaderMap;
use http_body::Frame;
use tokio::sync::{mpsc, oneshot};

use crate::body::length::DecodedLength;
use crate::error::Error;

pub(super) struct ChanBody {
    content_length: DecodedLength,
    data_rx: mpsc::Receiver<Result<Bytes, Error>>,
    trailers_rx: Option<oneshot::Receiver<HeaderMap>>,
}

impl ChanBody {
    pub(super) fn new(content_length: DecodedLength) -> (Sender, Self) {
        let (data_tx, data_rx) = mpsc::channel(16);
        let (trailers_tx, trailers_rx) = oneshot::channel();

        let tx = Sender {
            data_tx,
            trailers_tx: Some(trailers_tx),
        };
        let rx = ChanBody {
            content_length,
            data_rx,
            trailers_rx: Some(trailers_rx),
        };
        (tx, rx)
    }

    pub(super) fn poll_frame(
        &mut self,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Error>>> {
        match self.data_rx.poll_recv(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                self.content_length.sub_if(chunk.len() as u64);
                return Poll::Ready(Some(Ok(Frame::data(chunk))));
            }
            Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
            Poll::Ready(None) => {}
            Poll::Pending => return Poll::Pending,
        }

        if let Some(trailers_rx) = &mut self.trailers_rx {
            match std::pin::Pin::new(trailers_rx).poll(cx) {
                Poll::Ready(Ok(trailers)) => {
                    self.trailers_rx = None;
                    return Poll::Ready(Some(Ok(Frame::trailers(trailers))));
                }
                Poll::Ready(Err(_)) => {
                    self.trailers_rx = None;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
        Poll::Ready(None)
    }

    pub(super) fn is_end_stream(&self) -> bool {
        self.content_length == DecodedLength::ZERO
    }

    pub(super) fn size_hint(&self) -> http_body::SizeHint {
        self.content_length
            .into_opt()
            .map(http_body::SizeHint::with_exact)
            .unwrap_or_default()
    }
}

use std::future::Future as _;

/// The producing half of a channel-backed [`Incoming`](super::Incoming),
/// owned by the HTTP/1.x connection while it decodes a request/response
/// body off the wire.
#[derive(Debug)]
pub(crate) struct Sender {
    data_tx: mpsc::Sender<Result<Bytes, Error>>,
    trailers_tx: Option<oneshot::Sender<HeaderMap>>,
}

impl Sender {
    pub(crate) async fn send_data(&mut self, chunk: Bytes) -> Result<(), Error> {
        self.data_tx
            .send(Ok(chunk))
            .await
            .map_err(|_| Error::new_channel_closed())
    }

    pub(crate) fn send_trailers(&mut self, trailers: HeaderMap) {
        if let Some(tx) = self.trailers_tx.take() {
            let _ = tx.send(trailers);
        }
    }

    /// Completes the sink with an error, observed by the subscriber as the
    /// stream's final item rather than a clean end-of-stream.
    pub(crate) async fn abort(mut self, err: Error) {
        let _ = self.data_tx.send(Err(err)).await;
    }
}

impl std::fmt::Debug for ChanBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChanBody").finish()
    }
}
