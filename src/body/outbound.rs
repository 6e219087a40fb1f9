//! The write-once outbound body sink (spec §4.3): `empty`, `raw`, `string`,
//! `resource`, and `sse` producers, each installed through [`ResponseSink`]
//! which enforces the "at most one setter succeeds" invariant.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::SystemTime;

use bytes::Bytes;
use futures_core::Stream;
use http_body::{Body, Frame, SizeHint};

use crate::body::incoming::ByteStream;
use crate::error::Error;
use crate::resource::Resource;

/// One Server-Sent Event, serialised per spec §4.3: `id:`, `event:`, `:`
/// comment lines, one or more `data:` lines, terminated by a blank line.
#[derive(Debug, Clone, Default)]
pub struct SseEvent {
    pub id: Option<String>,
    pub event: Option<String>,
    pub comment: Option<String>,
    pub data: String,
}

impl SseEvent {
    pub fn new(data: impl Into<String>) -> Self {
        SseEvent {
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn event(mut self, name: impl Into<String>) -> Self {
        self.event = Some(name.into());
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    fn encode(&self) -> Bytes {
        let mut out = String::new();
        if let Some(comment) = &self.comment {
            for line in comment.split(['\n', '\r']).filter(|l| !l.is_empty()) {
                out.push(':');
                out.push_str(line);
                out.push_str("\r\n");
            }
        }
        if let Some(id) = &self.id {
            out.push_str("id:");
            out.push_str(id);
            out.push_str("\r\n");
        }
        if let Some(event) = &self.event {
            out.push_str("event:");
            out.push_str(event);
            out.push_str("\r\n");
        }
        // CR and LF inside `data` are normalised to line breaks, each
        // re-emitted with its own `data:` prefix, per spec §4.3.
        for line in self.data.split(['\n', '\r']) {
            out.push_str("data:");
            out.push_str(line);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        Bytes::from(out)
    }
}

type ResourceOpen = Pin<Box<dyn Future<Output = Result<ByteStream, Error>> + Send>>;

enum ResourceState {
    Pending(Arc<dyn Resource>),
    Opening(ResourceOpen),
    Streaming(ByteStream),
    Done,
}

enum Kind {
    Empty,
    Once(Option<Bytes>),
    Stream(ByteStream),
    Resource(ResourceState),
    Sse(Pin<Box<dyn Stream<Item = SseEvent> + Send>>),
}

/// An outbound body producer (spec §4.3). Constructed through
/// [`ResponseSink`]; never built directly by application code in a way that
/// bypasses the write-once invariant.
pub struct OutgoingBody {
    kind: Kind,
    resource_meta: Option<Arc<dyn Resource>>,
}

impl OutgoingBody {
    pub(crate) fn empty() -> Self {
        OutgoingBody {
            kind: Kind::Empty,
            resource_meta: None,
        }
    }

    pub(crate) fn once(bytes: Bytes) -> Self {
        OutgoingBody {
            kind: Kind::Once(Some(bytes)),
            resource_meta: None,
        }
    }

    pub(crate) fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, Error>> + Send + 'static,
    {
        OutgoingBody {
            kind: Kind::Stream(ByteStream::new(stream)),
            resource_meta: None,
        }
    }

    pub(crate) fn resource(resource: Arc<dyn Resource>) -> Self {
        OutgoingBody {
            resource_meta: Some(resource.clone()),
            kind: Kind::Resource(ResourceState::Pending(resource)),
        }
    }

    pub(crate) fn sse<S>(events: S) -> Self
    where
        S: Stream<Item = SseEvent> + Send + 'static,
    {
        OutgoingBody {
            kind: Kind::Sse(Box::pin(events)),
            resource_meta: None,
        }
    }

    /// True for the single-buffer fast path (spec §4.3's "single" flag),
    /// letting the connection skip the chunked-encoding machinery.
    pub fn is_single(&self) -> bool {
        matches!(self.kind, Kind::Once(_) | Kind::Empty)
    }

    pub fn content_length_hint(&self) -> Option<u64> {
        match &self.kind {
            Kind::Empty => Some(0),
            Kind::Once(Some(b)) => Some(b.len() as u64),
            Kind::Once(None) => Some(0),
            _ => self.resource_meta.as_ref().and_then(|r| r.size()),
        }
    }

    pub fn content_type_hint(&self) -> Option<String> {
        match &self.kind {
            Kind::Sse(_) => Some("text/event-stream".to_owned()),
            _ => self
                .resource_meta
                .as_ref()
                .and_then(|r| r.media_type())
                .map(str::to_owned),
        }
    }

    pub fn last_modified_hint(&self) -> Option<SystemTime> {
        self.resource_meta.as_ref().and_then(|r| r.last_modified())
    }
}

impl Body for OutgoingBody {
    type Data = Bytes;
    type Error = Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match &mut self.kind {
            Kind::Empty => Poll::Ready(None),
            Kind::Once(slot) => Poll::Ready(slot.take().map(|b| Ok(Frame::data(b)))),
            Kind::Stream(stream) => Pin::new(stream)
                .poll_next(cx)
                .map(|opt| opt.map(|r| r.map(Frame::data))),
            Kind::Sse(stream) => stream
                .as_mut()
                .poll_next(cx)
                .map(|opt| opt.map(|event| Ok(Frame::data(event.encode())))),
            Kind::Resource(state) => loop {
                match state {
                    ResourceState::Pending(resource) => {
                        let resource = resource.clone();
                        // The async block owns `resource` and borrows it
                        // across the `.await`, so the future is self
                        // contained despite `Resource::read` taking `&self`.
                        *state = ResourceState::Opening(Box::pin(async move {
                            resource.read().await
                        }));
                    }
                    ResourceState::Opening(fut) => match fut.as_mut().poll(cx) {
                        Poll::Ready(Ok(stream)) => *state = ResourceState::Streaming(stream),
                        Poll::Ready(Err(e)) => {
                            *state = ResourceState::Done;
                            return Poll::Ready(Some(Err(e)));
                        }
                        Poll::Pending => return Poll::Pending,
                    },
                    ResourceState::Streaming(stream) => {
                        return match futures_util::ready!(Pin::new(stream).poll_next(cx)) {
                            Some(Ok(chunk)) => Poll::Ready(Some(Ok(Frame::data(chunk)))),
                            Some(Err(e)) => Poll::Ready(Some(Err(e))),
                            None => {
                                *state = ResourceState::Done;
                                Poll::Ready(None)
                            }
                        };
                    }
                    ResourceState::Done => return Poll::Ready(None),
                }
            },
        }
    }

    fn is_end_stream(&self) -> bool {
        matches!(self.kind, Kind::Empty | Kind::Once(None))
    }

    fn size_hint(&self) -> SizeHint {
        self.content_length_hint()
            .map(SizeHint::with_exact)
            .unwrap_or_default()
    }
}

impl fmt::Debug for OutgoingBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutgoingBody").finish()
    }
}

/// Owns the write-once slot for an exchange's response body (spec §4.3): at
/// most one producer method succeeds; the rest fail with
/// [`Error::new_response_data_already_set`].
#[derive(Default)]
pub struct ResponseSink {
    body: Option<OutgoingBody>,
}

impl ResponseSink {
    pub fn is_set(&self) -> bool {
        self.body.is_some()
    }

    pub fn empty(&mut self) -> Result<(), Error> {
        self.set(OutgoingBody::empty())
    }

    pub fn raw(&mut self, bytes: Bytes) -> Result<(), Error> {
        self.set(OutgoingBody::once(bytes))
    }

    pub fn raw_stream<S>(&mut self, stream: S) -> Result<(), Error>
    where
        S: Stream<Item = Result<Bytes, Error>> + Send + 'static,
    {
        self.set(OutgoingBody::stream(stream))
    }

    pub fn string(&mut self, s: impl Into<String>) -> Result<(), Error> {
        self.set(OutgoingBody::once(Bytes::from(s.into())))
    }

    pub fn resource(&mut self, resource: Arc<dyn Resource>) -> Result<(), Error> {
        self.set(OutgoingBody::resource(resource))
    }

    pub fn sse<S>(&mut self, events: S) -> Result<(), Error>
    where
        S: Stream<Item = SseEvent> + Send + 'static,
    {
        self.set(OutgoingBody::sse(events))
    }

    fn set(&mut self, body: OutgoingBody) -> Result<(), Error> {
        if self.body.is_some() {
            return Err(Error::new_response_data_already_set());
        }
        self.body = Some(body);
        Ok(())
    }

    pub fn into_body(self) -> OutgoingBody {
        self.body.unwrap_or_else(OutgoingBody::empty)
    }
}

impl fmt::Debug for ResponseSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseSink")
            .field("is_set", &self.is_set())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_setter_fails() {
        let mut sink = ResponseSink::default();
        sink.empty().unwrap();
        assert!(sink.string("too late").is_err());
    }

    #[test]
    fn sse_event_encodes_multiline_data() {
        let event = SseEvent::new("line one\nline two").id("42").event("tick");
        let encoded = String::from_utf8(event.encode().to_vec()).unwrap();
        assert_eq!(
            encoded,
            "id:42\r\nevent:tick\r\ndata:line one\r\ndata:line two\r\n\r\n"
        );
    }
}
