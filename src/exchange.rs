//! The per-request (request, response, user-context) triple (spec §4.2,
//! §3 "Exchange"). Owned by exactly one connection; the HTTP/1.x and
//! HTTP/2 connection cores drive its state machine, the [`Controller`]
//! capability reads and writes through it.
//!
//! [`Controller`]: crate::controller::Controller

use http::{HeaderMap, Method, StatusCode, Uri, Version};

use crate::body::{Incoming, ResponseSink};
use crate::error::Error;
use crate::ext::CancelCause;

/// Default HTTP/2 `RST_STREAM` code used by [`Exchange::reset`] when the
/// caller doesn't pick one (spec §4.2).
pub const CANCEL: u32 = 0x8;

/// `Created → Starting → Headers-sent → Body-streaming → Completed | Reset
/// | Errored` (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Created,
    Starting,
    HeadersSent,
    BodyStreaming,
    Completed,
    Reset,
    Errored,
}

/// One request/response pair plus its user context (spec glossary).
#[derive(Debug)]
pub struct Exchange<Ctx = ()> {
    version: Version,
    request: http::Request<Incoming>,
    is_head: bool,
    response_status: StatusCode,
    response_headers: HeaderMap,
    response_sink: ResponseSink,
    response_trailers: Option<HeaderMap>,
    context: Ctx,
    state: State,
    cancel_cause: Option<CancelCause>,
    reset_code: Option<u32>,
}

impl<Ctx> Exchange<Ctx> {
    pub(crate) fn new(request: http::Request<Incoming>, context: Ctx) -> Self {
        let version = request.version();
        let is_head = request.method() == Method::HEAD;
        Exchange {
            version,
            request,
            is_head,
            response_status: StatusCode::OK,
            response_headers: HeaderMap::new(),
            response_sink: ResponseSink::default(),
            response_trailers: None,
            context,
            state: State::Starting,
            cancel_cause: None,
            reset_code: None,
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn uri(&self) -> &Uri {
        self.request.uri()
    }

    /// HEAD requests: the response body is still produced by the
    /// application but discarded on the wire (spec §4.2); connections check
    /// this flag before emitting DATA/body bytes.
    pub fn is_head(&self) -> bool {
        self.is_head
    }

    pub fn request(&self) -> &http::Request<Incoming> {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut http::Request<Incoming> {
        &mut self.request
    }

    pub fn context(&self) -> &Ctx {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Ctx {
        &mut self.context
    }

    /// Takes the protocol-upgrade handle stashed in the request's
    /// extensions by the connection core, if this connection supports
    /// upgrades (HTTP/1.x only). Resolves to an error immediately if the
    /// response never reaches `101 Switching Protocols`.
    pub fn on_upgrade(&mut self) -> crate::upgrade::OnUpgrade {
        self.request
            .extensions_mut()
            .remove::<crate::upgrade::OnUpgrade>()
            .unwrap_or_else(crate::upgrade::OnUpgrade::none)
    }

    /// Set when `reset()` was driven by an upstream failure rather than a
    /// direct application call (spec §4.2).
    pub fn cancel_cause(&self) -> Option<&CancelCause> {
        self.cancel_cause.as_ref()
    }

    pub fn status(&self) -> StatusCode {
        self.response_status
    }

    /// Sets the response status. Fails once headers have been marked
    /// written (spec §3's "once the response's headers are marked written,
    /// further mutation fails").
    pub fn set_status(&mut self, status: StatusCode) -> Result<(), Error> {
        self.ensure_headers_mutable()?;
        self.response_status = status;
        Ok(())
    }

    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    pub fn response_headers_mut(&mut self) -> Result<&mut HeaderMap, Error> {
        self.ensure_headers_mutable()?;
        Ok(&mut self.response_headers)
    }

    pub fn set_trailers(&mut self, trailers: HeaderMap) -> Result<(), Error> {
        self.ensure_headers_mutable()?;
        self.response_trailers = Some(trailers);
        Ok(())
    }

    pub(crate) fn take_trailers(&mut self) -> Option<HeaderMap> {
        self.response_trailers.take()
    }

    /// The write-once response body sink (spec §4.3). Mutation fails once
    /// headers have been marked written.
    pub fn body(&mut self) -> Result<&mut ResponseSink, Error> {
        self.ensure_headers_mutable()?;
        Ok(&mut self.response_sink)
    }

    fn ensure_headers_mutable(&self) -> Result<(), Error> {
        match self.state {
            State::Created | State::Starting => Ok(()),
            _ => Err(Error::new_headers_already_written()),
        }
    }

    pub(crate) fn mark_headers_sent(&mut self) {
        self.state = State::HeadersSent;
    }

    pub(crate) fn mark_body_streaming(&mut self) {
        self.state = State::BodyStreaming;
    }

    pub(crate) fn mark_completed(&mut self) {
        if !matches!(self.state, State::Reset | State::Errored) {
            self.state = State::Completed;
        }
    }

    pub(crate) fn into_response_parts(self) -> (StatusCode, HeaderMap, ResponseSink, Option<HeaderMap>) {
        (
            self.response_status,
            self.response_headers,
            self.response_sink,
            self.response_trailers,
        )
    }

    /// Cancels in-flight processing (spec §4.2). Returns the wire-level
    /// signal the connection should emit: HTTP/1.x forces a hard close if
    /// headers were already (partially) written, otherwise the remaining
    /// inbound body is drained/discarded; HTTP/2 emits `RST_STREAM(code)`.
    pub fn reset(&mut self, code: u32) -> u32 {
        self.reset_code = Some(code);
        self.state = State::Reset;
        code
    }

    pub(crate) fn fail(&mut self, cause: Error) {
        self.cancel_cause = Some(CancelCause::new(cause));
        self.state = State::Errored;
    }

    pub(crate) fn reset_code(&self) -> Option<u32> {
        self.reset_code
    }

    pub(crate) fn headers_already_sent(&self) -> bool {
        !matches!(self.state, State::Created | State::Starting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn exchange() -> Exchange<()> {
        let req = http::Request::builder()
            .method(Method::GET)
            .uri("/")
            .body(Incoming::from(Bytes::new()))
            .unwrap();
        Exchange::new(req, ())
    }

    #[test]
    fn status_mutation_fails_after_headers_sent() {
        let mut ex = exchange();
        ex.set_status(StatusCode::NO_CONTENT).unwrap();
        ex.mark_headers_sent();
        assert!(ex.set_status(StatusCode::OK).is_err());
    }

    #[test]
    fn reset_records_code_and_state() {
        let mut ex = exchange();
        let code = ex.reset(CANCEL);
        assert_eq!(code, CANCEL);
        assert_eq!(ex.state(), State::Reset);
    }

    #[test]
    fn head_request_is_flagged() {
        let req = http::Request::builder()
            .method(Method::HEAD)
            .uri("/")
            .body(Incoming::from(Bytes::new()))
            .unwrap();
        let ex = Exchange::new(req, ());
        assert!(ex.is_head());
    }
}
