//! Error and Result module.
//!
//! The taxonomy follows the kinds enumerated in the design's error-handling
//! section: protocol-decode, protocol-frame, flow-control-violation,
//! idle-timeout, handler-failure, connection-closed, reset-by-peer,
//! shutdown-in-progress, and the routing failures (route-not-found,
//! route-not-acceptable, method-not-allowed).

use std::error::Error as StdError;
use std::fmt;

use http::StatusCode;

/// Result type returned from methods that can fail with a [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

type Cause = Box<dyn StdError + Send + Sync>;

/// Represents an error that occurred handling an HTTP connection, exchange,
/// or routing resolution.
pub struct Error {
    inner: Box<ErrorImpl>,
}

struct ErrorImpl {
    kind: Kind,
    cause: Option<Cause>,
}

#[derive(Debug)]
pub(crate) enum Kind {
    /// Malformed start line, header, or chunk framing (§7 protocol-decode).
    Decode(Decode),
    /// HTTP/2 framing violation, or a WebSocket bad opcode (§7 protocol-frame).
    Frame,
    /// A flow-control window was violated by the peer.
    FlowControl,
    /// The connection's idle timer elapsed.
    IdleTimeout,
    /// Raised by a `Controller`; carries the HTTP status that should be
    /// reported to the peer.
    Handler(StatusCode),
    /// The peer reset a stream, or sent `RST_STREAM`.
    ResetByPeer,
    /// The connection was closed, either by the peer (EOF) or locally.
    ConnectionClosed,
    /// `shutdown()` was called and is in progress or already completed.
    ShutdownInProgress,
    /// No route matched the request's path/method/etc.
    RouteNotFound,
    /// Routes matched the path and method but none could produce an
    /// acceptable representation.
    RouteNotAcceptable,
    /// Routes matched every criterion except method.
    MethodNotAllowed,
    /// The exchange was explicitly canceled via `reset()`.
    Canceled,
    /// A body write was aborted by the sender.
    BodyWriteAborted,
    /// A channel (body sender, dispatch) was closed.
    ChannelClosed,
    /// An `io::Error` while reading/writing the transport.
    Io,
    /// A general error surfaced by the HTTP/2 implementation.
    #[cfg(feature = "http2")]
    Http2,
    /// Errors explicitly raised for unsupported operations or invariant
    /// violations (e.g. mutating headers after they've been marked written).
    User(User),
}

#[derive(Debug)]
pub(crate) enum Decode {
    Header,
    RequestLineTooLong,
    HeaderTooLarge,
    Method,
    Version,
    Uri,
    Status,
    TooLarge,
    IncompleteMessage,
    /// A `Content-Encoding`d body failed to decompress.
    Body,
}

#[derive(Debug)]
pub(crate) enum User {
    HeadersAlreadyWritten,
    ResponseDataAlreadySet,
    DoubleSubscription,
    TransformAfterSubscription,
    NoUpgrade,
    ManualUpgrade,
}

impl Error {
    pub(crate) fn new(kind: Kind) -> Error {
        Error {
            inner: Box::new(ErrorImpl { kind, cause: None }),
        }
    }

    pub(crate) fn with<C: Into<Cause>>(mut self, cause: C) -> Error {
        self.inner.cause = Some(cause.into());
        self
    }

    pub(crate) fn kind(&self) -> &Kind {
        &self.inner.kind
    }

    /// Returns true if this was a decode (parse) error.
    pub fn is_decode(&self) -> bool {
        matches!(self.inner.kind, Kind::Decode(_))
    }

    /// Returns true if this decode error was caused by an over-long
    /// request-line or header section.
    pub fn is_too_large(&self) -> bool {
        matches!(
            self.inner.kind,
            Kind::Decode(Decode::TooLarge)
                | Kind::Decode(Decode::RequestLineTooLong)
                | Kind::Decode(Decode::HeaderTooLarge)
        )
    }

    /// Returns true if the connection closed before a message completed.
    pub fn is_incomplete_message(&self) -> bool {
        matches!(self.inner.kind, Kind::Decode(Decode::IncompleteMessage))
    }

    /// Returns true if this was raised by the `Controller`, carrying an
    /// HTTP status to report.
    pub fn handler_status(&self) -> Option<StatusCode> {
        match self.inner.kind {
            Kind::Handler(status) => Some(status),
            _ => None,
        }
    }

    /// Returns true if this represents an exchange/stream reset (either
    /// locally initiated via `reset()`, or a peer `RST_STREAM`).
    pub fn is_canceled(&self) -> bool {
        matches!(self.inner.kind, Kind::Canceled | Kind::ResetByPeer)
    }

    /// Returns true if this was a peer-initiated reset.
    pub fn is_reset_by_peer(&self) -> bool {
        matches!(self.inner.kind, Kind::ResetByPeer)
    }

    /// Returns true if the connection is closed or closing.
    pub fn is_connection_closed(&self) -> bool {
        matches!(
            self.inner.kind,
            Kind::ConnectionClosed | Kind::ShutdownInProgress
        )
    }

    /// Returns true if no route matched.
    pub fn is_route_not_found(&self) -> bool {
        matches!(self.inner.kind, Kind::RouteNotFound)
    }

    /// Returns true if routes matched but none was acceptable.
    pub fn is_route_not_acceptable(&self) -> bool {
        matches!(self.inner.kind, Kind::RouteNotAcceptable)
    }

    /// Returns true if routes matched every criterion but method.
    pub fn is_method_not_allowed(&self) -> bool {
        matches!(self.inner.kind, Kind::MethodNotAllowed)
    }

    /// Consumes the error, returning its underlying cause, if any.
    pub fn into_cause(self) -> Option<Cause> {
        self.inner.cause
    }

    pub(crate) fn find_source<E: StdError + 'static>(&self) -> Option<&E> {
        let mut cause = self.source();
        while let Some(err) = cause {
            if let Some(typed) = err.downcast_ref() {
                return Some(typed);
            }
            cause = err.source();
        }
        None
    }

    pub(crate) fn new_decode(d: Decode) -> Error {
        Error::new(Kind::Decode(d))
    }

    pub(crate) fn new_frame() -> Error {
        Error::new(Kind::Frame)
    }

    pub(crate) fn new_flow_control() -> Error {
        Error::new(Kind::FlowControl)
    }

    pub(crate) fn new_idle_timeout() -> Error {
        Error::new(Kind::IdleTimeout)
    }

    pub(crate) fn new_handler(status: StatusCode) -> Error {
        Error::new(Kind::Handler(status))
    }

    pub(crate) fn new_reset_by_peer() -> Error {
        Error::new(Kind::ResetByPeer)
    }

    pub(crate) fn new_connection_closed() -> Error {
        Error::new(Kind::ConnectionClosed)
    }

    pub(crate) fn new_shutdown_in_progress() -> Error {
        Error::new(Kind::ShutdownInProgress)
    }

    pub(crate) fn new_route_not_found() -> Error {
        Error::new(Kind::RouteNotFound)
    }

    pub(crate) fn new_route_not_acceptable() -> Error {
        Error::new(Kind::RouteNotAcceptable)
    }

    pub(crate) fn new_method_not_allowed() -> Error {
        Error::new(Kind::MethodNotAllowed)
    }

    pub(crate) fn new_canceled() -> Error {
        Error::new(Kind::Canceled)
    }

    pub(crate) fn new_body_write_aborted() -> Error {
        Error::new(Kind::BodyWriteAborted)
    }

    pub(crate) fn new_channel_closed() -> Error {
        Error::new(Kind::ChannelClosed)
    }

    pub(crate) fn new_io(cause: std::io::Error) -> Error {
        Error::new(Kind::Io).with(cause)
    }

    #[cfg(feature = "http2")]
    pub(crate) fn new_h2(cause: ::h2::Error) -> Error {
        if cause.is_io() {
            Error::new_io(cause.into_io().expect("h2::Error::is_io"))
        } else {
            Error::new(Kind::Http2).with(cause)
        }
    }

    pub(crate) fn new_headers_already_written() -> Error {
        Error::new(Kind::User(User::HeadersAlreadyWritten))
    }

    pub(crate) fn new_response_data_already_set() -> Error {
        Error::new(Kind::User(User::ResponseDataAlreadySet))
    }

    pub(crate) fn new_double_subscription() -> Error {
        Error::new(Kind::User(User::DoubleSubscription))
    }

    pub(crate) fn new_transform_after_subscription() -> Error {
        Error::new(Kind::User(User::TransformAfterSubscription))
    }

    pub(crate) fn new_no_upgrade() -> Error {
        Error::new(Kind::User(User::NoUpgrade))
    }

    pub(crate) fn new_manual_upgrade() -> Error {
        Error::new(Kind::User(User::ManualUpgrade))
    }

    fn description(&self) -> &str {
        match self.inner.kind {
            Kind::Decode(Decode::Header) => "malformed header",
            Kind::Decode(Decode::RequestLineTooLong) => "request-line too long",
            Kind::Decode(Decode::HeaderTooLarge) => "header section too large",
            Kind::Decode(Decode::Method) => "invalid HTTP method parsed",
            Kind::Decode(Decode::Version) => "invalid HTTP version parsed",
            Kind::Decode(Decode::Uri) => "invalid URI",
            Kind::Decode(Decode::Status) => "invalid HTTP status-code parsed",
            Kind::Decode(Decode::TooLarge) => "message head is too large",
            Kind::Decode(Decode::IncompleteMessage) => {
                "connection closed before message completed"
            }
            Kind::Decode(Decode::Body) => "body failed to decompress",
            Kind::Frame => "protocol framing violation",
            Kind::FlowControl => "flow-control window violated",
            Kind::IdleTimeout => "connection idle timeout",
            Kind::Handler(_) => "handler failure",
            Kind::ResetByPeer => "stream reset by peer",
            Kind::ConnectionClosed => "connection closed",
            Kind::ShutdownInProgress => "shutdown in progress",
            Kind::RouteNotFound => "no route found",
            Kind::RouteNotAcceptable => "no acceptable route",
            Kind::MethodNotAllowed => "method not allowed",
            Kind::Canceled => "exchange canceled",
            Kind::BodyWriteAborted => "body write aborted",
            Kind::ChannelClosed => "channel closed",
            Kind::Io => "transport I/O error",
            #[cfg(feature = "http2")]
            Kind::Http2 => "http2 error",
            Kind::User(User::HeadersAlreadyWritten) => "response headers already written",
            Kind::User(User::ResponseDataAlreadySet) => "response data already set",
            Kind::User(User::DoubleSubscription) => "body stream already subscribed",
            Kind::User(User::TransformAfterSubscription) => {
                "transform applied after subscription"
            }
            Kind::User(User::NoUpgrade) => "no upgrade available on this exchange",
            Kind::User(User::ManualUpgrade) => "upgrade handled manually",
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_tuple("reactor_core::Error");
        f.field(&self.inner.kind);
        if let Some(ref cause) = self.inner.cause {
            f.field(cause);
        }
        f.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref cause) = self.inner.cause {
            write!(f, "{}: {}", self.description(), cause)
        } else {
            f.write_str(self.description())
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .cause
            .as_ref()
            .map(|c| &**c as &(dyn StdError + 'static))
    }
}

impl From<httparse::Error> for Decode {
    fn from(err: httparse::Error) -> Decode {
        match err {
            httparse::Error::HeaderName
            | httparse::Error::HeaderValue
            | httparse::Error::NewLine
            | httparse::Error::Token => Decode::Header,
            httparse::Error::Status => Decode::Status,
            httparse::Error::TooManyHeaders => Decode::TooLarge,
            httparse::Error::Version => Decode::Version,
        }
    }
}

#[doc(hidden)]
trait AssertSendSync: Send + Sync + 'static {}
#[doc(hidden)]
impl AssertSendSync for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_status_roundtrip() {
        let err = Error::new_handler(StatusCode::NOT_FOUND);
        assert_eq!(err.handler_status(), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn display_includes_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = Error::new_io(io);
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn decode_classification() {
        let err = Error::new_decode(Decode::RequestLineTooLong);
        assert!(err.is_decode());
        assert!(err.is_too_large());
    }
}
