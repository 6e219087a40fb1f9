//! Extensions attached to requests/responses via `http::Extensions`, mirroring
//! the teacher's pattern of stashing protocol metadata there (e.g.
//! `hyper::ext::ReasonPhrase`) rather than widening `Request`/`Response`.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

/// Non-canonical reason phrase preserved from an HTTP/1.x status line, when
/// the peer sent one that differs from the status code's canonical phrase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReasonPhrase(pub(crate) bytes::Bytes);

impl ReasonPhrase {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ReasonPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// Per-connection metadata attached to every exchange's request extensions:
/// peer/local address, negotiated ALPN protocol, and peer certificates when
/// TLS client auth was used.
#[derive(Clone, Debug)]
pub struct ConnectionInfo {
    pub peer_addr: Option<SocketAddr>,
    pub local_addr: Option<SocketAddr>,
    pub negotiated_protocol: Option<&'static str>,
    pub peer_certificates: Option<Arc<Vec<Vec<u8>>>>,
}

impl ConnectionInfo {
    pub fn new(peer_addr: Option<SocketAddr>, local_addr: Option<SocketAddr>) -> Self {
        ConnectionInfo {
            peer_addr,
            local_addr,
            negotiated_protocol: None,
            peer_certificates: None,
        }
    }
}

/// The cause of a cancellation, observed by a response body subscriber via
/// the cancel hook described in spec §4.2/§5.
#[derive(Clone)]
pub struct CancelCause(Arc<crate::Error>);

impl CancelCause {
    pub(crate) fn new(err: crate::Error) -> Self {
        CancelCause(Arc::new(err))
    }

    pub fn error(&self) -> &crate::Error {
        &self.0
    }
}

impl fmt::Debug for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CancelCause").field(&self.0).finish()
    }
}
