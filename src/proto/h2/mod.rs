//! The HTTP/2 multiplexed connection core (spec §4.5): one `h2` connection
//! multiplexes many concurrent streams, each mapped onto its own
//! [`Exchange`](crate::exchange::Exchange) and dispatched to the
//! [`Controller`](crate::controller::Controller) independently — unlike
//! HTTP/1.x pipelining there is no response-ordering constraint to enforce,
//! since each stream carries its own id.

mod server;

pub use server::{Builder, Connection};

use http::header::{CONNECTION, TRANSFER_ENCODING};
use http::HeaderMap;

/// `Transfer-Encoding` and `Connection` are HTTP/1.x framing headers with no
/// meaning over HTTP/2 (RFC 9113 §8.2.2); strip them before sending a
/// response so a handler written against both protocols doesn't leak one
/// into the other.
fn strip_connection_headers(headers: &mut HeaderMap) {
    headers.remove(TRANSFER_ENCODING);
    headers.remove(CONNECTION);
}
