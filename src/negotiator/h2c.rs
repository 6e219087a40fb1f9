//! H2C: HTTP/2 over cleartext, reached either by a client that simply opens
//! the connection with the HTTP/2 preface (no HTTP/1.1 request at all) or by
//! an HTTP/1.1 request carrying `Connection: Upgrade, HTTP2-Settings` and
//! `Upgrade: h2c` (RFC 7540 §3.2).

use bytes::{Buf, BytesMut};
use http::header::{HeaderName, CONNECTION, UPGRADE};
use http::{HeaderValue, Request, Response, StatusCode};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::common::io::Rewind;
use crate::error::Error;

/// The 24-octet connection preface a direct (non-Upgrade) H2C client sends
/// before any HTTP/1.1 bytes (RFC 7540 §3.5).
pub const H2_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Which protocol a freshly-accepted cleartext connection should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http1,
    Http2,
}

/// Peeks at the first bytes of a cleartext connection looking for the HTTP/2
/// preface, replaying whatever was read via [`Rewind`] so whichever protocol
/// is chosen still observes every byte. Bails out to `Http1` as soon as the
/// bytes read so far no longer match the preface's corresponding prefix,
/// rather than waiting for a full 24 bytes that may never arrive.
pub async fn detect_preface<T>(mut io: T) -> Result<(Protocol, Rewind<T>), Error>
where
    T: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(H2_PREFACE.len());
    while buf.len() < H2_PREFACE.len() && buf[..] == H2_PREFACE[..buf.len()] {
        if io.read_buf(&mut buf).await.map_err(Error::new_io)? == 0 {
            break;
        }
    }
    let protocol = if buf[..] == *H2_PREFACE {
        Protocol::Http2
    } else {
        Protocol::Http1
    };
    Ok((protocol, Rewind::new_buffered(io, buf.freeze())))
}

fn http2_settings_header() -> HeaderName {
    HeaderName::from_static("http2-settings")
}

/// Returns the base64url `HTTP2-Settings` payload if `req` is a valid H2C
/// upgrade request (carries `Connection: Upgrade, HTTP2-Settings`,
/// `Upgrade: h2c`, and the settings header itself).
pub fn upgrade_request_settings<B>(req: &Request<B>) -> Option<&HeaderValue> {
    let connection_mentions = |name: &str| {
        req.headers()
            .get_all(CONNECTION)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.split(',').any(|tok| tok.trim().eq_ignore_ascii_case(name)))
    };
    if !connection_mentions("upgrade") || !connection_mentions("http2-settings") {
        return None;
    }
    let upgrade = req.headers().get(UPGRADE)?.to_str().ok()?;
    if !upgrade.eq_ignore_ascii_case("h2c") {
        return None;
    }
    req.headers().get(http2_settings_header())
}

/// Builds the `101 Switching Protocols` response that accepts an H2C
/// upgrade; the caller installs the HTTP/2 connection on the same socket
/// immediately afterward.
pub fn switching_protocols_response() -> Response<()> {
    let mut resp = Response::new(());
    *resp.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
    resp.headers_mut()
        .insert(CONNECTION, HeaderValue::from_static("Upgrade"));
    resp.headers_mut()
        .insert(UPGRADE, HeaderValue::from_static("h2c"));
    resp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn detects_direct_preface() {
        let io = std::io::Cursor::new(H2_PREFACE.to_vec());
        let (protocol, rewind) = detect_preface(io).await.unwrap();
        assert_eq!(protocol, Protocol::Http2);
        let (_, replay) = rewind.into_inner();
        assert_eq!(&replay[..], H2_PREFACE);
    }

    #[tokio::test]
    async fn falls_back_to_http1_on_mismatch() {
        let request = b"GET / HTTP/1.1\r\n\r\n".to_vec();
        let io = std::io::Cursor::new(request.clone());
        let (protocol, rewind) = detect_preface(io).await.unwrap();
        assert_eq!(protocol, Protocol::Http1);
        let (_, replay) = rewind.into_inner();
        assert_eq!(&replay[..], &request[..]);
    }

    #[test]
    fn recognizes_upgrade_request() {
        let req = Request::builder()
            .header(CONNECTION, "Upgrade, HTTP2-Settings")
            .header(UPGRADE, "h2c")
            .header("http2-settings", "AAMAAABkAAQAAP__")
            .body(())
            .unwrap();
        assert!(upgrade_request_settings(&req).is_some());
    }

    #[test]
    fn rejects_plain_request() {
        let req = Request::builder().body(()).unwrap();
        assert!(upgrade_request_settings(&req).is_none());
    }
}
