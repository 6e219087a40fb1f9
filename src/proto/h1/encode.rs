//! Response start-line + header + body-framing serialisation (spec §4.4
//! "Writing").

use bytes::{BufMut, Bytes, BytesMut};
use http::{HeaderMap, StatusCode, Version};

/// How the body's length is communicated on the wire, decided once the
/// response's content length is known (or isn't).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodyEncoding {
    /// `Content-Length: N`; write exactly `N` bytes, no chunk framing.
    Length,
    /// `Transfer-Encoding: chunked`; every chunk gets a size prefix and the
    /// stream ends with a zero-size chunk.
    Chunked,
    /// Neither header was set; the body runs until the connection closes.
    CloseDelimited,
}

pub(crate) fn encode_headers(
    version: Version,
    status: StatusCode,
    headers: &HeaderMap,
    date: &str,
    dst: &mut BytesMut,
) {
    let version_str = match version {
        Version::HTTP_10 => "HTTP/1.0",
        _ => "HTTP/1.1",
    };
    dst.put_slice(version_str.as_bytes());
    dst.put_u8(b' ');
    dst.put_slice(status.as_str().as_bytes());
    dst.put_u8(b' ');
    dst.put_slice(status.canonical_reason().unwrap_or("").as_bytes());
    dst.put_slice(b"\r\n");

    let mut has_date = false;
    for (name, value) in headers.iter() {
        if name == http::header::DATE {
            has_date = true;
        }
        dst.put_slice(name.as_str().as_bytes());
        dst.put_slice(b": ");
        dst.put_slice(value.as_bytes());
        dst.put_slice(b"\r\n");
    }
    if !has_date {
        dst.put_slice(b"date: ");
        dst.put_slice(date.as_bytes());
        dst.put_slice(b"\r\n");
    }
    dst.put_slice(b"\r\n");
}

/// Wraps one body chunk per `encoding`'s framing rule.
pub(crate) fn encode_chunk(encoding: BodyEncoding, chunk: Bytes, dst: &mut BytesMut) {
    match encoding {
        BodyEncoding::Chunked => {
            if chunk.is_empty() {
                return;
            }
            let size = format!("{:x}\r\n", chunk.len());
            dst.put_slice(size.as_bytes());
            dst.put_slice(&chunk);
            dst.put_slice(b"\r\n");
        }
        BodyEncoding::Length | BodyEncoding::CloseDelimited => dst.put_slice(&chunk),
    }
}

/// Writes the terminating marker, when `encoding` has one.
pub(crate) fn encode_end(encoding: BodyEncoding, trailers: Option<&HeaderMap>, dst: &mut BytesMut) {
    if encoding != BodyEncoding::Chunked {
        return;
    }
    dst.put_slice(b"0\r\n");
    if let Some(trailers) = trailers {
        for (name, value) in trailers.iter() {
            dst.put_slice(name.as_str().as_bytes());
            dst.put_slice(b": ");
            dst.put_slice(value.as_bytes());
            dst.put_slice(b"\r\n");
        }
    }
    dst.put_slice(b"\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_encoding_prefixes_size_in_hex() {
        let mut dst = BytesMut::new();
        encode_chunk(BodyEncoding::Chunked, Bytes::from_static(b"hello"), &mut dst);
        assert_eq!(&dst[..], b"5\r\nhello\r\n");
    }

    #[test]
    fn length_encoding_writes_raw_bytes() {
        let mut dst = BytesMut::new();
        encode_chunk(BodyEncoding::Length, Bytes::from_static(b"hello"), &mut dst);
        assert_eq!(&dst[..], b"hello");
    }

    #[test]
    fn status_line_uses_canonical_reason() {
        let mut dst = BytesMut::new();
        encode_headers(Version::HTTP_11, StatusCode::NOT_FOUND, &HeaderMap::new(), "DATE", &mut dst);
        assert!(dst.starts_with(b"HTTP/1.1 404 Not Found\r\n"));
    }
}
