//! Start-line + header-section parsing (spec §4.4 "Request parsing"),
//! built on `httparse` for the wire grammar and `http::HeaderMap` for the
//! decoded result.

use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, Uri, Version};

use crate::body::{DecodedLength, Incoming};
use crate::error::{Decode, Error};

const MAX_HEADERS: usize = 100;

pub(crate) struct ParsedRequest {
    pub(crate) request: Request<()>,
    pub(crate) content_length: DecodedLength,
    pub(crate) is_chunked: bool,
    pub(crate) keep_alive: bool,
    pub(crate) consumed: usize,
}

/// Attempts to parse one request's start-line + headers from `buf`.
/// Returns `Ok(None)` when more bytes are needed; an error is a decoder
/// error per spec §4.4 and carries which synthetic status it maps to.
pub(crate) fn try_parse_request(buf: &[u8]) -> Result<Option<ParsedRequest>, Error> {
    let mut header_storage = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut header_storage);

    let status = req.parse(buf).map_err(|e| Error::new_decode(Decode::from(e)))?;
    let consumed = match status {
        httparse::Status::Complete(n) => n,
        httparse::Status::Partial => return Ok(None),
    };

    let method = req
        .method
        .ok_or_else(|| Error::new_decode(Decode::Method))?;
    let method = Method::from_bytes(method.as_bytes()).map_err(|_| Error::new_decode(Decode::Method))?;

    let path = req.path.ok_or_else(|| Error::new_decode(Decode::Uri))?;
    let uri: Uri = path.parse().map_err(|_| Error::new_decode(Decode::Uri))?;

    let version = match req.version {
        Some(1) => Version::HTTP_11,
        Some(0) => Version::HTTP_10,
        _ => return Err(Error::new_decode(Decode::Version)),
    };

    let mut headers = HeaderMap::with_capacity(req.headers.len());
    for h in req.headers.iter() {
        let name = HeaderName::from_bytes(h.name.as_bytes())
            .map_err(|_| Error::new_decode(Decode::Header))?;
        let value =
            HeaderValue::from_bytes(h.value).map_err(|_| Error::new_decode(Decode::Header))?;
        headers.append(name, value);
    }

    let is_chunked = headers
        .get(http::header::TRANSFER_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.rsplit(',').next().unwrap_or("").trim().eq_ignore_ascii_case("chunked"))
        .unwrap_or(false);

    let content_length = if is_chunked {
        DecodedLength::CHUNKED
    } else {
        match headers.get(http::header::CONTENT_LENGTH) {
            Some(v) => {
                let len: u64 = v
                    .to_str()
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| Error::new_decode(Decode::Header))?;
                DecodedLength::checked_new(len).ok_or_else(|| Error::new_decode(Decode::TooLarge))?
            }
            None => DecodedLength::ZERO,
        }
    };

    let keep_alive = is_keep_alive(version, &headers);

    let mut request = Request::builder().method(method).uri(uri).version(version);
    *request.headers_mut().unwrap() = headers;
    let request = request.body(()).map_err(|_| Error::new_decode(Decode::Header))?;

    Ok(Some(ParsedRequest {
        request,
        content_length,
        is_chunked,
        keep_alive,
        consumed,
    }))
}

pub(crate) fn is_keep_alive(version: Version, headers: &HeaderMap) -> bool {
    let connection = headers
        .get(http::header::CONNECTION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let tokens = || connection.split(',').map(str::trim);

    if tokens().any(|t| t.eq_ignore_ascii_case("close")) {
        return false;
    }
    match version {
        Version::HTTP_11 => true,
        Version::HTTP_10 => tokens().any(|t| t.eq_ignore_ascii_case("keep-alive")),
        _ => false,
    }
}

pub(crate) fn with_body(parts: Request<()>, body: Incoming) -> Request<Incoming> {
    let (parts, ()) = parts.into_parts();
    Request::from_parts(parts, body)
}

pub(crate) fn status_for_decode_error(kind: &Decode) -> StatusCode {
    match kind {
        Decode::RequestLineTooLong => StatusCode::URI_TOO_LONG,
        Decode::HeaderTooLarge => StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
        _ => StatusCode::BAD_REQUEST,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_get() {
        let raw = b"GET /a?b=c HTTP/1.1\r\nHost: x\r\nContent-Length: 0\r\n\r\n";
        let parsed = try_parse_request(raw).unwrap().unwrap();
        assert_eq!(parsed.request.method(), Method::GET);
        assert_eq!(parsed.content_length.into_opt(), Some(0));
        assert!(parsed.keep_alive);
    }

    #[test]
    fn detects_chunked_transfer_encoding() {
        let raw = b"POST /a HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n";
        let parsed = try_parse_request(raw).unwrap().unwrap();
        assert!(parsed.is_chunked);
    }

    #[test]
    fn partial_input_requests_more_bytes() {
        let raw = b"GET /a HTTP/1.1\r\nHost: x\r\n";
        assert!(try_parse_request(raw).unwrap().is_none());
    }

    #[test]
    fn http10_without_keepalive_closes() {
        let raw = b"GET / HTTP/1.0\r\n\r\n";
        let parsed = try_parse_request(raw).unwrap().unwrap();
        assert!(!parsed.keep_alive);
    }
}
