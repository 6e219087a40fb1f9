//! `multipart/form-data` view over an inbound body (spec §4.3): a lazy
//! sequence of parts, each a nested headers + (buffered) body.

use bytes::{Bytes, BytesMut};
use http_body_util::BodyExt;

use crate::body::incoming::Incoming;
use crate::error::{Decode, Error};
use crate::header::{CodecRegistry, Header};

/// One multipart part: its decoded headers and fully-buffered body.
///
/// Parts themselves are produced lazily (one `next()` pulls only as much of
/// the wire as needed to find the next boundary); each part's own body is
/// buffered in full, which is adequate for form fields and small file
/// uploads and keeps the boundary-scanning state machine tractable.
#[derive(Debug, Clone)]
pub struct Part {
    pub headers: Vec<Header>,
    pub body: Bytes,
}

impl Part {
    pub fn header(&self, name: &str) -> Option<&Header> {
        self.headers.iter().find(|h| h.name().as_str().eq_ignore_ascii_case(name))
    }

    pub fn name(&self) -> Option<&str> {
        self.header("content-disposition")
            .and_then(|h| h.parsed())
            .and_then(|v| v.param("name"))
    }

    pub fn filename(&self) -> Option<&str> {
        self.header("content-disposition")
            .and_then(|h| h.parsed())
            .and_then(|v| v.param("filename"))
    }
}

pub struct Multipart {
    body: Incoming,
    buf: BytesMut,
    done: bool,
    boundary: Vec<u8>,
    registry: CodecRegistry,
    started: bool,
}

impl Multipart {
    pub fn new(body: Incoming, boundary: impl Into<String>) -> Self {
        let mut marker = b"--".to_vec();
        marker.extend_from_slice(boundary.into().as_bytes());
        Multipart {
            body,
            buf: BytesMut::new(),
            done: false,
            boundary: marker,
            registry: CodecRegistry::with_defaults(),
            started: false,
        }
    }

    async fn fill(&mut self) -> Result<bool, Error> {
        match BodyExt::frame(&mut self.body).await {
            Some(Ok(frame)) => {
                if let Ok(data) = frame.into_data() {
                    self.buf.extend_from_slice(&data);
                }
                Ok(true)
            }
            Some(Err(e)) => Err(e),
            None => Ok(false),
        }
    }

    fn find(&self, needle: &[u8]) -> Option<usize> {
        self.buf
            .windows(needle.len())
            .position(|window| window == needle)
    }

    /// Pulls the next part, or `None` once the closing boundary (`--` suffix)
    /// has been consumed.
    pub async fn next(&mut self) -> Option<Result<Part, Error>> {
        if self.done {
            return None;
        }

        if !self.started {
            loop {
                if let Some(pos) = self.find(&self.boundary) {
                    self.buf.split_to(pos + self.boundary.len());
                    self.started = true;
                    break;
                }
                match self.fill().await {
                    Ok(true) => continue,
                    Ok(false) => {
                        self.done = true;
                        return None;
                    }
                    Err(e) => return Some(Err(e)),
                }
            }
        }

        // Past the boundary marker: either `--\r\n` (epilogue) or `\r\n`
        // then headers then body up to the next boundary.
        loop {
            if self.buf.len() >= 2 {
                if &self.buf[..2] == b"--" {
                    self.done = true;
                    return None;
                }
                break;
            }
            match self.fill().await {
                Ok(true) => continue,
                Ok(false) => {
                    self.done = true;
                    return Some(Err(Error::new_decode(Decode::IncompleteMessage)));
                }
                Err(e) => return Some(Err(e)),
            }
        }

        loop {
            if let Some(header_end) = self.find(b"\r\n\r\n") {
                let header_block = self.buf.split_to(header_end);
                self.buf.split_to(4); // consume the CRLFCRLF
                let headers = match parse_part_headers(&header_block, &self.registry) {
                    Ok(h) => h,
                    Err(e) => return Some(Err(e)),
                };

                let mut next_boundary = b"\r\n".to_vec();
                next_boundary.extend_from_slice(&self.boundary);
                loop {
                    if let Some(pos) = self.find(&next_boundary) {
                        let body = self.buf.split_to(pos).freeze();
                        self.buf.split_to(next_boundary.len());
                        return Some(Ok(Part { headers, body }));
                    }
                    match self.fill().await {
                        Ok(true) => continue,
                        Ok(false) => {
                            self.done = true;
                            return Some(Err(Error::new_decode(Decode::IncompleteMessage)));
                        }
                        Err(e) => return Some(Err(e)),
                    }
                }
            }
            match self.fill().await {
                Ok(true) => continue,
                Ok(false) => {
                    self.done = true;
                    return Some(Err(Error::new_decode(Decode::IncompleteMessage)));
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

fn parse_part_headers(block: &[u8], registry: &CodecRegistry) -> Result<Vec<Header>, Error> {
    let text = std::str::from_utf8(block).map_err(|_| Error::new_decode(Decode::Header))?;
    let mut headers = Vec::new();
    for line in text.split("\r\n").filter(|l| !l.is_empty()) {
        headers.push(Header::decode_line(line, registry)?);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parses_two_parts() {
        let raw = concat!(
            "--B\r\n",
            "Content-Disposition: form-data; name=\"field\"\r\n\r\n",
            "value\r\n",
            "--B\r\n",
            "Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\r\n",
            "contents\r\n",
            "--B--\r\n",
        );
        let body = Incoming::from(Bytes::from_static(raw.as_bytes()));
        let mut mp = Multipart::new(body, "B");

        let first = mp.next().await.unwrap().unwrap();
        assert_eq!(first.name(), Some("field"));
        assert_eq!(&first.body[..], b"value");

        let second = mp.next().await.unwrap().unwrap();
        assert_eq!(second.filename(), Some("a.txt"));
        assert_eq!(&second.body[..], b"contents");

        assert!(mp.next().await.is_none());
    }
}
