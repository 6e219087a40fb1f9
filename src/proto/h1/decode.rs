//! Transfer-coding decoders: `Content-Length`, `chunked`, and close-delimited
//! (EOF) bodies (spec §4.4 "Request parsing" body chunks).

use bytes::{Bytes, BytesMut};
use http::HeaderMap;

use crate::body::DecodedLength;
use crate::error::{Decode, Error};
use crate::header::{CodecRegistry, Header};

pub(crate) enum Decoded {
    /// A body chunk, and how many bytes of `buf` it consumed.
    Data(Bytes),
    /// Trailers, terminating a chunked body.
    Trailers(HeaderMap),
    /// The body is complete; no trailers.
    Done,
    /// Not enough buffered bytes yet.
    NeedMore,
}

pub(crate) struct Decoder {
    kind: Kind,
}

enum Kind {
    Length(u64),
    Chunked(ChunkedState),
    Eof(bool),
}

enum ChunkedState {
    Size,
    Body(u64),
    BodyCrLf,
    Trailers,
    Done,
}

impl Decoder {
    pub(crate) fn length(len: u64) -> Self {
        Decoder {
            kind: Kind::Length(len),
        }
    }

    pub(crate) fn chunked() -> Self {
        Decoder {
            kind: Kind::Chunked(ChunkedState::Size),
        }
    }

    pub(crate) fn eof() -> Self {
        Decoder {
            kind: Kind::Eof(false),
        }
    }

    pub(crate) fn new(len: DecodedLength) -> Self {
        if len == DecodedLength::CHUNKED {
            Decoder::chunked()
        } else if len == DecodedLength::CLOSE_DELIMITED {
            Decoder::eof()
        } else {
            Decoder::length(len.into_opt().unwrap_or(0))
        }
    }

    /// Consumes as much of `buf` as one decode step needs, returning what it
    /// found. The caller removes the consumed prefix from `buf` only when
    /// told to via the returned byte count captured by the caller's own
    /// cursor bookkeeping (we use `BytesMut::split_to`, which mutates `buf`
    /// directly, so callers just re-check `buf` after each call).
    pub(crate) fn decode(&mut self, buf: &mut BytesMut, eof: bool) -> Result<Decoded, Error> {
        match &mut self.kind {
            Kind::Length(remaining) => {
                if *remaining == 0 {
                    return Ok(Decoded::Done);
                }
                if buf.is_empty() {
                    if eof {
                        return Err(Error::new_decode(Decode::IncompleteMessage));
                    }
                    return Ok(Decoded::NeedMore);
                }
                let take = (*remaining).min(buf.len() as u64) as usize;
                let chunk = buf.split_to(take).freeze();
                *remaining -= chunk.len() as u64;
                Ok(Decoded::Data(chunk))
            }
            Kind::Eof(done) => {
                if *done {
                    return Ok(Decoded::Done);
                }
                if buf.is_empty() {
                    if eof {
                        *done = true;
                        return Ok(Decoded::Done);
                    }
                    return Ok(Decoded::NeedMore);
                }
                let chunk = buf.split_to(buf.len()).freeze();
                Ok(Decoded::Data(chunk))
            }
            Kind::Chunked(state) => decode_chunked(state, buf, eof),
        }
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn decode_chunked(state: &mut ChunkedState, buf: &mut BytesMut, eof: bool) -> Result<Decoded, Error> {
    loop {
        match state {
            ChunkedState::Size => {
                let Some(pos) = find_crlf(buf) else {
                    if eof {
                        return Err(Error::new_decode(Decode::IncompleteMessage));
                    }
                    return Ok(Decoded::NeedMore);
                };
                let line = buf.split_to(pos).freeze();
                buf.split_to(2); // CRLF
                let line = std::str::from_utf8(&line).map_err(|_| Error::new_decode(Decode::Header))?;
                let size_str = line.split(';').next().unwrap_or("").trim();
                let size = u64::from_str_radix(size_str, 16)
                    .map_err(|_| Error::new_decode(Decode::Header))?;
                *state = if size == 0 {
                    ChunkedState::Trailers
                } else {
                    ChunkedState::Body(size)
                };
            }
            ChunkedState::Body(remaining) => {
                if buf.is_empty() {
                    if eof {
                        return Err(Error::new_decode(Decode::IncompleteMessage));
                    }
                    return Ok(Decoded::NeedMore);
                }
                let take = (*remaining).min(buf.len() as u64) as usize;
                let chunk = buf.split_to(take).freeze();
                *remaining -= chunk.len() as u64;
                if *remaining == 0 {
                    *state = ChunkedState::BodyCrLf;
                }
                return Ok(Decoded::Data(chunk));
            }
            ChunkedState::BodyCrLf => {
                if buf.len() < 2 {
                    if eof {
                        return Err(Error::new_decode(Decode::IncompleteMessage));
                    }
                    return Ok(Decoded::NeedMore);
                }
                buf.split_to(2);
                *state = ChunkedState::Size;
            }
            ChunkedState::Trailers => {
                let Some(pos) = find_trailers_end(buf) else {
                    if eof {
                        return Err(Error::new_decode(Decode::IncompleteMessage));
                    }
                    return Ok(Decoded::NeedMore);
                };
                let block = buf.split_to(pos).freeze();
                buf.split_to(2);
                *state = ChunkedState::Done;
                let registry = CodecRegistry::with_defaults();
                let mut trailers = HeaderMap::new();
                let text =
                    std::str::from_utf8(&block).map_err(|_| Error::new_decode(Decode::Header))?;
                for line in text.split("\r\n").filter(|l| !l.is_empty()) {
                    let header = Header::decode_line(line, &registry)?;
                    if let Ok(value) = http::HeaderValue::from_str(header.raw()) {
                        trailers.append(header.name().clone(), value);
                    }
                }
                if trailers.is_empty() {
                    return Ok(Decoded::Done);
                }
                return Ok(Decoded::Trailers(trailers));
            }
            ChunkedState::Done => return Ok(Decoded::Done),
        }
    }
}

/// Finds the `\r\n\r\n` (or bare `\r\n` when there are no trailer fields)
/// terminating the trailer section, returning the offset of its first byte.
fn find_trailers_end(buf: &[u8]) -> Option<usize> {
    if buf.len() >= 2 && &buf[..2] == b"\r\n" {
        return Some(0);
    }
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_decoder_yields_exact_bytes() {
        let mut dec = Decoder::length(5);
        let mut buf = BytesMut::from(&b"hello world"[..]);
        match dec.decode(&mut buf, false).unwrap() {
            Decoded::Data(b) => assert_eq!(&b[..], b"hello"),
            _ => panic!("expected data"),
        }
        assert!(matches!(dec.decode(&mut buf, false).unwrap(), Decoded::Done));
    }

    #[test]
    fn chunked_decoder_reads_chunks_and_terminates() {
        let mut dec = Decoder::chunked();
        let mut buf = BytesMut::from(&b"5\r\nhello\r\n0\r\n\r\n"[..]);
        let mut collected = Vec::new();
        loop {
            match dec.decode(&mut buf, false).unwrap() {
                Decoded::Data(b) => collected.extend_from_slice(&b),
                Decoded::Done => break,
                Decoded::Trailers(_) => break,
                Decoded::NeedMore => panic!("unexpected need-more"),
            }
        }
        assert_eq!(collected, b"hello");
    }

    #[test]
    fn chunked_decoder_surfaces_trailers() {
        let mut dec = Decoder::chunked();
        let mut buf = BytesMut::from(&b"0\r\nX-Trailer: v\r\n\r\n"[..]);
        match dec.decode(&mut buf, false).unwrap() {
            Decoded::Trailers(t) => assert_eq!(t.get("x-trailer").unwrap(), "v"),
            _ => panic!("expected trailers"),
        }
    }
}
