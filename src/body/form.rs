//! `application/x-www-form-urlencoded` view over an inbound body (spec
//! §4.3): a lazy sequence of `(name, value)` pairs, plus a `collect_map()`
//! convenience.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use http_body_util::BodyExt;
use percent_encoding::percent_decode_str;

use crate::body::incoming::Incoming;
use crate::error::Error;

/// Incrementally splits an `&`-delimited body into `(name, value)` pairs,
/// pulling more bytes from the underlying [`Incoming`] only when the
/// buffered data holds no complete pair yet.
pub struct UrlEncodedForm {
    body: Incoming,
    buf: BytesMut,
    done: bool,
}

impl UrlEncodedForm {
    pub fn new(body: Incoming) -> Self {
        UrlEncodedForm {
            body,
            buf: BytesMut::new(),
            done: false,
        }
    }

    /// Pulls the next `(name, value)` pair, decoding percent-escapes and
    /// `+` as space, or `None` once the body is exhausted.
    pub async fn next(&mut self) -> Option<Result<(String, String), Error>> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'&') {
                let pair = self.buf.split_to(pos);
                self.buf.advance_past_delimiter();
                if pair.is_empty() {
                    continue;
                }
                return Some(decode_pair(&pair));
            }

            if self.done {
                if self.buf.is_empty() {
                    return None;
                }
                let pair = self.buf.split_to(self.buf.len());
                return Some(decode_pair(&pair));
            }

            match BodyExt::frame(&mut self.body).await {
                Some(Ok(frame)) => {
                    if let Ok(data) = frame.into_data() {
                        self.buf.extend_from_slice(&data);
                    }
                }
                Some(Err(e)) => return Some(Err(e)),
                None => self.done = true,
            }
        }
    }

    /// Buffers the remaining pairs into a map; later duplicate keys win.
    pub async fn collect_map(mut self) -> Result<HashMap<String, String>, Error> {
        let mut map = HashMap::new();
        while let Some(pair) = self.next().await {
            let (k, v) = pair?;
            map.insert(k, v);
        }
        Ok(map)
    }
}

trait AdvancePastDelimiter {
    fn advance_past_delimiter(&mut self);
}

impl AdvancePastDelimiter for BytesMut {
    fn advance_past_delimiter(&mut self) {
        if !self.is_empty() {
            let _ = self.split_to(1);
        }
    }
}

fn decode_pair(raw: &[u8]) -> Result<(String, String), Error> {
    let raw = std::str::from_utf8(raw).map_err(|_| Error::new_decode(crate::error::Decode::Header))?;
    let (name, value) = raw.split_once('=').unwrap_or((raw, ""));
    Ok((decode_component(name), decode_component(value)))
}

fn decode_component(s: &str) -> String {
    let replaced = s.replace('+', " ");
    percent_decode_str(&replaced).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn splits_and_decodes_pairs() {
        let body = Incoming::from(Bytes::from_static(b"a=1&b=hello+world&c=%2F"));
        let mut form = UrlEncodedForm::new(body);
        let mut pairs = Vec::new();
        while let Some(pair) = form.next().await {
            pairs.push(pair.unwrap());
        }
        assert_eq!(
            pairs,
            vec![
                ("a".to_owned(), "1".to_owned()),
                ("b".to_owned(), "hello world".to_owned()),
                ("c".to_owned(), "/".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn collect_map_builds_last_write_wins_map() {
        let body = Incoming::from(Bytes::from_static(b"a=1&a=2"));
        let map = UrlEncodedForm::new(body).collect_map().await.unwrap();
        assert_eq!(map.get("a"), Some(&"2".to_owned()));
    }
}
