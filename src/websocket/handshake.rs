//! Opening handshake (spec §4/RFC 6455 §4, §6 wire compatibility): detects a
//! WebSocket upgrade request, validates it, computes `Sec-WebSocket-Accept`,
//! and builds the `101 Switching Protocols` response.

use base64::Engine;
use http::header::{HeaderValue, CONNECTION, UPGRADE};
use http::{HeaderMap, Method, Request, Response, StatusCode, Version};
use sha1_smol::Sha1;

use crate::error::{Decode, Error};

const GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

fn decode_err() -> Error {
    Error::new_decode(Decode::Header)
}

/// A validated WebSocket upgrade request, carrying everything needed to
/// build the accept response.
#[derive(Debug, Clone)]
pub struct Handshake {
    key: String,
    protocols: Vec<String>,
    extensions_header: Option<String>,
}

impl Handshake {
    /// Detects and validates a WebSocket opening handshake from request
    /// parts. Returns `None` if the request isn't a WebSocket upgrade at
    /// all (so the caller can fall through to ordinary routing); an error
    /// if it looks like an upgrade attempt but is malformed.
    pub fn detect<B>(req: &Request<B>) -> Result<Option<Handshake>, Error> {
        if req.method() != Method::GET {
            return Ok(None);
        }
        if req.version() == Version::HTTP_09 || req.version() == Version::HTTP_10 {
            return Ok(None);
        }
        if !header_token_present(req.headers(), UPGRADE, "websocket") {
            return Ok(None);
        }
        if !header_token_present(req.headers(), CONNECTION, "upgrade") {
            return Ok(None);
        }

        let version = req
            .headers()
            .get("sec-websocket-version")
            .ok_or_else(|| decode_err())?;
        if version.as_bytes() != b"13" {
            return Err(decode_err());
        }

        let key = req
            .headers()
            .get("sec-websocket-key")
            .ok_or_else(|| decode_err())?
            .to_str()
            .map_err(|_| decode_err())?
            .to_owned();
        if base64::engine::general_purpose::STANDARD
            .decode(&key)
            .map(|raw| raw.len() != 16)
            .unwrap_or(true)
        {
            return Err(decode_err());
        }

        let protocols = req
            .headers()
            .get_all("sec-websocket-protocol")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();

        let extensions_header = req
            .headers()
            .get("sec-websocket-extensions")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_owned());

        Ok(Some(Handshake {
            key,
            protocols,
            extensions_header,
        }))
    }

    /// Client-offered subprotocols, in the order the client listed them.
    pub fn protocols(&self) -> &[String] {
        &self.protocols
    }

    /// Raw `Sec-WebSocket-Extensions` request header value, if any.
    pub fn extensions_header(&self) -> Option<&str> {
        self.extensions_header.as_deref()
    }

    fn accept_value(&self) -> String {
        let mut sha1 = Sha1::new();
        sha1.update(self.key.as_bytes());
        sha1.update(GUID.as_bytes());
        base64::engine::general_purpose::STANDARD.encode(sha1.digest().bytes())
    }

    /// Builds the `101 Switching Protocols` response accepting this
    /// handshake. `subprotocol` echoes the one the server selected (it
    /// must be one `protocols()` offered); `extensions` is the negotiated
    /// `Sec-WebSocket-Extensions` response value, if any.
    pub fn accept(
        &self,
        subprotocol: Option<&str>,
        extensions: Option<&str>,
    ) -> Response<()> {
        let mut builder = Response::builder()
            .status(StatusCode::SWITCHING_PROTOCOLS)
            .header(CONNECTION, "Upgrade")
            .header(UPGRADE, "websocket")
            .header("sec-websocket-accept", self.accept_value());

        if let Some(proto) = subprotocol {
            builder = builder.header("sec-websocket-protocol", proto);
        }
        if let Some(ext) = extensions {
            builder = builder.header("sec-websocket-extensions", ext);
        }

        builder.body(()).expect("handshake response is well-formed")
    }

    /// Builds a rejection response (the handshake was detected but the
    /// application declined it, e.g. no acceptable subprotocol).
    pub fn reject(&self, status: StatusCode) -> Response<()> {
        Response::builder()
            .status(status)
            .body(())
            .expect("rejection response is well-formed")
    }
}

fn header_token_present(headers: &HeaderMap, name: impl http::header::AsHeaderName, token: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v: &HeaderValue| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|t| t.trim().eq_ignore_ascii_case(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(key: &str) -> Request<()> {
        Request::builder()
            .method(Method::GET)
            .header(CONNECTION, "Upgrade")
            .header(UPGRADE, "websocket")
            .header("sec-websocket-version", "13")
            .header("sec-websocket-key", key)
            .body(())
            .unwrap()
    }

    #[test]
    fn detects_and_validates_handshake() {
        let req = request("dGhlIHNhbXBsZSBub25jZQ==");
        let hs = Handshake::detect(&req).unwrap().unwrap();
        assert_eq!(hs.accept_value(), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn non_upgrade_request_detects_as_none() {
        let req = Request::builder().method(Method::GET).body(()).unwrap();
        assert!(Handshake::detect(&req).unwrap().is_none());
    }

    #[test]
    fn wrong_version_is_rejected() {
        let mut req = request("dGhlIHNhbXBsZSBub25jZQ==");
        req.headers_mut()
            .insert("sec-websocket-version", HeaderValue::from_static("8"));
        assert!(Handshake::detect(&req).is_err());
    }

    #[test]
    fn subprotocols_are_split_and_trimmed() {
        let mut req = request("dGhlIHNhbXBsZSBub25jZQ==");
        req.headers_mut().insert(
            "sec-websocket-protocol",
            HeaderValue::from_static("chat, superchat"),
        );
        let hs = Handshake::detect(&req).unwrap().unwrap();
        assert_eq!(hs.protocols(), &["chat".to_owned(), "superchat".to_owned()]);
    }
}
