//! `permessage-deflate` (RFC 7692): the one WebSocket extension spec §6
//! names (`ws_frame_compression_enabled`, `ws_message_compression_enabled`
//! plus level/window-size negotiation flags). Negotiation parses the
//! client's `Sec-WebSocket-Extensions` offer, picks parameters this server
//! supports, and the codec compresses/decompresses message payloads with
//! `flate2`'s raw-deflate stream (RFC 7692 §7.2 requires the
//! `0x00 0x00 0xFF 0xFF` trailer be stripped from compressed output and
//! re-appended before inflating).

use crate::config::WebSocketConfig;

/// Parameters negotiated for one connection's `permessage-deflate`
/// extension, per RFC 7692 §7.1.
#[derive(Debug, Clone, Copy)]
pub struct PermessageDeflateParams {
    pub server_no_context_takeover: bool,
    pub client_no_context_takeover: bool,
    pub server_max_window_bits: u8,
    pub client_max_window_bits: u8,
}

impl Default for PermessageDeflateParams {
    fn default() -> Self {
        PermessageDeflateParams {
            server_no_context_takeover: false,
            client_no_context_takeover: false,
            server_max_window_bits: 15,
            client_max_window_bits: 15,
        }
    }
}

/// Parses the client's offered `Sec-WebSocket-Extensions` header value and
/// negotiates `permessage-deflate` parameters if both the client offered it
/// and `cfg` enables it. Returns `None` if no extension was negotiated.
pub fn negotiate(header: Option<&str>, cfg: &WebSocketConfig) -> Option<PermessageDeflateParams> {
    if !cfg.message_compression_enabled && !cfg.frame_compression_enabled {
        return None;
    }
    let header = header?;
    for offer in header.split(',') {
        let mut params = PermessageDeflateParams::default();
        let mut parts = offer.split(';').map(str::trim);
        let name = parts.next()?;
        if !name.eq_ignore_ascii_case("permessage-deflate") {
            continue;
        }
        let mut ok = true;
        for param in parts {
            if param.is_empty() {
                continue;
            }
            let (key, value) = param.split_once('=').unwrap_or((param, ""));
            let key = key.trim();
            let value = value.trim().trim_matches('"');
            match key.to_ascii_lowercase().as_str() {
                "server_no_context_takeover" => params.server_no_context_takeover = true,
                "client_no_context_takeover" => params.client_no_context_takeover = true,
                "server_max_window_bits" => match value.parse() {
                    Ok(bits @ 8..=15) => params.server_max_window_bits = bits,
                    _ => {
                        ok = false;
                        break;
                    }
                },
                "client_max_window_bits" => match value.parse::<u8>() {
                    Ok(bits) if (8..=15).contains(&bits) => params.client_max_window_bits = bits,
                    Err(_) if value.is_empty() => {}
                    _ => {
                        ok = false;
                        break;
                    }
                },
                _ => {
                    ok = false;
                    break;
                }
            }
        }
        if ok {
            return Some(params);
        }
    }
    None
}

/// Renders the negotiated parameters back into a `Sec-WebSocket-Extensions`
/// response value.
pub fn to_header_value(params: &PermessageDeflateParams) -> String {
    let mut s = String::from("permessage-deflate");
    if params.server_no_context_takeover {
        s.push_str("; server_no_context_takeover");
    }
    if params.client_no_context_takeover {
        s.push_str("; client_no_context_takeover");
    }
    if params.server_max_window_bits != 15 {
        s.push_str(&format!("; server_max_window_bits={}", params.server_max_window_bits));
    }
    s
}

#[cfg(feature = "compression")]
pub use codec::PermessageDeflate;

#[cfg(feature = "compression")]
mod codec {
    use bytes::Bytes;
    use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress};

    use super::PermessageDeflateParams;
    use crate::error::Error;

    const TRAILER: [u8; 4] = [0x00, 0x00, 0xFF, 0xFF];

    /// Per-connection compressor/decompressor state. Context takeover
    /// (reusing the deflate window across messages) is the default; each
    /// `*_no_context_takeover` flag resets its side's stream after every
    /// message instead.
    #[derive(Debug)]
    pub struct PermessageDeflate {
        params: PermessageDeflateParams,
        compress: Compress,
        decompress: Decompress,
    }

    impl PermessageDeflate {
        pub fn new(params: PermessageDeflateParams, level: Compression) -> PermessageDeflate {
            PermessageDeflate {
                params,
                compress: Compress::new(level, false),
                decompress: Decompress::new(false),
            }
        }

        /// Compresses one message payload, stripping the trailing
        /// `0x00 0x00 0xFF 0xFF` per RFC 7692 §7.2.1.
        pub fn deflate(&mut self, input: &[u8]) -> Result<Bytes, Error> {
            let mut out = Vec::with_capacity(input.len());
            self.compress
                .compress_vec(input, &mut out, FlushCompress::Sync)
                .map_err(|_| Error::new_frame())?;
            if self.params.server_no_context_takeover {
                self.compress.reset();
            }
            if out.len() >= 4 && out[out.len() - 4..] == TRAILER {
                out.truncate(out.len() - 4);
            }
            Ok(Bytes::from(out))
        }

        /// Decompresses one message payload, re-appending the trailer the
        /// sender stripped per RFC 7692 §7.2.2.
        pub fn inflate(&mut self, input: &[u8]) -> Result<Bytes, Error> {
            let mut buf = Vec::with_capacity(input.len() + 4);
            buf.extend_from_slice(input);
            buf.extend_from_slice(&TRAILER);

            let mut out = Vec::with_capacity(input.len() * 4);
            self.decompress
                .decompress_vec(&buf, &mut out, FlushDecompress::Sync)
                .map_err(|_| Error::new_frame())?;
            if self.params.client_no_context_takeover {
                self.decompress.reset(false);
            }
            Ok(Bytes::from(out))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn round_trips_a_message_through_deflate_and_inflate() {
            let params = PermessageDeflateParams::default();
            let mut codec = PermessageDeflate::new(params, Compression::default());
            let original = b"hello hello hello websocket websocket";
            let compressed = codec.deflate(original).unwrap();
            let restored = codec.inflate(&compressed).unwrap();
            assert_eq!(&restored[..], original);
        }

        #[test]
        fn no_context_takeover_still_round_trips_each_message() {
            let mut params = PermessageDeflateParams::default();
            params.server_no_context_takeover = true;
            params.client_no_context_takeover = true;
            let mut codec = PermessageDeflate::new(params, Compression::fast());
            for msg in [&b"one"[..], &b"two"[..], &b"three"[..]] {
                let compressed = codec.deflate(msg).unwrap();
                let restored = codec.inflate(&compressed).unwrap();
                assert_eq!(&restored[..], msg);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(enabled: bool) -> WebSocketConfig {
        let mut cfg = WebSocketConfig::default();
        cfg.message_compression_enabled = enabled;
        cfg
    }

    #[test]
    fn negotiates_plain_offer() {
        let params = negotiate(Some("permessage-deflate"), &cfg(true)).unwrap();
        assert_eq!(params.server_max_window_bits, 15);
    }

    #[test]
    fn negotiates_with_parameters() {
        let params = negotiate(
            Some("permessage-deflate; client_max_window_bits=10; server_no_context_takeover"),
            &cfg(true),
        )
        .unwrap();
        assert_eq!(params.client_max_window_bits, 10);
        assert!(params.server_no_context_takeover);
    }

    #[test]
    fn disabled_by_config_never_negotiates() {
        assert!(negotiate(Some("permessage-deflate"), &cfg(false)).is_none());
    }

    #[test]
    fn unknown_extension_is_skipped() {
        assert!(negotiate(Some("x-webkit-deflate-frame"), &cfg(true)).is_none());
    }

    #[test]
    fn header_rendering_includes_set_parameters() {
        let mut params = PermessageDeflateParams::default();
        params.server_no_context_takeover = true;
        let rendered = to_header_value(&params);
        assert!(rendered.contains("permessage-deflate"));
        assert!(rendered.contains("server_no_context_takeover"));
    }
}
