//! Codec-layer negotiation and application (spec §4.6): picks a response
//! encoding from `Accept-Encoding` and applies it, and reverses an inbound
//! `Content-Encoding` on request bodies. Installed only when
//! [`CompressionConfig`]'s `compression_enabled` / `decompression_enabled`
//! flags are set — otherwise every connection behaves exactly as if this
//! module didn't exist.
//!
//! Grounded in the permessage-deflate codec's use of `flate2`
//! (`examples/PrivateRookie-ws-client/src/codec/deflate.rs`), generalized
//! from a per-frame `Compress`/`Decompress` pair to a whole-body
//! encoder/decoder, plus `zstd`'s single-shot `encode_all`/`decode_all`.

use std::io::Write as _;

use http::HeaderValue;

use crate::config::CompressionConfig;
use crate::error::{Decode, Error};

/// A negotiated or advertised content coding. `Identity` is never returned
/// by [`negotiate`] (the caller just leaves the body untouched instead),
/// but [`Coding::of_header`] needs it to recognise an inbound
/// `Content-Encoding: identity` as "no decoding needed" rather than
/// "unsupported".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coding {
    Gzip,
    Deflate,
    Zstd,
    Identity,
}

impl Coding {
    fn of_token(token: &str) -> Option<Coding> {
        match token {
            "gzip" | "x-gzip" => Some(Coding::Gzip),
            "deflate" => Some(Coding::Deflate),
            "zstd" => Some(Coding::Zstd),
            "identity" => Some(Coding::Identity),
            _ => None,
        }
    }

    /// Parses a single `Content-Encoding` value (request bodies never carry
    /// more than one coding token in this design; a comma-separated chain
    /// is out of scope).
    pub fn of_header(value: &str) -> Option<Coding> {
        Coding::of_token(value.trim().to_ascii_lowercase().as_str())
    }

    pub fn header_value(self) -> HeaderValue {
        HeaderValue::from_static(match self {
            Coding::Gzip => "gzip",
            Coding::Deflate => "deflate",
            Coding::Zstd => "zstd",
            Coding::Identity => "identity",
        })
    }
}

/// Picks the best `Accept-Encoding` candidate the codec layer actually
/// supports, same quality-weighted scan as `Accept`/`Accept-Language`
/// (highest `q` wins; a `q=0` entry excludes that coding). Returns `None`
/// when compression is disabled, the header is absent, or nothing offered
/// is one of `gzip`/`deflate`/`zstd`.
pub fn negotiate(accept_encoding: Option<&str>, cfg: &CompressionConfig) -> Option<Coding> {
    if !cfg.compression_enabled {
        return None;
    }
    let header = accept_encoding?;
    let mut best: Option<(Coding, f32)> = None;
    for entry in header.split(',') {
        let mut parts = entry.split(';');
        let token = parts.next().unwrap_or("").trim().to_ascii_lowercase();
        let quality = parts
            .find_map(|p| p.trim().strip_prefix("q="))
            .and_then(|v| v.trim().parse::<f32>().ok())
            .unwrap_or(1.0);
        if quality <= 0.0 {
            continue;
        }
        let Some(coding @ (Coding::Gzip | Coding::Deflate | Coding::Zstd)) = Coding::of_token(&token) else {
            continue;
        };
        if best.map_or(true, |(_, best_q)| quality > best_q) {
            best = Some((coding, quality));
        }
    }
    best.map(|(coding, _)| coding)
}

/// Compresses `input` under `coding`. Infallible in practice (all three
/// codecs write to an in-memory `Vec`), but kept `Result` so a future codec
/// with real I/O doesn't need a signature change.
pub fn compress(coding: Coding, input: &[u8], cfg: &CompressionConfig) -> Result<Vec<u8>, Error> {
    match coding {
        Coding::Gzip => {
            let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::new(cfg.gzip_level));
            enc.write_all(input).map_err(Error::new_io)?;
            enc.finish().map_err(Error::new_io)
        }
        // HTTP's `deflate` coding is, despite the name, the zlib-wrapped
        // format (RFC 1950), not raw DEFLATE.
        Coding::Deflate => {
            let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::new(cfg.deflate_level));
            enc.write_all(input).map_err(Error::new_io)?;
            enc.finish().map_err(Error::new_io)
        }
        Coding::Zstd => zstd::stream::encode_all(input, cfg.zstd_level).map_err(Error::new_io),
        Coding::Identity => Ok(input.to_vec()),
    }
}

/// Reverses an inbound `Content-Encoding`. A corrupt payload surfaces as a
/// decode error, handled by the caller exactly like a framing error (spec
/// §4.4's decoder-error policy covers both).
pub fn decompress(coding: Coding, input: &[u8]) -> Result<Vec<u8>, Error> {
    match coding {
        Coding::Gzip => {
            let mut out = Vec::new();
            std::io::Read::read_to_end(&mut flate2::read::GzDecoder::new(input), &mut out)
                .map_err(|_| Error::new_decode(Decode::Body))?;
            Ok(out)
        }
        Coding::Deflate => {
            let mut out = Vec::new();
            std::io::Read::read_to_end(&mut flate2::read::ZlibDecoder::new(input), &mut out)
                .map_err(|_| Error::new_decode(Decode::Body))?;
            Ok(out)
        }
        Coding::Zstd => zstd::stream::decode_all(input).map_err(|_| Error::new_decode(Decode::Body)),
        Coding::Identity => Ok(input.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> CompressionConfig {
        CompressionConfig {
            compression_enabled: true,
            decompression_enabled: true,
            content_size_threshold: 0,
            deflate_level: 6,
            gzip_level: 6,
            zstd_level: 3,
        }
    }

    #[test]
    fn negotiate_picks_highest_quality_supported_coding() {
        let cfg = enabled();
        let coding = negotiate(Some("br;q=1.0, gzip;q=0.8, deflate;q=0.9"), &cfg);
        assert_eq!(coding, Some(Coding::Deflate));
    }

    #[test]
    fn negotiate_respects_q_zero() {
        let cfg = enabled();
        assert_eq!(negotiate(Some("gzip;q=0"), &cfg), None);
    }

    #[test]
    fn negotiate_disabled_is_always_none() {
        let mut cfg = enabled();
        cfg.compression_enabled = false;
        assert_eq!(negotiate(Some("gzip"), &cfg), None);
    }

    #[test]
    fn gzip_roundtrip() {
        let cfg = enabled();
        let original = b"the quick brown fox jumps over the lazy dog".repeat(10);
        let compressed = compress(Coding::Gzip, &original, &cfg).unwrap();
        assert!(compressed.len() < original.len());
        let decompressed = decompress(Coding::Gzip, &compressed).unwrap();
        assert_eq!(decompressed, original);
    }

    #[test]
    fn deflate_roundtrip() {
        let cfg = enabled();
        let original = b"reactor-core reactor-core reactor-core".to_vec();
        let compressed = compress(Coding::Deflate, &original, &cfg).unwrap();
        let decompressed = decompress(Coding::Deflate, &compressed).unwrap();
        assert_eq!(decompressed, original);
    }

    #[test]
    fn zstd_roundtrip() {
        let cfg = enabled();
        let original = b"zstandard compressed body payload".repeat(5);
        let compressed = compress(Coding::Zstd, &original, &cfg).unwrap();
        let decompressed = decompress(Coding::Zstd, &compressed).unwrap();
        assert_eq!(decompressed, original);
    }

    #[test]
    fn of_header_is_case_insensitive() {
        assert_eq!(Coding::of_header("GZIP"), Some(Coding::Gzip));
        assert_eq!(Coding::of_header("unknown"), None);
    }
}
