//! The header codec registry (spec §4.1): decodes raw header bytes into
//! typed [`Header`] values and back, dispatching by lowercased name to a
//! registered codec with a generic string codec as fallback.

mod accept;
mod content_type;
mod media_range;
mod parameterized;
mod registry;
mod set_cookie;
mod validate;

pub use accept::{Accept, AcceptLanguage, LanguageRange};
pub use content_type::ContentType;
pub use media_range::MediaRange;
pub use parameterized::{ParameterizedOptions, ParameterizedValue};
pub use registry::Registry as CodecRegistry;
pub use set_cookie::SetCookie;
pub use validate::{validate_name, validate_value};

pub use http::{HeaderName, HeaderValue};

use crate::error::{Decode, Error};

/// A single decoded header field: its lowercased name, the raw value bytes,
/// and — for headers with a registered codec — its parsed representation.
#[derive(Debug, Clone)]
pub struct Header {
    name: HeaderName,
    raw: String,
    parsed: Option<ParameterizedValue>,
}

impl Header {
    pub fn name(&self) -> &HeaderName {
        &self.name
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn parsed(&self) -> Option<&ParameterizedValue> {
        self.parsed.as_ref()
    }

    /// Splits a raw `name: value` line, validating the name per RFC 7230
    /// §3.2.6 and the value for printable/HTAB-only bytes, then dispatches
    /// to the registered codec for `name` (or the generic string codec).
    ///
    /// On malformed input, no bytes are consumed from the caller's
    /// perspective: the line is rejected as a whole and the caller's reader
    /// index is unaffected (the caller passes a `&str` slice it already
    /// owns; rejecting here simply means "do not advance past this line").
    pub fn decode_line(line: &str, registry: &registry::Registry) -> Result<Header, Error> {
        let colon = line
            .find(':')
            .ok_or_else(|| Error::new_decode(Decode::Header))?;
        let (name, value) = line.split_at(colon);
        let value = &value[1..];
        Header::decode(name, value, registry)
    }

    /// Decode a single already-split `(name, value)` pair.
    pub fn decode(name: &str, value: &str, registry: &registry::Registry) -> Result<Header, Error> {
        if name.is_empty() {
            return Err(Error::new_decode(Decode::Header));
        }
        validate::validate_name(name)?;
        let value = value.trim_matches(|c| c == ' ' || c == '\t');
        validate::validate_value(value)?;

        let lower = name.to_ascii_lowercase();
        let header_name =
            HeaderName::from_bytes(lower.as_bytes()).map_err(|_| Error::new_decode(Decode::Header))?;

        let parsed = registry.decode(&lower, value);

        Ok(Header {
            name: header_name,
            raw: value.to_owned(),
            parsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_name() {
        let reg = registry::Registry::with_defaults();
        assert!(Header::decode_line(": value", &reg).is_err());
    }

    #[test]
    fn rejects_whitespace_in_name() {
        let reg = registry::Registry::with_defaults();
        assert!(Header::decode("foo bar", "v", &reg).is_err());
    }

    #[test]
    fn rejects_control_bytes_in_value() {
        let reg = registry::Registry::with_defaults();
        assert!(Header::decode("x-test", "bad\u{0001}value", &reg).is_err());
    }

    #[test]
    fn decodes_ordinary_line() {
        let reg = registry::Registry::with_defaults();
        let h = Header::decode_line("X-Request-Id: abc-123", &reg).unwrap();
        assert_eq!(h.name().as_str(), "x-request-id");
        assert_eq!(h.raw(), "abc-123");
    }
}
