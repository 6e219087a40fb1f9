use crate::error::{Decode, Error};

/// RFC 7230 §3.2.6 `token` characters.
fn is_token_byte(b: u8) -> bool {
    matches!(b,
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.'
        | b'^' | b'_' | b'`' | b'|' | b'~'
    ) || b.is_ascii_alphanumeric()
}

/// Validates a header name is a nonempty RFC 7230 token.
pub fn validate_name(name: &str) -> Result<(), Error> {
    if name.is_empty() || !name.bytes().all(is_token_byte) {
        return Err(Error::new_decode(Decode::Header));
    }
    Ok(())
}

/// Validates a header value contains only printable ASCII or HTAB.
pub fn validate_value(value: &str) -> Result<(), Error> {
    for b in value.bytes() {
        let ok = b == b'\t' || (0x20..=0x7e).contains(&b) || b >= 0x80;
        if !ok {
            return Err(Error::new_decode(Decode::Header));
        }
    }
    Ok(())
}

/// HTTP/2 extra rule (spec §3): field names must already be lowercase, and
/// only the five defined pseudo-headers are recognized.
pub fn is_valid_h2_name(name: &str) -> bool {
    if let Some(pseudo) = name.strip_prefix(':') {
        matches!(pseudo, "method" | "path" | "scheme" | "authority" | "status")
    } else {
        name.bytes().all(|b| !b.is_ascii_uppercase()) && validate_name(name).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_whitespace_name() {
        assert!(validate_name("foo bar").is_err());
    }

    #[test]
    fn accepts_token_name() {
        assert!(validate_name("X-Custom_Header.1").is_ok());
    }

    #[test]
    fn rejects_control_byte_value() {
        assert!(validate_value("a\u{7}b").is_err());
    }

    #[test]
    fn accepts_htab_in_value() {
        assert!(validate_value("a\tb").is_ok());
    }

    #[test]
    fn h2_rejects_uppercase() {
        assert!(!is_valid_h2_name("Content-Type"));
    }

    #[test]
    fn h2_accepts_known_pseudo() {
        assert!(is_valid_h2_name(":method"));
        assert!(!is_valid_h2_name(":bogus"));
    }
}
