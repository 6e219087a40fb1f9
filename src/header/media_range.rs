//! RFC 7231 §5.3.2 media ranges, used by the content-type link (request
//! `Content-Type` matching) and the accept link (response-producible type
//! matching against `Accept`).

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Decode, Error};
use crate::header::parameterized::{self, ParameterizedOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRange {
    pub type_: String,
    pub subtype: String,
    pub params: BTreeMap<String, String>,
}

impl MediaRange {
    pub fn parse(input: &str) -> Result<MediaRange, Error> {
        let opts = ParameterizedOptions {
            allow_quoted_value: true,
            ..Default::default()
        };
        let parsed = parameterized::parse(input, &opts)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::new_decode(Decode::Header))?;

        let (type_, subtype) = parsed
            .primary
            .split_once('/')
            .ok_or_else(|| Error::new_decode(Decode::Header))?;
        let (type_, subtype) = (type_.trim(), subtype.trim());

        let is_token_or_star =
            |s: &str| s == "*" || (!s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b"!#$&-^_.+".contains(&b)));
        if !is_token_or_star(type_) || !is_token_or_star(subtype) {
            return Err(Error::new_decode(Decode::Header));
        }

        let mut params = BTreeMap::new();
        for (k, v) in parsed.params {
            params.insert(k.to_ascii_lowercase(), v);
        }

        Ok(MediaRange {
            type_: type_.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            params,
        })
    }

    /// How many of the three specificity tiers this range pins down:
    /// `type/subtype` (2) > `type/*` (1) > `*/*` (0), plus one point per
    /// registered parameter.
    pub fn specificity(&self) -> u32 {
        let base = match (self.type_.as_str(), self.subtype.as_str()) {
            ("*", "*") => 0,
            (_, "*") => 1,
            _ => 2,
        };
        base + self.params.len() as u32
    }

    /// Spec §4.7 rule 4: a range matches a concrete type if its type/subtype
    /// are wildcards or equal, and every range parameter equals the
    /// corresponding type parameter (a parameter missing on `other` fails
    /// the match).
    pub fn matches(&self, other: &MediaRange) -> bool {
        let type_ok = self.type_ == "*" || self.type_ == other.type_;
        let subtype_ok = self.subtype == "*" || self.subtype == other.subtype;
        if !type_ok || !subtype_ok {
            return false;
        }
        self.params
            .iter()
            .all(|(k, v)| other.params.get(k).is_some_and(|ov| ov.eq_ignore_ascii_case(v)))
    }
}

impl fmt::Display for MediaRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_, self.subtype)?;
        for (k, v) in &self.params {
            write!(f, ";{}={}", k, v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wildcard() {
        let r = MediaRange::parse("*/*").unwrap();
        assert_eq!(r.type_, "*");
        assert_eq!(r.subtype, "*");
    }

    #[test]
    fn specificity_orders_wildcards_below_exact() {
        let wild = MediaRange::parse("*/*").unwrap();
        let partial = MediaRange::parse("text/*").unwrap();
        let exact = MediaRange::parse("text/plain").unwrap();
        assert!(wild.specificity() < partial.specificity());
        assert!(partial.specificity() < exact.specificity());
    }

    #[test]
    fn matches_missing_param_fails() {
        let range = MediaRange::parse("application/json;version=2").unwrap();
        let concrete = MediaRange::parse("application/json").unwrap();
        assert!(!range.matches(&concrete));
    }

    #[test]
    fn matches_equal_param() {
        let range = MediaRange::parse("application/json;version=2").unwrap();
        let concrete = MediaRange::parse("application/json;version=2").unwrap();
        assert!(range.matches(&concrete));
    }

    #[test]
    fn rejects_malformed_primary() {
        assert!(MediaRange::parse("not-a-media-type").is_err());
    }
}
