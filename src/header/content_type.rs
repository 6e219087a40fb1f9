//! `Content-Type` codec: splits `type/subtype` (both must be tokens) and
//! recognizes the `charset` and `boundary` parameters (spec §4.1).

use crate::error::Error;
use crate::header::media_range::MediaRange;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    pub media: MediaRange,
}

impl ContentType {
    pub fn parse(input: &str) -> Result<ContentType, Error> {
        let media = MediaRange::parse(input)?;
        Ok(ContentType { media })
    }

    pub fn charset(&self) -> Option<&str> {
        self.media.params.get("charset").map(String::as_str)
    }

    pub fn boundary(&self) -> Option<&str> {
        self.media.params.get("boundary").map(String::as_str)
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_charset_and_boundary() {
        let ct = ContentType::parse("multipart/form-data; boundary=----abc").unwrap();
        assert_eq!(ct.boundary(), Some("----abc"));
        assert_eq!(ct.charset(), None);

        let ct = ContentType::parse("text/plain; charset=utf-8").unwrap();
        assert_eq!(ct.charset(), Some("utf-8"));
    }
}
