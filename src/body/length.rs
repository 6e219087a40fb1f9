use std::fmt;

/// A request/response body length as known from `Content-Length`, inferred
/// as chunked, or bounded only by connection close.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct DecodedLength(u64);

const MAX_LEN: u64 = u64::MAX - 2;

impl DecodedLength {
    pub(crate) const CLOSE_DELIMITED: DecodedLength = DecodedLength(u64::MAX);
    pub(crate) const CHUNKED: DecodedLength = DecodedLength(u64::MAX - 1);
    pub(crate) const ZERO: DecodedLength = DecodedLength(0);

    pub(crate) fn checked_new(len: u64) -> Option<Self> {
        if len <= MAX_LEN {
            Some(DecodedLength(len))
        } else {
            None
        }
    }

    pub(crate) fn into_opt(self) -> Option<u64> {
        match self {
            DecodedLength::CHUNKED | DecodedLength::CLOSE_DELIMITED => None,
            DecodedLength(known) => Some(known),
        }
    }

    pub(crate) fn sub_if(&mut self, amt: u64) {
        if let DecodedLength(ref mut known) = *self {
            if *known != u64::MAX && *known != u64::MAX - 1 {
                *known = known.saturating_sub(amt);
            }
        }
    }

    pub(crate) fn is_exact(&self) -> bool {
        self.0 <= MAX_LEN
    }
}

impl From<Option<u64>> for DecodedLength {
    fn from(len: Option<u64>) -> Self {
        len.and_then(DecodedLength::checked_new)
            .unwrap_or(DecodedLength::CHUNKED)
    }
}

impl fmt::Debug for DecodedLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DecodedLength::CLOSE_DELIMITED => f.write_str("CLOSE_DELIMITED"),
            DecodedLength::CHUNKED => f.write_str("CHUNKED"),
            DecodedLength(n) => write!(f, "{}", n),
        }
    }
}
