//! The body stream model (spec §4.3): a single-subscription, backpressure
//! aware inbound body and a write-once outbound body, plus the
//! url-encoded/multipart views built on top of the inbound contract.

mod form;
pub mod incoming;
pub(crate) mod length;
mod multipart;
pub(crate) mod outbound;

pub(crate) use length::DecodedLength;

pub use form::UrlEncodedForm;
pub use incoming::{ByteStream, Incoming};
pub use multipart::{Multipart, Part};
pub use outbound::{OutgoingBody, ResponseSink, SseEvent};
