//! WebSocket subsystem (spec §4, component H): the opening handshake
//! (RFC 6455 §4), frame and message codecs (§5), the close protocol with
//! timeouts (§7), and `permessage-deflate` negotiation (RFC 7692).
//!
//! Upgrading a detected [`handshake::Handshake`] onto the connection's
//! [`crate::upgrade::Upgraded`] transport is the negotiator/server layer's
//! job; this module owns everything after the transport is handed over.

pub mod close;
pub mod extensions;
pub mod frame;
pub mod handshake;
pub mod message;

mod stream;

pub use handshake::Handshake;
pub use message::{Message, Reassembler};
pub use stream::WebSocketStream;
