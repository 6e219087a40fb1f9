//! Per-connection protocol state machines: HTTP/1.x with pipelining
//! (spec §4.4) and, behind the `http2` feature, multiplexed HTTP/2.

#[cfg(feature = "http1")]
pub mod h1;

#[cfg(feature = "http2")]
pub mod h2;
