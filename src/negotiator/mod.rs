//! Channel configurer / negotiator (spec §4.6): decides cleartext vs TLS,
//! detects an H2C upgrade, and picks the protocol a freshly-accepted
//! connection should run before handing it to [`crate::proto::h1`] or
//! [`crate::proto::h2`]. [`compression`] is the codec-layer half of the
//! same component: negotiating and applying `Accept-Encoding`/
//! `Content-Encoding` once a connection is already running.

mod h2c;
#[cfg(feature = "tls")]
pub mod tls;
#[cfg(feature = "compression")]
pub mod compression;

pub use h2c::{detect_preface, Protocol, H2_PREFACE};
