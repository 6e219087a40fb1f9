#![deny(missing_debug_implementations)]

//! # reactor-core
//!
//! A reactive HTTP/1.x + HTTP/2 connection core and a generic,
//! composable request/response routing engine.
//!
//! The crate does not ship an application framework: it exposes the
//! per-connection state machines (HTTP/1.1 with pipelining, HTTP/2
//! multiplexing), a pluggable header codec, a lazy backpressure-aware body
//! stream model, and a routing chain that resolves a resource from a
//! request. Handlers, error handlers, TLS material, and compression codecs
//! are consumed as injected capabilities (see [`controller`] and
//! [`resource`]).
//!
//! ## Layering
//!
//! - [`header`] — header field decode/encode registry.
//! - [`body`] — lazy, backpressure-aware body stream model.
//! - [`exchange`] — the per-request (request, response, context) triple.
//! - [`proto::h1`] — the HTTP/1.x connection state machine.
//! - [`proto::h2`] — the HTTP/2 connection state machine.
//! - [`negotiator`] — cleartext/TLS/H2C/ALPN channel configuration.
//! - [`routing`] — the routing engine (routes, links, router, manager).
//! - [`websocket`] — WebSocket handshake, framing, and close protocol.

#[macro_use]
mod macros;

pub mod common;
pub mod rt;

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub mod controller;
pub mod ext;
pub mod resource;
pub mod status;

pub mod header;

pub mod body;
pub mod exchange;

pub mod proto;

pub mod negotiator;

pub mod routing;

pub mod websocket;

pub mod server;

pub mod upgrade;
