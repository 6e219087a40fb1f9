//! The HTTP/1.x connection core (spec §4.4): request-line/header parsing,
//! transfer-coding decode/encode, buffered I/O with read/flush coalescing,
//! and the pipelined dispatch loop.

mod conn;
mod decode;
mod dispatch;
mod encode;
mod io;
mod parse;

pub use conn::{Builder, Connection};
