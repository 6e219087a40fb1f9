//! IO adapters shared by the HTTP/1.x and HTTP/2 connection cores.

mod rewind;

pub use self::rewind::Rewind;
