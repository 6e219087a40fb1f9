//! The `Resource` capability consumed by the outbound body model's
//! `resource()` producer (spec §6).

use std::future::Future;
use std::pin::Pin;
use std::time::SystemTime;

use crate::body::incoming::ByteStream;
use crate::Error;

/// A seekable, media-typed byte source — typically a file on disk, but any
/// implementer works (an in-memory blob, a network-backed object store
/// entry, …).
pub trait Resource: Send + Sync {
    /// Whether the resource currently exists.
    fn exists(&self) -> bool;

    /// Size in bytes, when known up front.
    fn size(&self) -> Option<u64>;

    /// The resource's media type, used to populate `Content-Type` when the
    /// response doesn't already set one.
    fn media_type(&self) -> Option<&str>;

    /// Last-modified timestamp, used to populate `Last-Modified` when the
    /// response doesn't already set one.
    fn last_modified(&self) -> Option<SystemTime>;

    /// Open a lazy byte stream over the resource's contents.
    fn read(&self) -> Pin<Box<dyn Future<Output = Result<ByteStream, Error>> + Send + '_>>;
}
