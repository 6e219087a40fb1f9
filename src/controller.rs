//! The `Controller` capability consumed by the connection core (spec §6).
//!
//! The core never interprets application semantics: it hands a fully-formed
//! [`crate::exchange::Exchange`] to a `Controller` and awaits a completion
//! signal. Error handling is a second, narrower entry point: when a handler
//! fails, the core calls `on_error` with the same exchange plus the error
//! that occurred, giving the embedder a chance to still write a response.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::exchange::Exchange;
use crate::Error;

/// The exchange handed back with its outcome once a `Controller` call
/// completes. Taking `Exchange` by value (rather than `&mut`) keeps the
/// future self-contained, which is what lets the HTTP/1.x connection queue
/// several in-flight calls for pipelining (spec §4.4) without a
/// self-referential borrow between the exchange and its driving future.
pub type ControllerOutcome<Ctx> = (Exchange<Ctx>, Result<(), Error>);

/// A boxed, type-erased future, matching the shape `Controller` methods
/// return so the trait stays object-safe.
pub type ControllerFuture<Ctx> = Pin<Box<dyn Future<Output = ControllerOutcome<Ctx>> + Send>>;

/// Consumed by the connection core to dispatch exchanges to application
/// code. Implemented by routing-engine-backed dispatchers, or directly by
/// an application.
///
/// Methods take `self: Arc<Self>` rather than `&self` so the returned
/// future is `'static`: the connection keeps several of these queued at
/// once for pipelining (spec §4.4) without tying their lifetime to a
/// borrow of the connection itself.
pub trait Controller<Ctx = ()>: Send + Sync
where
    Ctx: Send + 'static,
{
    /// Produce a user context object for a newly created exchange. The core
    /// never inspects the returned value.
    fn new_context(&self) -> Ctx;

    /// Handle one exchange to completion (writing a response, or calling
    /// `reset()`), handing it back once done.
    fn call(self: Arc<Self>, exchange: Exchange<Ctx>) -> ControllerFuture<Ctx>;

    /// Handle a failure raised while producing a response for `exchange`.
    /// If this also fails, the core maps the error to an HTTP status with
    /// the status's default reason phrase as the body (spec §7).
    fn on_error(self: Arc<Self>, exchange: Exchange<Ctx>, error: Error) -> ControllerFuture<Ctx>;
}
