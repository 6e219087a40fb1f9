//! Runtime abstractions consumed by the connection core.
//!
//! The core never calls `tokio::spawn` directly so that it stays usable on
//! single-threaded or externally-scheduled runtimes (spec §5: "each
//! connection is pinned to one event-loop worker from a fixed-size pool").
//! An [`Executor`] is handed to a connection builder to run HTTP/2 per-stream
//! work and completed-upgrade futures; a [`Timer`] backs every timeout the
//! spec enumerates (handshake, idle, graceful-shutdown, WebSocket close).

use std::future::Future;
use std::time::Duration;

/// Executes futures produced by the connection core.
pub trait Executor<Fut> {
    /// Spawn the given future, running it to completion independent of the
    /// caller.
    fn execute(&self, fut: Fut);
}

/// A `tokio::spawn`-backed executor, usable whenever a `tokio` runtime is
/// available.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioExecutor;

impl<Fut> Executor<Fut> for TokioExecutor
where
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    fn execute(&self, fut: Fut) {
        tokio::spawn(fut);
    }
}

/// Produces sleep futures for the timeouts the core needs. Abstracted so
/// tests can substitute a fake clock.
pub trait Timer: Send + Sync + 'static {
    /// Returns a future that resolves after `duration`.
    fn sleep(&self, duration: Duration) -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>>;
}

/// A [`Timer`] backed by `tokio::time::sleep`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioTimer;

impl Timer for TokioTimer {
    fn sleep(&self, duration: Duration) -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(tokio::time::sleep(duration))
    }
}
