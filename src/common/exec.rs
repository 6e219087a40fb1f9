//! Executor glue so HTTP/2's per-stream futures (and upgrade futures) can be
//! spawned onto whatever runtime the embedder provides, rather than hard
//! depending on `tokio::spawn`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::rt::Executor;

pub(crate) type BoxSendFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// The executor used by a connection to drive background work: HTTP/2
/// per-stream dispatch, and futures produced by a completed protocol
/// upgrade.
#[derive(Clone)]
pub enum Exec {
    /// No background executor configured; `execute()` panics. Suitable only
    /// for HTTP/1.x connections without upgrades, which never spawn.
    Default,
    /// A user-supplied executor.
    Executor(Arc<dyn Executor<BoxSendFuture> + Send + Sync>),
}

impl Exec {
    pub(crate) fn execute<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match *self {
            Exec::Default => panic!("reactor-core: executor must be set to drive HTTP/2 streams"),
            Exec::Executor(ref e) => e.execute(Box::pin(fut)),
        }
    }
}

impl fmt::Debug for Exec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exec").finish()
    }
}

/// Trait alias tying an executor to the specific per-stream future type an
/// HTTP/2 connection spawns.
#[cfg(feature = "http2")]
pub trait ConnStreamExec<F>: Clone {
    fn execute_h2stream(&mut self, fut: F);
}

#[cfg(feature = "http2")]
impl<F> ConnStreamExec<F> for Exec
where
    F: Future<Output = ()> + Send + 'static,
{
    fn execute_h2stream(&mut self, fut: F) {
        self.execute(fut)
    }
}

#[cfg(feature = "http2")]
impl<E, F> ConnStreamExec<F> for E
where
    E: Executor<F> + Clone,
    F: Future<Output = ()>,
{
    fn execute_h2stream(&mut self, fut: F) {
        self.execute(fut)
    }
}
