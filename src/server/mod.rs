//! The accept loop (spec §5): binds a listening socket, negotiates
//! cleartext HTTP/1.x, H2C, or TLS+ALPN HTTP/2 per accepted connection, and
//! drives each one on the configured [`Exec`] until graceful shutdown
//! drains the last connection.
//!
//! [`RouterController`] wires the [`crate::routing::Router`] into the
//! [`crate::controller::Controller`] seam this loop expects; applications
//! that want full control over dispatch can supply any other `Controller`
//! impl instead.

pub mod controller;
pub mod handler;

pub use controller::RouterController;
pub use handler::{handler_fn, Handler, HandlerFuture};

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};

use crate::common::drain::{self, Watch};
use crate::common::exec::Exec;
use crate::config::Config;
use crate::controller::Controller;
use crate::error::Error;
use crate::rt::TokioExecutor;

#[cfg(feature = "tls")]
use std::sync::Arc as StdArc;

/// Binds one listening socket and serves accepted connections against a
/// [`Controller`] until told to stop.
pub struct Server<C, Ctx = ()> {
    config: Config,
    controller: Arc<C>,
    exec: Exec,
    #[cfg(feature = "tls")]
    tls_acceptor: Option<tokio_rustls::TlsAcceptor>,
    _ctx: std::marker::PhantomData<fn() -> Ctx>,
}

impl<C, Ctx> fmt::Debug for Server<C, Ctx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("host", &self.config.server_host)
            .field("port", &self.config.server_port)
            .finish()
    }
}

impl<C, Ctx> Server<C, Ctx>
where
    C: Controller<Ctx> + 'static,
    Ctx: Send + 'static,
{
    pub fn new(config: Config, controller: Arc<C>) -> Self {
        Server {
            config,
            controller,
            exec: Exec::Executor(Arc::new(TokioExecutor)),
            #[cfg(feature = "tls")]
            tls_acceptor: None,
            _ctx: std::marker::PhantomData,
        }
    }

    /// Overrides the executor used for HTTP/2 per-stream dispatch (spec
    /// §5). HTTP/1.x connections never need one.
    pub fn with_executor(mut self, exec: Exec) -> Self {
        self.exec = exec;
        self
    }

    /// Enables TLS for this listener, negotiating `h2`/`http/1.1` over ALPN
    /// per `server_config`'s protocol list (spec §4.6).
    #[cfg(feature = "tls")]
    pub fn with_tls(mut self, server_config: rustls::ServerConfig) -> Self {
        self.tls_acceptor = Some(tokio_rustls::TlsAcceptor::from(StdArc::new(server_config)));
        self
    }

    /// Binds `server_host:server_port` and serves connections until
    /// `shutdown` resolves. Once it does, no further connections are
    /// accepted; in-flight ones are drained up to
    /// `graceful_shutdown_timeout` when `graceful_shutdown` is set,
    /// otherwise dropped immediately (spec §5).
    pub async fn serve(self, shutdown: impl Future<Output = ()>) -> Result<(), Error> {
        let listener = TcpListener::bind((self.config.server_host.as_str(), self.config.server_port))
            .await
            .map_err(Error::new_io)?;
        self.serve_on(listener, shutdown).await
    }

    /// Same as [`Server::serve`], over an already-bound listener (for tests
    /// that need to bind an ephemeral port and read it back before
    /// serving).
    pub async fn serve_on(self, listener: TcpListener, shutdown: impl Future<Output = ()>) -> Result<(), Error> {
        let (signal, watch) = drain::channel();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, _peer) = accepted.map_err(Error::new_io)?;
                    let _ = stream.set_nodelay(true);
                    self.spawn_connection(stream, watch.clone());
                }
                _ = &mut shutdown => break,
            }
        }

        if self.config.graceful_shutdown {
            let _ = tokio::time::timeout(self.config.graceful_shutdown_timeout, signal.drain()).await;
        }
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, watch: Watch) {
        let controller = Arc::clone(&self.controller);
        let config = self.config.clone();
        let exec = self.exec.clone();
        #[cfg(feature = "tls")]
        let tls_acceptor = self.tls_acceptor.clone();

        tokio::spawn(async move {
            let result = {
                #[cfg(feature = "tls")]
                if let Some(acceptor) = tls_acceptor {
                    serve_tls(stream, &acceptor, &config, controller, exec, watch).await
                } else {
                    serve_cleartext(stream, &config, controller, exec, watch).await
                }
                #[cfg(not(feature = "tls"))]
                {
                    serve_cleartext(stream, &config, controller, exec, watch).await
                }
            };
            if let Err(err) = result {
                tracing::debug!(error = %err, "connection ended with an error");
            }
        });
    }
}

async fn serve_cleartext<C, Ctx>(
    stream: TcpStream,
    config: &Config,
    controller: Arc<C>,
    exec: Exec,
    watch: Watch,
) -> Result<(), Error>
where
    C: Controller<Ctx> + 'static,
    Ctx: Send + 'static,
{
    #[cfg(feature = "http2")]
    if config.h2c_enabled {
        let (protocol, io) = crate::negotiator::detect_preface(stream).await?;
        return match protocol {
            crate::negotiator::Protocol::Http2 => run_h2(io, config, controller, exec, watch).await,
            crate::negotiator::Protocol::Http1 => run_h1(io, config, controller, watch).await,
        };
    }
    let _ = &exec;
    run_h1(stream, config, controller, watch).await
}

#[cfg(feature = "tls")]
async fn serve_tls<C, Ctx>(
    stream: TcpStream,
    acceptor: &tokio_rustls::TlsAcceptor,
    config: &Config,
    controller: Arc<C>,
    exec: Exec,
    watch: Watch,
) -> Result<(), Error>
where
    C: Controller<Ctx> + 'static,
    Ctx: Send + 'static,
{
    let tls = crate::negotiator::tls::accept(acceptor, stream, &config.tls).await?;
    #[cfg(feature = "http2")]
    {
        return match crate::negotiator::tls::negotiated_protocol(&tls) {
            crate::negotiator::Protocol::Http2 => run_h2(tls, config, controller, exec, watch).await,
            crate::negotiator::Protocol::Http1 => run_h1(tls, config, controller, watch).await,
        };
    }
    #[cfg(not(feature = "http2"))]
    {
        let _ = &exec;
        run_h1(tls, config, controller, watch).await
    }
}

async fn run_h1<T, C, Ctx>(io: T, config: &Config, controller: Arc<C>, watch: Watch) -> Result<(), Error>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    C: Controller<Ctx> + 'static,
    Ctx: Send + 'static,
{
    crate::proto::h1::Builder::new()
        .with_watch(watch)
        .with_compression(config.compression)
        .serve_connection(io, controller)
        .run()
        .await
}

#[cfg(feature = "http2")]
async fn run_h2<T, C, Ctx>(io: T, config: &Config, controller: Arc<C>, exec: Exec, watch: Watch) -> Result<(), Error>
where
    T: AsyncRead + AsyncWrite + Unpin,
    C: Controller<Ctx> + 'static,
    Ctx: Send + 'static,
{
    crate::proto::h2::Builder::new(config.http2)
        .with_watch(watch)
        .with_executor(exec)
        .with_compression(config.compression)
        .serve_connection(io, controller)
        .await?
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::controller::RouterController;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn serves_a_plain_http1_request() {
        let router: Arc<crate::routing::Router<Arc<dyn Handler<()>>>> = Arc::new(crate::routing::Router::new(false));
        router.insert(
            handler_fn(|mut ex, _| async move {
                let result = (|| {
                    ex.set_status(http::StatusCode::OK)?;
                    ex.body()?.string("ok")
                })();
                (ex, result)
            }),
            crate::routing::Criteria::new().path("/").unwrap().method(http::Method::GET),
        );
        let controller = Arc::new(RouterController::new(router, || ()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Server::new(Config::default(), controller);
        let (tx, rx) = tokio::sync::oneshot::channel();
        let serving = tokio::spawn(server.serve_on(listener, async move {
            let _ = rx.await;
        }));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
        let mut buf = vec![0u8; 256];
        let n = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let response = String::from_utf8_lossy(&buf[..n]);
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.ends_with("ok"), "{response}");

        let _ = tx.send(());
        serving.await.unwrap().unwrap();
    }
}
