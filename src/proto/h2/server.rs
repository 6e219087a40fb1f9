use std::sync::Arc;

use bytes::{Buf, Bytes};
use h2::server::SendResponse;
use h2::{Reason, SendStream};
use http::{HeaderValue, Response, StatusCode};
use http_body::Body as _;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::body::Incoming;
use crate::body::length::DecodedLength;
use crate::body::outbound::OutgoingBody;
use crate::common::drain;
use crate::common::exec::Exec;
use crate::config::{CompressionConfig, Http2Config};
use crate::controller::Controller;
use crate::error::Error;
use crate::exchange::{Exchange, State};
use crate::rt::TokioExecutor;

/// Builds a [`Connection`] over an accepted socket, applying the server's
/// HTTP/2 settings (spec §6's `Http2Config`) to the initial `SETTINGS`
/// frame. Per-stream dispatch runs on the [`Exec`] (teacher: `rt::Executor`)
/// rather than directly on `tokio::spawn`, defaulting to one backed by
/// `tokio::spawn` when nothing else is configured.
#[derive(Debug, Clone)]
pub struct Builder {
    settings: Http2Config,
    watch: Option<drain::Watch>,
    exec: Exec,
    compression: CompressionConfig,
}

impl Builder {
    pub fn new(settings: Http2Config) -> Self {
        Builder {
            settings,
            watch: None,
            exec: Exec::Executor(Arc::new(TokioExecutor)),
            compression: CompressionConfig::default(),
        }
    }

    /// Attaches a graceful-shutdown watch (spec §5): once the owning
    /// [`drain::Signal`] drains, the connection sends `GOAWAY` and finishes
    /// whichever streams are already open.
    pub fn with_watch(mut self, watch: drain::Watch) -> Self {
        self.watch = Some(watch);
        self
    }

    /// Overrides the executor used to run per-stream dispatch futures.
    pub fn with_executor(mut self, exec: Exec) -> Self {
        self.exec = exec;
        self
    }

    /// Installs the codec layer (spec §4.6). Unlike HTTP/1.x, only response
    /// compression is wired up here: decompressing a request body would mean
    /// buffering the whole `RecvStream` before handing it to the controller,
    /// defeating per-stream flow control, so inbound `Content-Encoding` on
    /// HTTP/2 passes through unmodified.
    pub fn with_compression(mut self, compression: CompressionConfig) -> Self {
        self.compression = compression;
        self
    }

    /// Performs the `h2` server handshake and returns a driver future.
    pub async fn serve_connection<T, C, Ctx>(
        &self,
        io: T,
        controller: Arc<C>,
    ) -> Result<Connection<T, C, Ctx>, Error>
    where
        T: AsyncRead + AsyncWrite + Unpin,
        C: Controller<Ctx> + 'static,
        Ctx: Send + 'static,
    {
        let conn = h2::server::Builder::new()
            .initial_window_size(self.settings.initial_window_size)
            .max_concurrent_streams(self.settings.max_concurrent_streams)
            .max_frame_size(self.settings.max_frame_size)
            .max_header_list_size(self.settings.max_header_list_size)
            .header_table_size(self.settings.header_table_size)
            .handshake(io)
            .await
            .map_err(Error::new_h2)?;

        Ok(Connection {
            conn,
            controller,
            watch: self.watch.clone(),
            exec: self.exec.clone(),
            compression: self.compression,
            _ctx: std::marker::PhantomData,
        })
    }
}

/// One HTTP/2 connection: accepts new streams and hands each off to the
/// [`Exec`] for independent dispatch. There is no cross-stream ordering to
/// preserve (spec §5), so unlike HTTP/1.x pipelining's FIFO queue, accepted
/// streams need no further bookkeeping here once spawned — the underlying
/// `h2` connection still has to be polled via `accept()` to actually drive
/// each stream's buffered writes onto the socket, which is why this loop
/// keeps running until `accept()` itself reports the connection is done.
pub struct Connection<T, C, Ctx = ()> {
    conn: h2::server::Connection<T, Bytes>,
    controller: Arc<C>,
    watch: Option<drain::Watch>,
    exec: Exec,
    compression: CompressionConfig,
    _ctx: std::marker::PhantomData<Ctx>,
}

impl<T, C, Ctx> std::fmt::Debug for Connection<T, C, Ctx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish()
    }
}

async fn watch_drained(watch: &mut Option<drain::Watch>) {
    match watch {
        Some(w) => w.changed().await,
        None => std::future::pending().await,
    }
}

impl<T, C, Ctx> Connection<T, C, Ctx>
where
    T: AsyncRead + AsyncWrite + Unpin,
    C: Controller<Ctx> + 'static,
    Ctx: Send + 'static,
{
    /// Drives the connection: accepts new streams, dispatches each to the
    /// controller, and writes its response back independently of every
    /// other stream (spec §4.5).
    pub async fn run(mut self) -> Result<(), Error> {
        let mut draining = false;
        loop {
            tokio::select! {
                biased;

                _ = watch_drained(&mut self.watch), if self.watch.is_some() && !draining => {
                    draining = true;
                    self.conn.graceful_shutdown();
                }

                accepted = self.conn.accept() => {
                    match accepted {
                        Some(Ok((request, respond))) => {
                            let controller = Arc::clone(&self.controller);
                            self.exec
                                .execute(serve_stream(controller, request, respond, self.compression));
                        }
                        Some(Err(e)) => return Err(Error::new_h2(e)),
                        None => return Ok(()),
                    }
                }
            }
        }
    }
}

async fn serve_stream<C, Ctx>(
    controller: Arc<C>,
    request: http::Request<h2::RecvStream>,
    respond: SendResponse<Bytes>,
    compression: CompressionConfig,
) where
    C: Controller<Ctx> + 'static,
    Ctx: Send + 'static,
{
    let content_length = request
        .headers()
        .get(http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    #[allow(unused_variables)]
    let accept_encoding = request
        .headers()
        .get(http::header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let (parts, recv) = request.into_parts();
    let incoming = Incoming::h2(recv, DecodedLength::from(content_length));
    let request = http::Request::from_parts(parts, incoming);

    let ctx = controller.new_context();
    let exchange = Exchange::new(request, ctx);
    let (exchange, result) = Arc::clone(&controller).call(exchange).await;

    let exchange = match finish_or_recover(Arc::clone(&controller), exchange, result).await {
        Some(exchange) => exchange,
        None => return,
    };

    if let Err(err) = write_response(exchange, respond, compression, accept_encoding.as_deref()).await {
        tracing::debug!(error = %err, "http/2 stream ended with an error");
    }
}

/// Resolves a `Controller::call` outcome to the exchange that should be
/// written back, running `on_error` once if the call itself failed.
/// Returns `None` if the exchange was reset and needs no response.
async fn finish_or_recover<C, Ctx>(
    controller: Arc<C>,
    exchange: Exchange<Ctx>,
    result: Result<(), Error>,
) -> Option<Exchange<Ctx>>
where
    C: Controller<Ctx> + 'static,
    Ctx: Send + 'static,
{
    if exchange.state() == State::Reset {
        return None;
    }
    match result {
        Ok(()) => Some(exchange),
        Err(err) => {
            let (exchange, result) = controller.on_error(exchange, err).await;
            if exchange.state() == State::Reset {
                return None;
            }
            Some(match result {
                Ok(()) => exchange,
                Err(_) => synthetic_error(exchange),
            })
        }
    }
}

fn synthetic_error<Ctx>(mut exchange: Exchange<Ctx>) -> Exchange<Ctx> {
    let needs_default = exchange.body().map(|sink| !sink.is_set()).unwrap_or(false);
    if needs_default {
        let _ = exchange.set_status(StatusCode::INTERNAL_SERVER_ERROR);
        if let Ok(sink) = exchange.body() {
            let _ = sink.string(
                StatusCode::INTERNAL_SERVER_ERROR
                    .canonical_reason()
                    .unwrap_or("Internal Server Error"),
            );
        }
    }
    exchange
}

async fn write_response<Ctx>(
    mut exchange: Exchange<Ctx>,
    mut respond: SendResponse<Bytes>,
    #[allow(unused_variables)] compression: CompressionConfig,
    #[allow(unused_variables)] accept_encoding: Option<&str>,
) -> Result<(), Error> {
    if exchange.state() == State::Reset {
        let reason = Reason::from(exchange.reset_code().unwrap_or(crate::exchange::CANCEL));
        respond.send_reset(reason);
        return Ok(());
    }

    let is_head = exchange.is_head();
    exchange.mark_headers_sent();
    let (status, mut headers, sink, trailers) = exchange.into_response_parts();
    super::strip_connection_headers(&mut headers);
    #[allow(unused_mut)]
    let mut body = sink.into_body();

    #[cfg(feature = "compression")]
    let body = {
        match (
            !headers.contains_key(http::header::CONTENT_ENCODING),
            crate::negotiator::compression::negotiate(accept_encoding, &compression),
            body.content_length_hint(),
        ) {
            (true, Some(coding), Some(len)) if len as usize >= compression.content_size_threshold => {
                let collected = http_body_util::BodyExt::collect(body).await?.to_bytes();
                let compressed = crate::negotiator::compression::compress(coding, &collected, &compression)?;
                headers.insert(http::header::CONTENT_ENCODING, coding.header_value());
                OutgoingBody::once(Bytes::from(compressed))
            }
            _ => body,
        }
    };

    if let Some(len) = body.content_length_hint() {
        if let Ok(v) = HeaderValue::from_str(&len.to_string()) {
            headers.insert(http::header::CONTENT_LENGTH, v);
        }
    }

    let mut response = Response::builder().status(status).body(()).expect("status is valid");
    *response.headers_mut() = headers;

    let end_of_stream = is_head || body.is_end_stream();
    let send_stream = respond
        .send_response(response, end_of_stream)
        .map_err(Error::new_h2)?;

    if !is_head && !end_of_stream {
        pipe_body(body, send_stream, trailers).await?;
    }
    Ok(())
}

/// Streams an [`OutgoingBody`] onto an `h2` [`SendStream`], respecting
/// stream-level flow control: each `DATA` frame is bounded by whatever
/// capacity `poll_capacity` grants, reserved just before use.
async fn pipe_body(
    body: OutgoingBody,
    mut tx: SendStream<Bytes>,
    trailers: Option<http::HeaderMap>,
) -> Result<(), Error> {
    let mut body = std::pin::pin!(body);
    loop {
        let frame = std::future::poll_fn(|cx| body.as_mut().poll_frame(cx)).await;
        match frame {
            Some(Ok(frame)) => {
                if frame.is_trailers() {
                    let t = frame.into_trailers().unwrap_or_default();
                    tx.send_trailers(t).map_err(Error::new_h2)?;
                    return Ok(());
                }
                let mut data = match frame.into_data() {
                    Ok(data) => data,
                    Err(_) => continue,
                };
                while data.has_remaining() {
                    tx.reserve_capacity(data.remaining());
                    match std::future::poll_fn(|cx| tx.poll_capacity(cx)).await {
                        Some(Ok(cap)) if cap > 0 => {
                            let chunk = data.split_to(cap.min(data.remaining()));
                            tx.send_data(chunk, false).map_err(Error::new_h2)?;
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return Err(Error::new_h2(e)),
                        None => return Err(Error::new_connection_closed()),
                    }
                }
            }
            Some(Err(e)) => {
                tx.send_reset(Reason::INTERNAL_ERROR);
                return Err(e);
            }
            None => break,
        }
    }

    if let Some(trailers) = trailers {
        tx.send_trailers(trailers).map_err(Error::new_h2)?;
    } else {
        tx.send_data(Bytes::new(), true).map_err(Error::new_h2)?;
    }
    Ok(())
}
