//! The per-connection HTTP/1.x state machine (spec §4.4): parses a pipeline
//! of requests, decodes each body off the wire, dispatches every exchange
//! to a [`Controller`] as soon as its headers are known, and writes
//! responses back in strict arrival order regardless of handler completion
//! order.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use bytes::{Buf, BytesMut};
use http::{HeaderMap, HeaderValue, StatusCode, Version};
use http_body::Body as _;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::body::Incoming;
use crate::common::drain;
use crate::config::CompressionConfig;
use crate::controller::Controller;
use crate::error::{Decode, Error, Kind};
use crate::exchange::{Exchange, State};
use crate::proto::h1::decode::Decoder;
use crate::proto::h1::dispatch::{PumpQueue, Receiving, Slot};
use crate::proto::h1::encode::{encode_chunk, encode_end, encode_headers, BodyEncoding};
use crate::proto::h1::io::Buffered;
use crate::proto::h1::parse::{status_for_decode_error, try_parse_request, with_body};
use crate::upgrade::{self, Upgraded};

/// Builds a [`Connection`] over an accepted socket.
#[derive(Debug, Default)]
pub struct Builder {
    watch: Option<drain::Watch>,
    compression: CompressionConfig,
}

impl Builder {
    pub fn new() -> Self {
        Builder::default()
    }

    /// Attaches a graceful-shutdown watch (spec §5): once the owning
    /// [`drain::Signal`] drains, the connection stops starting new
    /// exchanges and closes as soon as the in-flight ones finish.
    pub fn with_watch(mut self, watch: drain::Watch) -> Self {
        self.watch = Some(watch);
        self
    }

    /// Installs the codec layer (spec §4.6): response compression and
    /// request decompression are only ever applied when the relevant flag
    /// in `compression` is set, and only take effect at all when this crate
    /// was built with the `compression` feature.
    pub fn with_compression(mut self, compression: CompressionConfig) -> Self {
        self.compression = compression;
        self
    }

    pub fn serve_connection<T, C, Ctx>(&self, io: T, controller: Arc<C>) -> Connection<T, C, Ctx>
    where
        T: AsyncRead + AsyncWrite + Unpin,
        C: Controller<Ctx> + 'static,
        Ctx: Send + 'static,
    {
        Connection {
            io: Buffered::new(io),
            controller,
            queue: VecDeque::new(),
            pending_upgrades: VecDeque::new(),
            receiving: None,
            closing: false,
            pending_synthetic_error: None,
            watch: self.watch.clone(),
            compression: self.compression,
        }
    }
}

/// Resolves once the owning [`drain::Signal`] drains, or never if `watch`
/// is `None`. Kept as a free function so the `tokio::select!` branch in
/// [`Connection::run`] borrows only `watch`, not the whole connection.
async fn watch_drained(watch: &mut Option<drain::Watch>) {
    match watch {
        Some(w) => w.changed().await,
        None => std::future::pending().await,
    }
}

/// Outcome of attempting to make progress on the currently-buffered bytes
/// without performing any further transport reads.
enum DispatchOutcome {
    Dispatched,
    NeedMoreData,
}

/// One HTTP/1.x connection, pinned to whichever task drives [`Connection::run`]
/// (spec §5: "each connection is pinned to one event-loop worker").
pub struct Connection<T, C, Ctx = ()> {
    io: Buffered<T>,
    controller: Arc<C>,
    queue: VecDeque<Slot<Ctx>>,
    /// One slot per entry in `queue`, in the same order: the upgrade handle
    /// to fulfill if that exchange's response switches protocols.
    pending_upgrades: VecDeque<Option<upgrade::Pending>>,
    receiving: Option<Receiving>,
    closing: bool,
    pending_synthetic_error: Option<StatusCode>,
    watch: Option<drain::Watch>,
    compression: CompressionConfig,
}

impl<T, C, Ctx> fmt::Debug for Connection<T, C, Ctx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("pipelined", &self.queue.len())
            .field("closing", &self.closing)
            .finish()
    }
}

impl<T, C, Ctx> Connection<T, C, Ctx>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    C: Controller<Ctx> + 'static,
    Ctx: Send + 'static,
{
    /// Drives the connection to completion: parses, dispatches, and
    /// responds to every pipelined request until the peer or an error
    /// closes the connection.
    pub async fn run(mut self) -> Result<(), Error> {
        loop {
            self.io.enter_read_turn();
            loop {
                match self.try_dispatch_one().await? {
                    DispatchOutcome::Dispatched => continue,
                    DispatchOutcome::NeedMoreData => break,
                }
            }
            // Writing responses while still inside the read turn lets their
            // flushes coalesce with this turn's (spec §4.4): each
            // `write_response` call below finds `request_flush()` deferred
            // until `exit_read_turn` flushes everything at once.
            if let Some(pending) = self.flush_completed_front().await? {
                let (io, leftover) = self.io.into_parts();
                pending.fulfill(Upgraded::new(io, leftover));
                return Ok(());
            }
            if self.io.exit_read_turn() {
                self.io.flush().await?;
            }

            if self.closing && self.queue.is_empty() {
                break;
            }

            tokio::select! {
                biased;

                _ = PumpQueue { queue: &mut self.queue }, if !self.queue.is_empty() => {}

                _ = watch_drained(&mut self.watch), if self.watch.is_some() && !self.closing => {
                    self.closing = true;
                }

                n = self.io.fill_read_buf(), if !self.closing => {
                    if n? == 0 {
                        self.handle_eof().await?;
                    }
                }
            }
        }

        if let Some(status) = self.pending_synthetic_error.take() {
            self.write_raw_error_response(status).await?;
        }
        let _ = self.io.shutdown().await;
        Ok(())
    }

    /// Parses and fully decodes the next already-buffered request, if any,
    /// dispatching it to the controller. Never performs a transport read.
    async fn try_dispatch_one(&mut self) -> Result<DispatchOutcome, Error> {
        if self.receiving.is_none() {
            if self.closing {
                return Ok(DispatchOutcome::NeedMoreData);
            }
            let parsed = match try_parse_request(self.io.read_buf()) {
                Ok(Some(parsed)) => parsed,
                Ok(None) => return Ok(DispatchOutcome::NeedMoreData),
                Err(err) => {
                    let status = match err.kind() {
                        Kind::Decode(d) => status_for_decode_error(d),
                        _ => StatusCode::BAD_REQUEST,
                    };
                    self.note_decode_error(status);
                    return Ok(DispatchOutcome::NeedMoreData);
                }
            };
            self.io.read_buf_mut().advance(parsed.consumed);
            if !parsed.keep_alive {
                self.closing = true;
            }

            #[cfg(feature = "compression")]
            let content_encoding = parsed
                .request
                .headers()
                .get(http::header::CONTENT_ENCODING)
                .and_then(|v| v.to_str().ok())
                .and_then(crate::negotiator::compression::Coding::of_header);

            let content_length = parsed.content_length;
            let decoder = Decoder::new(content_length);
            let (sender, incoming) = Incoming::channel(content_length);
            let mut request = with_body(parsed.request, incoming);
            let (pending, on_upgrade) = upgrade::pending();
            request.extensions_mut().insert(on_upgrade);
            let ctx = self.controller.new_context();
            let exchange = Exchange::new(request, ctx);
            let fut = Arc::clone(&self.controller).call(exchange);
            self.queue.push_back(Slot::new(fut));
            self.pending_upgrades.push_back(Some(pending));
            #[allow(unused_mut)]
            let mut receiving = Receiving::new(sender, decoder);
            #[cfg(feature = "compression")]
            {
                receiving.content_encoding = content_encoding;
            }
            self.receiving = Some(receiving);
        }

        let done = {
            let receiving = self.receiving.as_mut().expect("checked above");
            match receiving.advance(self.io.read_buf_mut()) {
                Ok(done) => done,
                Err(err) => {
                    // Unlike a header/start-line decode error, this exchange
                    // already has a dispatched handler waiting on its body;
                    // aborting the sink lets that handler observe the cause
                    // and produce its own response through the usual
                    // `finish_exchange` path instead of a second, conflicting
                    // synthetic one. The connection still can't trust
                    // anything past this point in the stream, so it closes
                    // once the queue drains.
                    let receiving = self.receiving.take().expect("checked above");
                    receiving.sender.abort(err).await;
                    self.closing = true;
                    return Ok(DispatchOutcome::NeedMoreData);
                }
            }
        };
        if !done {
            return Ok(DispatchOutcome::NeedMoreData);
        }

        let mut receiving = self.receiving.take().expect("checked above");
        if !receiving.acc.is_empty() {
            let mut body = receiving.acc.split().freeze();
            #[cfg(feature = "compression")]
            if self.compression.decompression_enabled {
                if let Some(coding) = receiving.content_encoding {
                    match crate::negotiator::compression::decompress(coding, &body) {
                        Ok(decoded) => body = bytes::Bytes::from(decoded),
                        Err(err) => {
                            receiving.sender.abort(err).await;
                            self.closing = true;
                            return Ok(DispatchOutcome::Dispatched);
                        }
                    }
                }
            }
            let _ = receiving.sender.send_data(body).await;
        }
        if let Some(trailers) = receiving.trailers.take() {
            receiving.sender.send_trailers(trailers);
        }
        Ok(DispatchOutcome::Dispatched)
    }

    async fn handle_eof(&mut self) -> Result<(), Error> {
        self.closing = true;
        if let Some(receiving) = self.receiving.take() {
            receiving
                .sender
                .abort(Error::new_decode(Decode::IncompleteMessage))
                .await;
        } else if !self.io.read_buf().is_empty() {
            self.note_decode_error(status_for_decode_error(&Decode::IncompleteMessage));
        }
        Ok(())
    }

    /// Records the status a malformed request maps to, per the decoder
    /// error policy (spec §4.4, §9): with nothing else pending, the
    /// connection just closes; with exactly one exchange already
    /// dispatched, a synthetic response is appended once it's done; with
    /// several pipelined ahead of it, the earlier ones are simply finished
    /// and the connection closes without an extra response for the broken
    /// tail.
    ///
    /// Only used for decode errors that precede exchange creation (bad
    /// start line or header block): there is no handler to hand the error
    /// to, so the connection must synthesize the response itself. A decode
    /// error discovered while streaming an already-dispatched exchange's
    /// body goes through the sender-abort path in `try_dispatch_one`
    /// instead, since that exchange already has a handler to produce its
    /// own response.
    fn note_decode_error(&mut self, status: StatusCode) {
        self.closing = true;
        if self.queue.len() == 1 {
            self.pending_synthetic_error = Some(status);
        }
    }

    /// Pops and writes every already-`Done` slot at the front of the queue,
    /// preserving response order. Stops and returns the pending upgrade
    /// handle the moment an exchange switches protocols, since the
    /// transport no longer belongs to this connection's HTTP/1.x loop
    /// afterward — the caller detaches `self.io` and fulfills it.
    async fn flush_completed_front(&mut self) -> Result<Option<upgrade::Pending>, Error> {
        while matches!(self.queue.front(), Some(Slot::Done(_))) {
            let slot = self.queue.pop_front().expect("checked by matches!");
            let pending = self.pending_upgrades.pop_front().flatten();
            let Slot::Done(outcome) = slot else {
                unreachable!("checked by matches!")
            };
            if let Some(pending) = self.finish_exchange(outcome, pending).await? {
                return Ok(Some(pending));
            }
        }
        Ok(None)
    }

    async fn finish_exchange(
        &mut self,
        (exchange, result): (Exchange<Ctx>, Result<(), Error>),
        pending: Option<upgrade::Pending>,
    ) -> Result<Option<upgrade::Pending>, Error> {
        if exchange.state() == State::Reset {
            self.closing = true;
            return Ok(None);
        }

        let exchange = match result {
            Ok(()) => exchange,
            Err(err) => {
                let (exchange, result) = Arc::clone(&self.controller).on_error(exchange, err).await;
                if exchange.state() == State::Reset {
                    self.closing = true;
                    return Ok(None);
                }
                match result {
                    Ok(()) => exchange,
                    Err(_) => {
                        // `on_error` itself failed; fall back to the status
                        // its own failure carries, or a generic 500.
                        self.write_synthetic_error(exchange).await?;
                        return Ok(None);
                    }
                }
            }
        };

        if exchange.status() == StatusCode::SWITCHING_PROTOCOLS {
            if let Some(pending) = pending {
                self.write_upgrade_headers(exchange).await?;
                return Ok(Some(pending));
            }
        }
        self.write_response(exchange).await?;
        Ok(None)
    }

    /// Writes a `101` response's header block; upgrade responses never
    /// carry a body. The caller detaches the transport right after.
    async fn write_upgrade_headers(&mut self, mut exchange: Exchange<Ctx>) -> Result<(), Error> {
        exchange.mark_headers_sent();
        let version = exchange.version();
        let (status, headers, _sink, _trailers) = exchange.into_response_parts();

        let date = httpdate::fmt_http_date(SystemTime::now());
        let mut head_buf = BytesMut::new();
        encode_headers(version, status, &headers, &date, &mut head_buf);
        self.io.queue_write(&head_buf);
        self.io.flush().await?;
        self.closing = true;
        Ok(())
    }

    /// Writes a best-effort response for an exchange whose `Controller`
    /// (and its `on_error` fallback) both failed, using the exchange's
    /// headers/body exactly as the handler left them plus a default status
    /// if none was ever set by the application.
    /// Applies response compression (spec §4.6): negotiates a coding from
    /// `accept_encoding`, and only actually compresses a body that already
    /// has a known length no smaller than the configured threshold — a
    /// `Stream`/`Sse` body has no [`OutgoingBody::content_length_hint`] and
    /// is left alone rather than buffered whole to find out.
    #[cfg(feature = "compression")]
    async fn maybe_compress_response(
        &self,
        body: crate::body::outbound::OutgoingBody,
        hint: Option<u64>,
        headers: &mut HeaderMap,
        accept_encoding: Option<&str>,
    ) -> Result<(crate::body::outbound::OutgoingBody, Option<u64>), Error> {
        use crate::negotiator::compression::{compress, negotiate};

        if headers.contains_key(http::header::CONTENT_ENCODING) {
            return Ok((body, hint));
        }
        let Some(coding) = negotiate(accept_encoding, &self.compression) else {
            return Ok((body, hint));
        };
        let Some(len) = hint else {
            return Ok((body, hint));
        };
        if (len as usize) < self.compression.content_size_threshold {
            return Ok((body, hint));
        }
        let collected = http_body_util::BodyExt::collect(body).await?.to_bytes();
        let compressed = compress(coding, &collected, &self.compression)?;
        headers.insert(http::header::CONTENT_ENCODING, coding.header_value());
        let new_len = compressed.len() as u64;
        Ok((
            crate::body::outbound::OutgoingBody::once(bytes::Bytes::from(compressed)),
            Some(new_len),
        ))
    }

    async fn write_synthetic_error(&mut self, mut exchange: Exchange<Ctx>) -> Result<(), Error> {
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
        self.write_response(exchange).await
    }

    async fn write_response(&mut self, mut exchange: Exchange<Ctx>) -> Result<(), Error> {
        let version = exchange.version();
        let is_head = exchange.is_head();
        #[cfg(feature = "compression")]
        let accept_encoding = exchange
            .request()
            .headers()
            .get(http::header::ACCEPT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        exchange.mark_headers_sent();
        let (status, mut headers, sink, trailers) = exchange.into_response_parts();
        #[allow(unused_mut)]
        let mut body = sink.into_body();
        #[allow(unused_mut)]
        let mut hint = body.content_length_hint();
        #[cfg(feature = "compression")]
        {
            let (new_body, new_hint) = self
                .maybe_compress_response(body, hint, &mut headers, accept_encoding.as_deref())
                .await?;
            body = new_body;
            hint = new_hint;
        }

        let encoding = if hint.is_some() {
            BodyEncoding::Length
        } else if version == Version::HTTP_11 {
            BodyEncoding::Chunked
        } else {
            BodyEncoding::CloseDelimited
        };
        if matches!(encoding, BodyEncoding::CloseDelimited) {
            self.closing = true;
        }
        if self.closing {
            headers.insert(http::header::CONNECTION, HeaderValue::from_static("close"));
        }
        match encoding {
            BodyEncoding::Length => {
                if let Some(n) = hint {
                    if let Ok(v) = HeaderValue::from_str(&n.to_string()) {
                        headers.insert(http::header::CONTENT_LENGTH, v);
                    }
                }
            }
            BodyEncoding::Chunked => {
                headers.insert(
                    http::header::TRANSFER_ENCODING,
                    HeaderValue::from_static("chunked"),
                );
            }
            BodyEncoding::CloseDelimited => {}
        }

        let date = httpdate::fmt_http_date(SystemTime::now());
        let mut head_buf = BytesMut::new();
        encode_headers(version, status, &headers, &date, &mut head_buf);
        self.io.queue_write(&head_buf);

        if !is_head {
            let mut body = std::pin::pin!(body);
            loop {
                let next = std::future::poll_fn(|cx| body.as_mut().poll_frame(cx)).await;
                match next {
                    Some(Ok(frame)) => {
                        if let Ok(data) = frame.into_data() {
                            let mut chunk_buf = BytesMut::new();
                            encode_chunk(encoding, data, &mut chunk_buf);
                            self.io.queue_write(&chunk_buf);
                        }
                    }
                    Some(Err(e)) => return Err(e),
                    None => break,
                }
            }
        }

        let mut end_buf = BytesMut::new();
        encode_end(encoding, trailers.as_ref(), &mut end_buf);
        self.io.queue_write(&end_buf);

        if self.io.request_flush() {
            self.io.flush().await
        } else {
            Ok(())
        }
    }

    async fn write_raw_error_response(&mut self, status: StatusCode) -> Result<(), Error> {
        let mut headers = HeaderMap::new();
        let body = status
            .canonical_reason()
            .unwrap_or("Error")
            .as_bytes()
            .to_vec();
        if let Ok(v) = HeaderValue::from_str(&body.len().to_string()) {
            headers.insert(http::header::CONTENT_LENGTH, v);
        }
        headers.insert(http::header::CONNECTION, HeaderValue::from_static("close"));

        let date = httpdate::fmt_http_date(SystemTime::now());
        let mut buf = BytesMut::new();
        encode_headers(Version::HTTP_11, status, &headers, &date, &mut buf);
        buf.extend_from_slice(&body);
        self.io.queue_write(&buf);
        self.io.flush().await
    }
}
