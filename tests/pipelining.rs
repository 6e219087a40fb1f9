//! Black-box coverage for the HTTP/1.x connection core's pipelining
//! ordering guarantee: responses are written back in request-arrival
//! order even when a later request's handler finishes first.

use std::sync::Arc;
use std::time::Duration;

use reactor_core::controller::{Controller, ControllerFuture};
use reactor_core::exchange::Exchange;
use reactor_core::proto::h1::Builder;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[derive(Debug)]
struct DelayedEcho;

impl Controller<()> for DelayedEcho {
    fn new_context(&self) {}

    fn call(self: Arc<Self>, mut exchange: Exchange<()>) -> ControllerFuture<()> {
        Box::pin(async move {
            let path = exchange.uri().path().to_owned();
            if path == "/slow" {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            let result = exchange.body().and_then(|b| b.string(path));
            (exchange, result)
        })
    }

    fn on_error(self: Arc<Self>, exchange: Exchange<()>, _error: reactor_core::Error) -> ControllerFuture<()> {
        Box::pin(async move { (exchange, Ok(())) })
    }
}

#[tokio::test]
async fn pipelined_responses_preserve_request_order() {
    let (client, server) = tokio::io::duplex(8192);
    let controller = Arc::new(DelayedEcho);
    let driver = tokio::spawn(Builder::new().serve_connection(server, controller).run());

    let (mut read_half, mut write_half) = tokio::io::split(client);
    write_half
        .write_all(b"GET /slow HTTP/1.1\r\nHost: x\r\n\r\nGET /fast HTTP/1.1\r\nHost: x\r\n\r\n")
        .await
        .unwrap();

    let mut received = Vec::new();
    let mut chunk = [0u8; 1024];
    tokio::time::timeout(Duration::from_secs(5), async {
        while received.windows(b"HTTP/1.1".len()).filter(|w| *w == b"HTTP/1.1").count() < 2 {
            let n = read_half.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before both responses arrived");
            received.extend_from_slice(&chunk[..n]);
        }
    })
    .await
    .expect("timed out waiting for both pipelined responses");

    let text = String::from_utf8(received).unwrap();
    let slow_at = text.find("/slow").expect("slow response body present");
    let fast_at = text.find("/fast").expect("fast response body present");
    assert!(
        slow_at < fast_at,
        "response for the first request must precede the response for the second, got: {text:?}"
    );

    drop(write_half);
    let _ = tokio::time::timeout(Duration::from_secs(2), driver).await;
}

#[tokio::test]
async fn reset_exchange_does_not_block_the_rest_of_the_pipeline() {
    #[derive(Debug)]
    struct ResetFirst;

    impl Controller<()> for ResetFirst {
        fn new_context(&self) {}

        fn call(self: Arc<Self>, mut exchange: Exchange<()>) -> ControllerFuture<()> {
            Box::pin(async move {
                if exchange.uri().path() == "/cancel" {
                    exchange.reset(reactor_core::exchange::CANCEL);
                    return (exchange, Ok(()));
                }
                let result = exchange.body().and_then(|b| b.string("ok"));
                (exchange, result)
            })
        }

        fn on_error(self: Arc<Self>, exchange: Exchange<()>, _error: reactor_core::Error) -> ControllerFuture<()> {
            Box::pin(async move { (exchange, Ok(())) })
        }
    }

    let (client, server) = tokio::io::duplex(8192);
    let controller = Arc::new(ResetFirst);
    let driver = tokio::spawn(Builder::new().serve_connection(server, controller).run());

    let (mut read_half, mut write_half) = tokio::io::split(client);
    write_half
        .write_all(b"GET /cancel HTTP/1.1\r\nHost: x\r\n\r\n")
        .await
        .unwrap();

    let mut buf = Vec::new();
    let mut chunk = [0u8; 256];
    let outcome = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match read_half.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(_) => break,
            }
        }
    })
    .await;
    assert!(outcome.is_ok(), "connection should close promptly after a reset exchange");

    let _ = tokio::time::timeout(Duration::from_secs(2), driver).await;
}
