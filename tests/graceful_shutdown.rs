//! Black-box coverage for `server::Server`'s accept loop and its graceful
//! shutdown: once the shutdown future resolves, no further connections are
//! accepted, and an in-flight request still gets its response before the
//! listener task returns.

use std::sync::Arc;
use std::time::Duration;

use reactor_core::config::Config;
use reactor_core::routing::{Criteria, Router};
use reactor_core::server::{handler_fn, Handler, RouterController, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

fn slow_router() -> Arc<Router<Arc<dyn Handler<()>>>> {
    let router: Arc<Router<Arc<dyn Handler<()>>>> = Arc::new(Router::new(false));
    router.insert(
        handler_fn(|mut exchange, _params| async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let result = exchange.body().and_then(|b| b.string("done"));
            (exchange, result)
        }),
        Criteria::new().path("/work").unwrap().method(http::Method::GET),
    );
    router
}

#[tokio::test]
async fn drains_an_in_flight_request_before_stopping() {
    let mut config = Config::default();
    config.graceful_shutdown = true;
    config.graceful_shutdown_timeout = Duration::from_secs(5);

    let controller = Arc::new(RouterController::new(slow_router(), || ()));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let server = Server::new(config, controller);
    let serving = tokio::spawn(server.serve_on(listener, async move {
        let _ = shutdown_rx.await;
    }));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"GET /work HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n").await.unwrap();

    // Signal shutdown while the slow handler is still running; the
    // in-flight request must still see its response.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let _ = shutdown_tx.send(());

    let mut buf = Vec::new();
    let mut chunk = [0u8; 256];
    tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(_) => break,
            }
        }
    })
    .await
    .expect("drained connection never completed");

    let response = String::from_utf8(buf).unwrap();
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.ends_with("done"), "{response}");

    tokio::time::timeout(Duration::from_secs(3), serving)
        .await
        .expect("server task should finish once drained")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn stops_accepting_new_connections_once_shutdown_fires() {
    let controller = Arc::new(RouterController::new(slow_router(), || ()));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let server = Server::new(Config::default(), controller);
    let serving = tokio::spawn(server.serve_on(listener, async move {
        let _ = shutdown_rx.await;
    }));

    let _ = shutdown_tx.send(());
    tokio::time::timeout(Duration::from_secs(3), serving)
        .await
        .expect("server task should finish promptly with no in-flight work")
        .unwrap()
        .unwrap();

    assert!(TcpStream::connect(addr).await.is_err(), "listener should have been dropped");
}
