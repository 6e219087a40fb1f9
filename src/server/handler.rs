//! The application-facing capability a route resolves to (spec §4.7's `R`
//! type parameter on [`crate::routing::Route`]). Distinct from
//! [`crate::resource::Resource`], which is only the outbound body's byte
//! source: a `Handler` is the thing a route dispatches a whole exchange to.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Error;
use crate::exchange::Exchange;

/// What a [`Handler`] hands back: the exchange, always, plus whether it
/// succeeded — mirroring [`crate::controller::Controller::call`]'s own
/// shape so [`crate::server::controller::RouterController`] can forward a
/// handler's outcome straight through without reconstructing it.
pub type HandlerFuture<Ctx> = Pin<Box<dyn Future<Output = (Exchange<Ctx>, Result<(), Error>)> + Send>>;

/// Handles one matched exchange. `path_params` carries the bindings the
/// router extracted from the winning route's path pattern (spec §4.7's
/// `{name}` segments).
///
/// Implemented directly by application code, or via [`handler_fn`] for a
/// plain async closure.
pub trait Handler<Ctx = ()>: Send + Sync {
    fn handle(self: Arc<Self>, exchange: Exchange<Ctx>, path_params: HashMap<String, String>) -> HandlerFuture<Ctx>;
}

struct FnHandler<F>(F);

impl<F, Ctx, Fut> Handler<Ctx> for FnHandler<F>
where
    F: Fn(Exchange<Ctx>, HashMap<String, String>) -> Fut + Send + Sync,
    Fut: Future<Output = (Exchange<Ctx>, Result<(), Error>)> + Send + 'static,
    Ctx: Send + 'static,
{
    fn handle(self: Arc<Self>, exchange: Exchange<Ctx>, path_params: HashMap<String, String>) -> HandlerFuture<Ctx> {
        Box::pin((self.0)(exchange, path_params))
    }
}

/// Wraps a plain async closure as a [`Handler`], the way a route table is
/// usually populated in practice rather than defining a type per route.
/// The closure owns the exchange and hands it back alongside its result,
/// the same shape [`crate::controller::Controller::call`] uses.
pub fn handler_fn<F, Ctx, Fut>(f: F) -> Arc<dyn Handler<Ctx>>
where
    F: Fn(Exchange<Ctx>, HashMap<String, String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (Exchange<Ctx>, Result<(), Error>)> + Send + 'static,
    Ctx: Send + 'static,
{
    Arc::new(FnHandler(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::StatusCode;

    fn exchange() -> Exchange<()> {
        let req = http::Request::builder()
            .method(http::Method::GET)
            .uri("/")
            .body(crate::body::Incoming::from(Bytes::new()))
            .unwrap();
        Exchange::new(req, ())
    }

    #[tokio::test]
    async fn handler_fn_wraps_an_async_closure() {
        let handler = handler_fn(|mut exchange: Exchange<()>, params: HashMap<String, String>| async move {
            let result = (|| {
                exchange.set_status(StatusCode::NO_CONTENT)?;
                exchange.body()?.string(params.get("name").cloned().unwrap_or_default())
            })();
            (exchange, result)
        });

        let params = HashMap::from([("name".to_owned(), "world".to_owned())]);
        let (exchange, result) = handler.handle(exchange(), params).await;
        result.unwrap();
        assert_eq!(exchange.status(), StatusCode::NO_CONTENT);
    }
}
