//! Bridges the routing engine to the connection core's [`Controller`]
//! capability: resolves each incoming exchange against a [`Router`] of
//! [`Handler`]s and maps an unmatched request to the status the routing
//! chain stopped at (spec §4.7, §7).

use std::sync::Arc;

use http::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HOST};

use crate::controller::{Controller, ControllerFuture};
use crate::error::Error;
use crate::exchange::Exchange;
use crate::header::{Accept, AcceptLanguage, MediaRange};
use crate::routing::{MatchInput, Matched, Resolution, Router};
use crate::server::handler::Handler;
use crate::status::StatusKind;

type HandlerEntry<Ctx> = Arc<dyn Handler<Ctx>>;

/// A [`Controller`] that dispatches every exchange through a [`Router`] of
/// [`Handler`]s, synthesizing a status-only response for anything the
/// routing chain doesn't resolve to a single handler (spec §7's default
/// mapping, used when no application-level error handler overrides it).
pub struct RouterController<Ctx = ()> {
    router: Arc<Router<HandlerEntry<Ctx>>>,
    new_context: Box<dyn Fn() -> Ctx + Send + Sync>,
}

impl<Ctx> std::fmt::Debug for RouterController<Ctx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterController").field("router", &self.router).finish()
    }
}

impl<Ctx> RouterController<Ctx> {
    pub fn new(
        router: Arc<Router<HandlerEntry<Ctx>>>,
        new_context: impl Fn() -> Ctx + Send + Sync + 'static,
    ) -> Self {
        RouterController {
            router,
            new_context: Box::new(new_context),
        }
    }
}

/// Resolves `exchange` against `router`, owning every string the match
/// borrows for the duration of the call so [`Resolution`] — which clones
/// out the handler `Arc` and path-param map it returns — can outlive them.
fn resolve<Ctx>(router: &Router<HandlerEntry<Ctx>>, exchange: &Exchange<Ctx>) -> Resolution<HandlerEntry<Ctx>> {
    let request = exchange.request();
    let path = request.uri().path();
    let query = parse_query(request.uri().query().unwrap_or(""));
    let authority = request
        .uri()
        .authority()
        .map(|a| a.as_str().to_owned())
        .or_else(|| {
            request
                .headers()
                .get(HOST)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        });
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| MediaRange::parse(v).ok());
    let accept = request
        .headers()
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Accept::parse(v).ok())
        .unwrap_or_default();
    let accept_language = request
        .headers()
        .get(ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| AcceptLanguage::parse(v).ok())
        .unwrap_or_default();
    // No subprotocol negotiation happens at the routing layer today (spec
    // §4.7 rule 9 still narrows on it once a caller threads
    // `Sec-WebSocket-Protocol` through here); kept empty until a handler
    // needs it.
    let subprotocols: Vec<String> = Vec::new();

    let input = MatchInput {
        path,
        method: request.method(),
        authority: authority.as_deref(),
        content_type,
        accept,
        accept_language,
        headers: request.headers(),
        query: &query,
        subprotocols: &subprotocols,
    };
    router.resolve_detailed(&input)
}

fn parse_query(raw: &str) -> Vec<(String, String)> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split('&')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (k, v) = part.split_once('=').unwrap_or((part, ""));
            (decode_query_component(k), decode_query_component(v))
        })
        .collect()
}

fn decode_query_component(s: &str) -> String {
    percent_encoding::percent_decode_str(&s.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

fn apply_status<Ctx>(exchange: &mut Exchange<Ctx>, kind: StatusKind) -> Result<(), Error> {
    exchange.set_status(kind.status_code())?;
    if let StatusKind::MethodNotAllowed { allowed } = &kind {
        let joined = allowed.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");
        if let (Ok(headers), Ok(v)) = (exchange.response_headers_mut(), http::HeaderValue::from_str(&joined)) {
            headers.insert(http::header::ALLOW, v);
        }
    }
    exchange.body()?.string(kind.reason_phrase())
}

impl<Ctx> Controller<Ctx> for RouterController<Ctx>
where
    Ctx: Send + 'static,
{
    fn new_context(&self) -> Ctx {
        (self.new_context)()
    }

    fn call(self: Arc<Self>, mut exchange: Exchange<Ctx>) -> ControllerFuture<Ctx> {
        Box::pin(async move {
            let resolution = resolve(&self.router, &exchange);

            let (handler, params) = match resolution {
                Resolution::Matched(mut matches) => {
                    let Matched { resource, path_params } = matches.remove(0);
                    (resource, path_params)
                }
                Resolution::NotFound => {
                    let result = apply_status(&mut exchange, StatusKind::NotFound);
                    return (exchange, result);
                }
                Resolution::MethodNotAllowed(allowed) => {
                    let result = apply_status(&mut exchange, StatusKind::MethodNotAllowed { allowed });
                    return (exchange, result);
                }
                Resolution::UnsupportedMediaType => {
                    let result = apply_status(&mut exchange, StatusKind::UnsupportedMediaType);
                    return (exchange, result);
                }
                Resolution::NotAcceptable(acceptable) => {
                    let result = apply_status(&mut exchange, StatusKind::NotAcceptable { acceptable });
                    return (exchange, result);
                }
            };

            handler.handle(exchange, params).await
        })
    }

    fn on_error(self: Arc<Self>, mut exchange: Exchange<Ctx>, error: Error) -> ControllerFuture<Ctx> {
        Box::pin(async move {
            tracing::debug!(error = %error, "handler failed, synthesizing a 500");
            let result = apply_status(&mut exchange, StatusKind::InternalServerError);
            (exchange, result)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::Criteria;
    use bytes::Bytes;
    use http::{Method, StatusCode};

    fn request(path: &str) -> Exchange<()> {
        let req = http::Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(crate::body::Incoming::from(Bytes::new()))
            .unwrap();
        Exchange::new(req, ())
    }

    #[tokio::test]
    async fn dispatches_to_the_matched_handler() {
        let router: Arc<Router<HandlerEntry<()>>> = Arc::new(Router::new(false));
        router.insert(
            crate::server::handler::handler_fn(|mut ex: Exchange<()>, _| async move {
                let result = (|| {
                    ex.set_status(StatusCode::OK)?;
                    ex.body()?.string("hi")
                })();
                (ex, result)
            }),
            Criteria::new().path("/greet").unwrap().method(Method::GET),
        );
        let controller = Arc::new(RouterController::new(router, || ()));

        let (exchange, result) = controller.call(request("/greet")).await;
        result.unwrap();
        assert_eq!(exchange.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unmatched_path_resolves_to_not_found() {
        let router: Arc<Router<HandlerEntry<()>>> = Arc::new(Router::new(false));
        let controller = Arc::new(RouterController::new(router, || ()));

        let (exchange, result) = controller.call(request("/missing")).await;
        result.unwrap();
        assert_eq!(exchange.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn wrong_method_resolves_to_method_not_allowed_with_allow_header() {
        let router: Arc<Router<HandlerEntry<()>>> = Arc::new(Router::new(false));
        router.insert(
            crate::server::handler::handler_fn(|ex: Exchange<()>, _| async move { (ex, Ok(())) }),
            Criteria::new().path("/greet").unwrap().method(Method::POST),
        );
        let controller = Arc::new(RouterController::new(router, || ()));

        let (exchange, result) = controller.call(request("/greet")).await;
        result.unwrap();
        assert_eq!(exchange.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(exchange.response_headers().get(http::header::ALLOW).is_some());
    }
}
