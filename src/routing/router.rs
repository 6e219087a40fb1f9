//! The router: holds a read-mostly snapshot of routes and resolves a
//! request by walking the chain of links in precedence order (spec §4.7),
//! narrowing the candidate set at each step.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use http::{HeaderMap, Method};

use crate::error::Error;
use crate::header::{Accept, AcceptLanguage, MediaRange};
use crate::routing::links;
use crate::routing::route::{Criteria, Route};

/// Everything the chain needs to know about the request being matched.
pub struct MatchInput<'a> {
    pub path: &'a str,
    pub method: &'a Method,
    pub authority: Option<&'a str>,
    pub content_type: Option<MediaRange>,
    pub accept: Accept,
    pub accept_language: AcceptLanguage,
    pub headers: &'a HeaderMap,
    pub query: &'a [(String, String)],
    pub subprotocols: &'a [String],
}

impl fmt::Debug for MatchInput<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchInput")
            .field("path", &self.path)
            .field("method", &self.method)
            .finish()
    }
}

/// The outcome of resolving a request against a [`Router`].
#[derive(Debug, Clone)]
pub enum Resolution<R> {
    /// One or more routes remained tied after every dimension; ordered
    /// best-to-worst (here: registration order among the tied winners).
    Matched(Vec<Matched<R>>),
    NotFound,
    MethodNotAllowed(Vec<Method>),
    UnsupportedMediaType,
    NotAcceptable(Vec<MediaRange>),
}

/// A matched route's resource together with the path parameters bound for
/// it.
#[derive(Debug, Clone)]
pub struct Matched<R> {
    pub resource: R,
    pub path_params: std::collections::HashMap<String, String>,
}

struct Candidate<'a, R> {
    route: &'a Route<R>,
    path_params: std::collections::HashMap<String, String>,
}

impl<'a, R> Clone for Candidate<'a, R> {
    fn clone(&self) -> Self {
        Candidate {
            route: self.route,
            path_params: self.path_params.clone(),
        }
    }
}

/// Narrows `candidates` to the subset scoring the maximum value under
/// `score`, or `None` if nothing scored at all. This single primitive
/// implements every chain step's "best match wins, ties carry forward"
/// rule from spec §4.7.
fn narrow<'a, R>(
    candidates: &[Candidate<'a, R>],
    mut score: impl FnMut(&Candidate<'a, R>) -> Option<f64>,
) -> Option<Vec<Candidate<'a, R>>> {
    let mut scored: Vec<(Candidate<'a, R>, f64)> = Vec::new();
    for c in candidates {
        if let Some(s) = score(c) {
            scored.push((c.clone(), s));
        }
    }
    if scored.is_empty() {
        return None;
    }
    let max = scored.iter().fold(f64::MIN, |m, (_, s)| m.max(*s));
    Some(
        scored
            .into_iter()
            .filter(|(_, s)| *s == max)
            .map(|(c, _)| c)
            .collect(),
    )
}

/// A routing chain over resources of type `R`: a read-mostly snapshot of
/// routes published behind an `RwLock<Arc<_>>`, so lookups clone a cheap
/// `Arc` under a brief read lock and resolve against an immutable view
/// (spec §5: "reads are lock-free; writes... publish a fresh chain
/// snapshot").
pub struct Router<R> {
    routes: RwLock<Arc<Vec<Route<R>>>>,
    next_id: AtomicU64,
    match_trailing_slash: bool,
}

impl<R> fmt::Debug for Router<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.routes.read().expect("router lock poisoned").len();
        f.debug_struct("Router").field("routes", &count).finish()
    }
}

impl<R> Router<R> {
    pub fn new(match_trailing_slash: bool) -> Self {
        Router {
            routes: RwLock::new(Arc::new(Vec::new())),
            next_id: AtomicU64::new(1),
            match_trailing_slash,
        }
    }

    pub fn snapshot(&self) -> Arc<Vec<Route<R>>> {
        Arc::clone(&self.routes.read().expect("router lock poisoned"))
    }

    /// Installs a route, returning its id.
    pub fn insert(&self, resource: R, criteria: Criteria) -> u64
    where
        R: Clone,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut guard = self.routes.write().expect("router lock poisoned");
        let mut routes = (**guard).clone();
        routes.push(Route {
            id,
            resource,
            criteria,
            enabled: true,
        });
        *guard = Arc::new(routes);
        id
    }

    /// Sets `enabled` on every route for which `predicate` returns true.
    pub fn set_enabled(&self, predicate: impl Fn(&Route<R>) -> bool, enabled: bool)
    where
        R: Clone,
    {
        let mut guard = self.routes.write().expect("router lock poisoned");
        let mut routes = (**guard).clone();
        for route in routes.iter_mut().filter(|r| predicate(r)) {
            route.enabled = enabled;
        }
        *guard = Arc::new(routes);
    }

    /// Removes every route for which `predicate` returns true, returning
    /// how many were removed.
    pub fn remove(&self, predicate: impl Fn(&Route<R>) -> bool) -> usize
    where
        R: Clone,
    {
        let mut guard = self.routes.write().expect("router lock poisoned");
        let before = guard.len();
        let routes: Vec<_> = (**guard).iter().filter(|r| !predicate(r)).cloned().collect();
        let removed = before - routes.len();
        *guard = Arc::new(routes);
        removed
    }

    /// Walks the full matching chain (spec §4.7), returning the richest
    /// [`Resolution`] describing why matching stopped where it did.
    pub fn resolve_detailed(&self, input: &MatchInput<'_>) -> Resolution<R>
    where
        R: Clone,
    {
        let snapshot = self.snapshot();
        let normalized = links::path::normalize(input.path, self.match_trailing_slash);
        let request_segments = links::path::split(&normalized);

        let mut candidates: Vec<Candidate<'_, R>> = Vec::new();
        for route in snapshot.iter().filter(|r| r.enabled) {
            let Some(pattern) = route.criteria.path.as_ref() else {
                continue;
            };
            if let Some((_, path_params)) = links::path::score_and_bind(pattern, &request_segments) {
                candidates.push(Candidate { route, path_params });
            }
        }
        if candidates.is_empty() {
            return Resolution::NotFound;
        }
        // Re-score for the best path match so only the most specific
        // pattern(s) proceed to the method link.
        let candidates = narrow(&candidates, |c| {
            links::path::score_and_bind(c.route.criteria.path.as_ref().unwrap(), &request_segments)
                .map(|(score, _)| score)
        })
        .unwrap_or(candidates);

        let candidates = match narrow(&candidates, |c| links::method::score(c.route, input.method)) {
            Some(c) => c,
            None => {
                let mut allowed: Vec<Method> = candidates
                    .iter()
                    .filter_map(|c| c.route.criteria.method.clone())
                    .collect();
                allowed.dedup();
                return Resolution::MethodNotAllowed(allowed);
            }
        };

        let candidates = match narrow(&candidates, |c| links::authority::score(c.route, input.authority)) {
            Some(c) => c,
            None => return Resolution::NotFound,
        };

        let candidates = match narrow(&candidates, |c| {
            links::content_type::score(c.route, input.content_type.as_ref())
        }) {
            Some(c) => c,
            None => return Resolution::UnsupportedMediaType,
        };

        let candidates = match narrow(&candidates, |c| links::accept::score(c.route, &input.accept)) {
            Some(c) => c,
            None => {
                let acceptable = candidates
                    .iter()
                    .filter_map(|c| c.route.criteria.produces.clone())
                    .collect();
                return Resolution::NotAcceptable(acceptable);
            }
        };

        let candidates = narrow(&candidates, |c| {
            links::accept_language::score(c.route, &input.accept_language)
        })
        .unwrap_or(candidates);

        let candidates =
            narrow(&candidates, |c| links::headers::score(c.route, input.headers)).unwrap_or(candidates);

        let candidates =
            narrow(&candidates, |c| links::query::score(c.route, input.query)).unwrap_or(candidates);

        let candidates = narrow(&candidates, |c| {
            links::subprotocol::score(c.route, input.subprotocols)
        })
        .unwrap_or(candidates);

        if candidates.is_empty() {
            return Resolution::NotFound;
        }
        Resolution::Matched(
            candidates
                .into_iter()
                .map(|c| Matched {
                    resource: c.route.resource.clone(),
                    path_params: c.path_params,
                })
                .collect(),
        )
    }

    /// `resolve(i) == resolveAll(i).head` (spec §8's routing-determinism
    /// property) when the result is non-empty.
    pub fn resolve(&self, input: &MatchInput<'_>) -> Option<Matched<R>>
    where
        R: Clone,
    {
        match self.resolve_detailed(input) {
            Resolution::Matched(mut matches) if !matches.is_empty() => Some(matches.remove(0)),
            _ => None,
        }
    }

    /// Returns every route still in contention after the last dimension
    /// that admitted more than one candidate, best to worst — used by the
    /// `NotAcceptable` pathway to report acceptable alternatives.
    pub fn resolve_all(&self, input: &MatchInput<'_>) -> Vec<Matched<R>>
    where
        R: Clone,
    {
        match self.resolve_detailed(input) {
            Resolution::Matched(matches) => matches,
            _ => Vec::new(),
        }
    }

    /// The error-routing pathway (spec §7): selects by `error_class` alone,
    /// ignoring every other criterion.
    pub fn resolve_error(&self, err: &Error) -> Option<R>
    where
        R: Clone,
    {
        let snapshot = self.snapshot();
        let candidates: Vec<&Route<R>> = snapshot.iter().filter(|r| r.enabled).collect();
        let mut best: Option<(&Route<R>, f64)> = None;
        for route in candidates {
            if let Some(score) = links::error::score(route, err) {
                let replace = match best {
                    Some((_, b)) => score > b,
                    None => true,
                };
                if replace {
                    best = Some((route, score));
                }
            }
        }
        best.map(|(route, _)| route.resource.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn input<'a>(
        path: &'a str,
        method: &'a Method,
        headers: &'a HeaderMap,
        content_type: Option<&str>,
        accept: &str,
    ) -> MatchInput<'a> {
        MatchInput {
            path,
            method,
            authority: None,
            content_type: content_type.map(|s| MediaRange::parse(s).unwrap()),
            accept: Accept::parse(accept).unwrap(),
            accept_language: AcceptLanguage::parse("").unwrap(),
            headers,
            query: &[],
            subprotocols: &[],
        }
    }

    #[test]
    fn path_then_method_then_content_type_precedence() {
        let router: Router<&'static str> = Router::new(false);
        router.insert(
            "json-handler",
            Criteria::new()
                .path("/a")
                .unwrap()
                .method(Method::POST)
                .consumes("application/json")
                .unwrap(),
        );
        router.insert(
            "text-handler",
            Criteria::new()
                .path("/a")
                .unwrap()
                .method(Method::POST)
                .consumes("text/*")
                .unwrap(),
        );

        let empty_headers = HeaderMap::new();
        let json_post = input("/a", &Method::POST, &empty_headers, Some("application/json"), "*/*");
        assert!(matches!(
            router.resolve(&json_post).map(|m| m.resource),
            Some("json-handler")
        ));

        let text_post = input("/a", &Method::POST, &empty_headers, Some("text/plain"), "*/*");
        assert!(matches!(
            router.resolve(&text_post).map(|m| m.resource),
            Some("text-handler")
        ));

        let get = input("/a", &Method::GET, &empty_headers, None, "*/*");
        match router.resolve_detailed(&get) {
            Resolution::MethodNotAllowed(allowed) => assert_eq!(allowed, vec![Method::POST]),
            other => panic!("expected MethodNotAllowed, got {other:?}"),
        }
    }

    #[test]
    fn resolve_matches_resolve_all_head() {
        let router: Router<&'static str> = Router::new(false);
        router.insert("only", Criteria::new().path("/x").unwrap().method(Method::GET));
        let headers = HeaderMap::new();
        let req = input("/x", &Method::GET, &headers, None, "*/*");
        let all = router.resolve_all(&req);
        let one = router.resolve(&req);
        assert_eq!(all.first().map(|m| m.resource), one.map(|m| m.resource));
    }

    #[test]
    fn accept_quality_beats_equal_specificity() {
        let router: Router<&'static str> = Router::new(false);
        router.insert(
            "produces-json",
            Criteria::new().path("/b").unwrap().method(Method::GET).produces("application/json").unwrap(),
        );
        router.insert(
            "produces-text",
            Criteria::new().path("/b").unwrap().method(Method::GET).produces("text/plain").unwrap(),
        );
        let headers = HeaderMap::new();
        let req = input(
            "/b",
            &Method::GET,
            &headers,
            None,
            "text/plain;q=0.9, application/json;q=0.8",
        );
        assert_eq!(router.resolve(&req).map(|m| m.resource), Some("produces-text"));
    }

    #[test]
    fn path_params_are_bound() {
        let router: Router<&'static str> = Router::new(false);
        router.insert(
            "item",
            Criteria::new().path("/items/{id}").unwrap().method(Method::GET),
        );
        let headers = HeaderMap::new();
        let req = input("/items/42", &Method::GET, &headers, None, "*/*");
        let matched = router.resolve(&req).unwrap();
        assert_eq!(matched.path_params.get("id"), Some(&"42".to_owned()));
    }

    #[test]
    fn disabled_routes_are_skipped() {
        let router: Router<&'static str> = Router::new(false);
        let id = router.insert("hidden", Criteria::new().path("/h").unwrap().method(Method::GET));
        router.set_enabled(|r| r.id() == id, false);
        let headers = HeaderMap::new();
        let req = input("/h", &Method::GET, &headers, None, "*/*");
        assert!(router.resolve(&req).is_none());
    }

    #[test]
    fn error_routing_ignores_request_dimensions() {
        let router: Router<&'static str> = Router::new(false);
        router.insert(
            "not-found-handler",
            Criteria::new().error_class(crate::routing::route::ErrorClass::new(1, |e| e.is_route_not_found())),
        );
        let err = Error::new_route_not_found();
        assert_eq!(router.resolve_error(&err), Some("not-found-handler"));
    }
}
