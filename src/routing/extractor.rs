//! Route extractor (spec §4.7): introspects a router's current snapshot
//! for tooling (admin endpoints, diagnostics) without going through the
//! matching chain.

use crate::routing::route::Route;
use crate::routing::router::Router;

/// Walks a router's route snapshot and returns every route a caller's
/// filter accepts.
#[derive(Debug, Default)]
pub struct RouteExtractor;

impl RouteExtractor {
    pub fn new() -> Self {
        RouteExtractor
    }

    pub fn extract<R: Clone>(&self, router: &Router<R>, filter: impl Fn(&Route<R>) -> bool) -> Vec<Route<R>> {
        router.snapshot().iter().filter(|r| filter(r)).cloned().collect()
    }

    /// Every route, enabled or not.
    pub fn extract_all<R: Clone>(&self, router: &Router<R>) -> Vec<Route<R>> {
        self.extract(router, |_| true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::route::Criteria;
    use http::Method;

    #[test]
    fn extracts_matching_routes() {
        let router: Router<&'static str> = Router::new(false);
        router.insert("a", Criteria::new().path("/a").unwrap().method(Method::GET));
        router.insert("b", Criteria::new().path("/b").unwrap().method(Method::POST));

        let extractor = RouteExtractor::new();
        let gets = extractor.extract(&router, |r| r.criteria.method == Some(Method::GET));
        assert_eq!(gets.len(), 1);
        assert_eq!(gets[0].resource, "a");

        assert_eq!(extractor.extract_all(&router).len(), 2);
    }
}
