//! Query-parameter link (spec §4.7 rule 8): same semantics as the headers
//! link, applied to decoded query parameters.

use crate::routing::route::Route;

pub(crate) fn score<R>(route: &Route<R>, query: &[(String, String)]) -> Option<f64> {
    if route.criteria.query.is_empty() {
        return Some(0.0);
    }
    let all_match = route.criteria.query.iter().all(|(name, matcher)| {
        query
            .iter()
            .filter(|(k, _)| k == name)
            .any(|(_, v)| matcher.matches(v))
    });
    if all_match {
        Some(route.criteria.query.len() as f64)
    } else {
        None
    }
}
