//! Headers link (spec §4.7 rule 7): every configured header matcher must
//! match some value of its header (matchers may repeat across headers).

use http::HeaderMap;

use crate::routing::route::Route;

pub(crate) fn score<R>(route: &Route<R>, headers: &HeaderMap) -> Option<f64> {
    if route.criteria.headers.is_empty() {
        return Some(0.0);
    }
    let all_match = route.criteria.headers.iter().all(|(name, matcher)| {
        headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| matcher.matches(v))
    });
    if all_match {
        Some(route.criteria.headers.len() as f64)
    } else {
        None
    }
}
