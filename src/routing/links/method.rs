//! Method link (spec §4.7 rule 2): exact match, no wildcard fallback beyond
//! a route that declared no method at all.

use http::Method;

use crate::routing::route::Route;

pub(crate) fn score<R>(route: &Route<R>, requested: &Method) -> Option<f64> {
    match &route.criteria.method {
        None => Some(0.0),
        Some(m) if m == requested => Some(1.0),
        Some(_) => None,
    }
}
