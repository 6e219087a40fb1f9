//! Content-type link (spec §4.7 rule 4): the request's `Content-Type`
//! must satisfy the route's consumed media range; more specific ranges win.

use crate::header::MediaRange;
use crate::routing::route::Route;

pub(crate) fn score<R>(route: &Route<R>, content_type: Option<&MediaRange>) -> Option<f64> {
    match &route.criteria.consumes {
        None => Some(0.0),
        Some(range) => {
            let content_type = content_type?;
            if range.matches(content_type) {
                Some(1.0 + range.specificity() as f64)
            } else {
                None
            }
        }
    }
}
