//! Accept link (spec §4.7 rule 5): `score = q * specificity`; best score
//! wins, ties fall through to registration order.

use crate::header::Accept;
use crate::routing::route::Route;

pub(crate) fn score<R>(route: &Route<R>, accept: &Accept) -> Option<f64> {
    match &route.criteria.produces {
        None => Some(0.0),
        Some(produced) => accept.best_score(produced).map(|s| s as f64),
    }
}
