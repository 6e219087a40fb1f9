//! WebSocket-subprotocol link (spec §4.7 rule 9): exact match against the
//! client's offered `Sec-WebSocket-Protocol` tokens.

use crate::routing::route::Route;

pub(crate) fn score<R>(route: &Route<R>, offered: &[String]) -> Option<f64> {
    match &route.criteria.subprotocol {
        None => Some(0.0),
        Some(name) => {
            if offered.iter().any(|o| o == name) {
                Some(1.0)
            } else {
                None
            }
        }
    }
}
