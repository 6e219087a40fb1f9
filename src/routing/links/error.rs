//! Error link (spec §4.7 rule 10): used only by the error-routing pathway
//! (spec §7), not by ordinary request matching. A route without an
//! `error_class` never participates here.

use crate::error::Error;
use crate::routing::route::Route;

pub(crate) fn score<R>(route: &Route<R>, err: &Error) -> Option<f64> {
    route.criteria.error_class.as_ref()?.matches(err)
}
