//! Authority link (spec §4.7 rule 3): exact host match beats a regex match.

use crate::routing::route::{AuthorityMatcher, Route};

pub(crate) fn score<R>(route: &Route<R>, authority: Option<&str>) -> Option<f64> {
    match &route.criteria.authority {
        None => Some(0.0),
        Some(AuthorityMatcher::Exact(expected)) => {
            if authority == Some(expected.as_str()) {
                Some(2.0)
            } else {
                None
            }
        }
        Some(AuthorityMatcher::Pattern(re)) => {
            if authority.is_some_and(|a| re.is_match(a)) {
                Some(1.0)
            } else {
                None
            }
        }
    }
}
