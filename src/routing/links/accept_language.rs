//! Accept-language link (spec §4.7 rule 6): RFC 4647 basic filtering,
//! highest-quality matching range wins.

use crate::header::AcceptLanguage;
use crate::routing::route::Route;

pub(crate) fn score<R>(route: &Route<R>, accept_language: &AcceptLanguage) -> Option<f64> {
    match &route.criteria.accept_language {
        None => Some(0.0),
        Some(tag) => accept_language
            .entries
            .iter()
            .filter(|entry| entry.quality > 0.0 && range_matches(&entry.tag, tag))
            .map(|entry| entry.quality as f64)
            .fold(None, |best: Option<f64>, q| {
                Some(best.map_or(q, |b| b.max(q)))
            }),
    }
}

fn range_matches(range: &str, tag: &str) -> bool {
    range == "*"
        || range.eq_ignore_ascii_case(tag)
        || range
            .to_ascii_lowercase()
            .starts_with(&format!("{}-", tag.to_ascii_lowercase()))
}
