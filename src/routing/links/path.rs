//! Path link (spec §4.7 rule 1): static segments beat named/typed
//! parameters, which beat wildcards; a route's total segment-weight is its
//! specificity score.

use std::collections::HashMap;

use crate::routing::route::{PathPattern, PathSegment};

/// Strips one trailing `/` (but never collapses `/` itself) when the
/// router was built with `match_trailing_slash`, so `/a` and `/a/` share a
/// matcher.
pub(crate) fn normalize(path: &str, match_trailing_slash: bool) -> String {
    if match_trailing_slash && path.len() > 1 && path.ends_with('/') {
        path[..path.len() - 1].to_owned()
    } else {
        path.to_owned()
    }
}

pub(crate) fn split(path: &str) -> Vec<&str> {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

/// Scores `pattern` against already-split request segments, returning the
/// specificity score plus captured named-parameter bindings. `None` when
/// the segment count differs or a typed parameter's regex rejects its
/// segment.
pub(crate) fn score_and_bind(
    pattern: &PathPattern,
    request_segments: &[&str],
) -> Option<(f64, HashMap<String, String>)> {
    if pattern.segments.len() != request_segments.len() {
        return None;
    }
    let mut score = 0u32;
    let mut bindings = HashMap::new();
    for (segment, actual) in pattern.segments.iter().zip(request_segments) {
        match segment {
            PathSegment::Literal(lit) => {
                if lit != actual {
                    return None;
                }
                score += 2;
            }
            PathSegment::Param { name, regex } => {
                if let Some(re) = regex {
                    if !re.is_match(actual) {
                        return None;
                    }
                }
                bindings.insert(name.clone(), (*actual).to_owned());
                score += 1;
            }
            PathSegment::Wildcard => {}
        }
    }
    Some((score as f64, bindings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_beats_pattern() {
        let static_pattern = PathPattern::parse("/a/b").unwrap();
        let param_pattern = PathPattern::parse("/a/{id}").unwrap();
        let segments = split("/a/b");
        let (static_score, _) = score_and_bind(&static_pattern, &segments).unwrap();
        let (param_score, _) = score_and_bind(&param_pattern, &segments).unwrap();
        assert!(static_score > param_score);
    }

    #[test]
    fn typed_param_rejects_non_matching_segment() {
        let pattern = PathPattern::parse("/items/{id:[0-9]+}").unwrap();
        assert!(score_and_bind(&pattern, &split("/items/abc")).is_none());
        let (_, bindings) = score_and_bind(&pattern, &split("/items/42")).unwrap();
        assert_eq!(bindings.get("id"), Some(&"42".to_owned()));
    }

    #[test]
    fn wildcard_matches_single_segment_at_lowest_specificity() {
        let wildcard = PathPattern::parse("/a/*").unwrap();
        let param = PathPattern::parse("/a/{id}").unwrap();
        let segments = split("/a/b");
        let (wildcard_score, _) = score_and_bind(&wildcard, &segments).unwrap();
        let (param_score, _) = score_and_bind(&param, &segments).unwrap();
        assert!(wildcard_score < param_score);
    }
}
