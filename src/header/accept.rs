//! `Accept` and `Accept-Language` codecs: ordered quality-weighted ranges
//! used by the accept link and accept-language link (spec §4.7 rules 5–6).

use crate::error::Error;
use crate::header::media_range::MediaRange;
use crate::header::parameterized::{self, ParameterizedOptions};

/// One `Accept` range with its quality value.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptEntry {
    pub range: MediaRange,
    pub quality: f32,
}

#[derive(Debug, Clone, Default)]
pub struct Accept {
    pub entries: Vec<AcceptEntry>,
}

impl Accept {
    pub fn parse(input: &str) -> Result<Accept, Error> {
        if input.trim().is_empty() {
            return Ok(Accept { entries: vec![AcceptEntry { range: MediaRange::parse("*/*").unwrap(), quality: 1.0 }] });
        }
        let opts = ParameterizedOptions {
            allow_multiple: true,
            allow_quoted_value: true,
            ..Default::default()
        };
        let groups = parameterized::parse(input, &opts)?;
        let mut entries = Vec::with_capacity(groups.len());
        for g in groups {
            let quality = g
                .param("q")
                .and_then(|q| q.parse::<f32>().ok())
                .unwrap_or(1.0);
            let mut rebuilt = g.primary.clone();
            for (k, v) in &g.params {
                if k != "q" {
                    rebuilt.push(';');
                    rebuilt.push_str(k);
                    rebuilt.push('=');
                    rebuilt.push_str(v);
                }
            }
            let range = MediaRange::parse(&rebuilt)?;
            entries.push(AcceptEntry { range, quality });
        }
        Ok(Accept { entries })
    }

    /// Score a candidate media type as `q * specificity` against every
    /// entry that matches it, returning the best score. `None` if nothing
    /// matches (q=0 entries never match, per RFC 7231).
    pub fn best_score(&self, candidate: &MediaRange) -> Option<f32> {
        self.entries
            .iter()
            .filter(|e| e.quality > 0.0 && e.range.matches(candidate))
            .map(|e| e.quality * (1.0 + e.range.specificity() as f32))
            .fold(None, |best, score| match best {
                Some(b) if b >= score => Some(b),
                _ => Some(score),
            })
    }
}

/// One `Accept-Language` range with quality.
#[derive(Debug, Clone)]
pub struct LanguageRange {
    pub tag: String,
    pub quality: f32,
}

#[derive(Debug, Clone, Default)]
pub struct AcceptLanguage {
    pub entries: Vec<LanguageRange>,
}

impl AcceptLanguage {
    pub fn parse(input: &str) -> Result<AcceptLanguage, Error> {
        let opts = ParameterizedOptions {
            allow_multiple: true,
            ..Default::default()
        };
        let groups = parameterized::parse(input, &opts)?;
        let entries = groups
            .into_iter()
            .map(|g| LanguageRange {
                tag: g.primary.to_ascii_lowercase(),
                quality: g.param("q").and_then(|q| q.parse().ok()).unwrap_or(1.0),
            })
            .collect();
        Ok(AcceptLanguage { entries })
    }

    /// RFC 4647 basic filtering: an available `tag` (e.g. `en`, offered by
    /// the server) satisfies a client `range` (e.g. `en-US`) if the range is
    /// `*`, equals the tag, or the tag is a prefix of the range ending at a
    /// `-` boundary (the server's broader tag covers the client's more
    /// specific request).
    fn range_matches(range: &str, tag: &str) -> bool {
        range == "*"
            || range.eq_ignore_ascii_case(tag)
            || range
                .to_ascii_lowercase()
                .starts_with(&format!("{}-", tag.to_ascii_lowercase()))
    }

    /// Returns the highest-quality range that matches `tag`, if any.
    pub fn best_match<'a>(&'a self, tags: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
        let mut best: Option<(&str, f32)> = None;
        for tag in tags {
            for entry in &self.entries {
                if entry.quality > 0.0 && Self::range_matches(&entry.tag, tag) {
                    if best.map_or(true, |(_, q)| entry.quality > q) {
                        best = Some((tag, entry.quality));
                    }
                }
            }
        }
        best.map(|(tag, _)| tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_quality_selection() {
        // Spec §8: text/plain;q=0.9 beats application/json;q=0.8 even
        // though both candidate routes produce with quality 1 at equal
        // specificity.
        let accept = Accept::parse("text/plain;q=0.9, application/json;q=0.8").unwrap();
        let text = MediaRange::parse("text/plain").unwrap();
        let json = MediaRange::parse("application/json").unwrap();
        let text_score = accept.best_score(&text).unwrap();
        let json_score = accept.best_score(&json).unwrap();
        assert!(text_score > json_score);
    }

    #[test]
    fn accept_language_prefix_match() {
        let al = AcceptLanguage::parse("en-US, fr;q=0.5").unwrap();
        assert_eq!(al.best_match(["en", "fr"]), Some("en"));
    }

    #[test]
    fn empty_accept_means_any() {
        let accept = Accept::parse("").unwrap();
        let json = MediaRange::parse("application/json").unwrap();
        assert!(accept.best_score(&json).is_some());
    }
}
