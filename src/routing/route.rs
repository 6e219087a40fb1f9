//! Route data model (spec §3): a resource plus an orthogonal criteria set.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use http::Method;
use regex::Regex;

use crate::error::{Decode, Error};
use crate::header::MediaRange;

/// One segment of a compiled path pattern.
#[derive(Debug, Clone)]
pub enum PathSegment {
    Literal(String),
    Wildcard,
    Param {
        name: String,
        regex: Option<Arc<Regex>>,
    },
}

/// A compiled `/literal/{param}/{typed:[0-9]+}/*` style path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    pub(crate) raw: String,
    pub(crate) segments: Vec<PathSegment>,
}

impl PathPattern {
    /// Compiles a path pattern. Segments are separated by `/`; `*` matches
    /// any single segment, `{name}` binds a named parameter, and
    /// `{name:regex}` additionally constrains it.
    pub fn parse(raw: &str) -> Result<PathPattern, Error> {
        let trimmed = raw.trim_start_matches('/');
        let segments = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed
                .split('/')
                .map(|seg| {
                    if seg == "*" {
                        Ok(PathSegment::Wildcard)
                    } else if let Some(inner) = seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                        match inner.split_once(':') {
                            Some((name, pattern)) => {
                                let regex = Regex::new(pattern)
                                    .map_err(|_| Error::new_decode(Decode::Uri))?;
                                Ok(PathSegment::Param {
                                    name: name.to_owned(),
                                    regex: Some(Arc::new(regex)),
                                })
                            }
                            None => Ok(PathSegment::Param {
                                name: inner.to_owned(),
                                regex: None,
                            }),
                        }
                    } else {
                        Ok(PathSegment::Literal(seg.to_owned()))
                    }
                })
                .collect::<Result<Vec<_>, Error>>()?
        };
        Ok(PathPattern {
            raw: raw.to_owned(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Authority (`Host`/`:authority`) matcher: exact string, or a regex, with
/// exact taking precedence per spec §4.7 rule 3.
#[derive(Debug, Clone)]
pub enum AuthorityMatcher {
    Exact(String),
    Pattern(Arc<Regex>),
}

/// A literal-or-regex value set: any member matching the candidate value
/// satisfies the matcher (spec §4.7 rules 7–8).
#[derive(Debug, Clone, Default)]
pub struct ValueMatcher {
    literals: HashSet<String>,
    patterns: Vec<Arc<Regex>>,
}

impl ValueMatcher {
    pub fn new() -> Self {
        ValueMatcher::default()
    }

    pub fn literal(mut self, value: impl Into<String>) -> Self {
        self.literals.insert(value.into());
        self
    }

    pub fn pattern(mut self, regex: Regex) -> Self {
        self.patterns.push(Arc::new(regex));
        self
    }

    pub fn matches(&self, value: &str) -> bool {
        self.literals.contains(value) || self.patterns.iter().any(|re| re.is_match(value))
    }
}

/// Selects a route by the most-specific assignable error class (spec §4.7
/// rule 10). The core has no exception hierarchy of its own, so a class is
/// just a predicate plus a declared specificity used to break ties between
/// overlapping predicates (e.g. "any decode error" vs "request-line too
/// long specifically").
#[derive(Clone)]
pub struct ErrorClass {
    specificity: u32,
    predicate: Arc<dyn Fn(&Error) -> bool + Send + Sync>,
}

impl ErrorClass {
    pub fn new(specificity: u32, predicate: impl Fn(&Error) -> bool + Send + Sync + 'static) -> Self {
        ErrorClass {
            specificity,
            predicate: Arc::new(predicate),
        }
    }

    pub(crate) fn matches(&self, err: &Error) -> Option<f64> {
        if (self.predicate)(err) {
            Some(self.specificity as f64)
        } else {
            None
        }
    }
}

impl fmt::Debug for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorClass")
            .field("specificity", &self.specificity)
            .finish()
    }
}

/// The criteria set a [`Route`] is matched against; every field is
/// independent (spec §3: "criteria are orthogonal") and absence means the
/// route doesn't constrain that dimension.
#[derive(Debug, Clone, Default)]
pub struct Criteria {
    pub path: Option<PathPattern>,
    pub method: Option<Method>,
    pub authority: Option<AuthorityMatcher>,
    pub consumes: Option<MediaRange>,
    pub produces: Option<MediaRange>,
    pub accept_language: Option<String>,
    pub headers: Vec<(http::HeaderName, ValueMatcher)>,
    pub query: Vec<(String, ValueMatcher)>,
    pub subprotocol: Option<String>,
    pub error_class: Option<ErrorClass>,
}

impl Criteria {
    pub fn new() -> Self {
        Criteria::default()
    }

    pub fn path(mut self, pattern: &str) -> Result<Self, Error> {
        self.path = Some(PathPattern::parse(pattern)?);
        Ok(self)
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn authority_exact(mut self, host: impl Into<String>) -> Self {
        self.authority = Some(AuthorityMatcher::Exact(host.into()));
        self
    }

    pub fn authority_pattern(mut self, regex: Regex) -> Self {
        self.authority = Some(AuthorityMatcher::Pattern(Arc::new(regex)));
        self
    }

    pub fn consumes(mut self, media_range: &str) -> Result<Self, Error> {
        self.consumes = Some(MediaRange::parse(media_range)?);
        Ok(self)
    }

    pub fn produces(mut self, media_range: &str) -> Result<Self, Error> {
        self.produces = Some(MediaRange::parse(media_range)?);
        Ok(self)
    }

    pub fn accept_language(mut self, tag: impl Into<String>) -> Self {
        self.accept_language = Some(tag.into());
        self
    }

    pub fn header(mut self, name: http::HeaderName, matcher: ValueMatcher) -> Self {
        self.headers.push((name, matcher));
        self
    }

    pub fn query_param(mut self, name: impl Into<String>, matcher: ValueMatcher) -> Self {
        self.query.push((name.into(), matcher));
        self
    }

    pub fn subprotocol(mut self, name: impl Into<String>) -> Self {
        self.subprotocol = Some(name.into());
        self
    }

    pub fn error_class(mut self, class: ErrorClass) -> Self {
        self.error_class = Some(class);
        self
    }
}

/// A route: a resource plus the criteria that select it, and whether it is
/// currently enabled (spec §3).
#[derive(Debug, Clone)]
pub struct Route<R> {
    pub(crate) id: u64,
    pub resource: R,
    pub criteria: Criteria,
    pub enabled: bool,
}

impl<R> Route<R> {
    pub fn id(&self) -> u64 {
        self.id
    }
}
