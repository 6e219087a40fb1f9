//! The routing engine (spec §4.7): a typed `Route<R>` paired with a
//! `Criteria` per matching dimension, resolved by walking an ordered chain
//! of routing links (path → method → authority → content-type → accept →
//! accept-language → headers → query → subprotocol), plus a dedicated
//! error-class link used by the error-routing pathway (spec §7).
//!
//! Each link in §4.7 is specified as a mutable map of *criterion-value →
//! next link*; here every link is instead a pure scoring function applied
//! over a route snapshot, and the chain narrows the candidate set step by
//! step (see [`router::narrow`]). This reproduces the same matching,
//! precedence, and tie-break semantics without a second mutable trie
//! alongside the route list itself — the simplification this repository's
//! design notes record for collapsing `AbstractRoute`'s inheritance family.

mod extractor;
mod links;
mod manager;
mod route;
mod router;

pub use extractor::RouteExtractor;
pub use manager::RouteManager;
pub use route::{AuthorityMatcher, Criteria, ErrorClass, PathPattern, Route, ValueMatcher};
pub use router::{MatchInput, Matched, Resolution, Router};
