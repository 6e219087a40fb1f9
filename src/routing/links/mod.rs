//! One scoring function per matching dimension (spec §4.7), composed in
//! chain order by [`super::router::Router::resolve_detailed`].

pub(crate) mod accept;
pub(crate) mod accept_language;
pub(crate) mod authority;
pub(crate) mod content_type;
pub(crate) mod error;
pub(crate) mod headers;
pub(crate) mod method;
pub(crate) mod path;
pub(crate) mod query;
pub(crate) mod subprotocol;
