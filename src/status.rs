//! HTTP status kinds carrying an auxiliary payload (spec §6): every 4xx/5xx
//! condition the core or routing engine can raise has a stable status code
//! plus, for some kinds, extra structured data a `Controller` can use to
//! build a richer response (e.g. the `Allow` header's method set).

use std::time::SystemTime;

use http::{Method, StatusCode};

use crate::header::MediaRange;

/// A routing or protocol failure with its associated HTTP status and any
/// auxiliary data the spec calls for.
#[derive(Debug, Clone)]
pub enum StatusKind {
    /// No route matched the request at all.
    NotFound,
    /// Routes matched every criterion but method; carries the allowed set.
    MethodNotAllowed { allowed: Vec<Method> },
    /// Routes matched but none produced an acceptable representation;
    /// carries the acceptable media types.
    NotAcceptable { acceptable: Vec<MediaRange> },
    /// The request's `Content-Type` matched no route.
    UnsupportedMediaType,
    /// The server is temporarily unable to serve the request; carries a
    /// retry-after instant.
    ServiceUnavailable { retry_after: Option<SystemTime> },
    /// A WebSocket upgrade request named no subprotocol the route supports;
    /// carries the set of subprotocols the route does support.
    UnsupportedProtocol { supported: Vec<String> },
    /// A malformed request (bad start line, invalid header, oversized
    /// line/header section).
    BadRequest,
    /// The request-line (URI) was too long to buffer.
    UriTooLong,
    /// The header section was too large to buffer.
    HeaderFieldsTooLarge,
    /// An unhandled failure in application code.
    InternalServerError,
}

impl StatusKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            StatusKind::NotFound => StatusCode::NOT_FOUND,
            StatusKind::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            StatusKind::NotAcceptable { .. } => StatusCode::NOT_ACCEPTABLE,
            StatusKind::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            StatusKind::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            StatusKind::UnsupportedProtocol { .. } => StatusCode::BAD_REQUEST,
            StatusKind::BadRequest => StatusCode::BAD_REQUEST,
            StatusKind::UriTooLong => StatusCode::URI_TOO_LONG,
            StatusKind::HeaderFieldsTooLarge => StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
            StatusKind::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The status's default reason phrase, used as the synthesized
    /// response body when no `Controller` handled the error (spec §7).
    pub fn reason_phrase(&self) -> &'static str {
        self.status_code().canonical_reason().unwrap_or("Error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_not_allowed_maps_to_405() {
        let kind = StatusKind::MethodNotAllowed {
            allowed: vec![Method::POST],
        };
        assert_eq!(kind.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
