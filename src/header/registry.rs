//! Dispatches a lowercased header name to the codec that knows how to turn
//! its raw value into a [`ParameterizedValue`], falling back to a generic
//! codec (primary-only, no parameters) for anything unregistered.

use std::collections::HashMap;

use crate::header::parameterized::{self, ParameterizedOptions, ParameterizedValue};

type Codec = fn(&str) -> Option<ParameterizedValue>;

#[derive(Clone)]
pub struct Registry {
    codecs: HashMap<&'static str, Codec>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("codecs", &self.codecs.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn content_type_opts() -> ParameterizedOptions {
    ParameterizedOptions {
        allow_quoted_value: true,
        ..Default::default()
    }
}

fn multi_value_opts() -> ParameterizedOptions {
    ParameterizedOptions {
        allow_multiple: true,
        allow_quoted_value: true,
        ..Default::default()
    }
}

fn set_cookie_opts() -> ParameterizedOptions {
    ParameterizedOptions {
        parameter_delimiter: ';',
        allow_flag_parameter: true,
        allow_empty_value: true,
        ..Default::default()
    }
}

fn decode_content_type(value: &str) -> Option<ParameterizedValue> {
    parameterized::parse(value, &content_type_opts())
        .ok()
        .and_then(|v| v.into_iter().next())
}

fn decode_accept(value: &str) -> Option<ParameterizedValue> {
    // Only the first value-group is surfaced through the generic codec path;
    // callers needing every range use `Accept::parse` directly.
    parameterized::parse(value, &multi_value_opts())
        .ok()
        .and_then(|v| v.into_iter().next())
}

fn decode_set_cookie(value: &str) -> Option<ParameterizedValue> {
    parameterized::parse(value, &set_cookie_opts())
        .ok()
        .and_then(|v| v.into_iter().next())
}

fn decode_generic(value: &str) -> Option<ParameterizedValue> {
    Some(ParameterizedValue {
        primary: value.to_owned(),
        params: Vec::new(),
    })
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            codecs: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: &'static str, codec: Codec) -> &mut Self {
        self.codecs.insert(name, codec);
        self
    }

    /// The registry preloaded with codecs for the headers this crate gives
    /// special treatment: `Content-Type`, `Accept`, `Accept-Language`,
    /// `Accept-Encoding`, and `Set-Cookie`.
    pub fn with_defaults() -> Self {
        let mut registry = Registry::new();
        registry
            .register("content-type", decode_content_type)
            .register("accept", decode_accept)
            .register("accept-language", decode_accept)
            .register("accept-encoding", decode_accept)
            .register("set-cookie", decode_set_cookie);
        registry
    }

    /// Decode `value` using `lowercased_name`'s registered codec, or the
    /// generic fallback codec if none is registered.
    pub fn decode(&self, lowercased_name: &str, value: &str) -> Option<ParameterizedValue> {
        let codec = self.codecs.get(lowercased_name).copied().unwrap_or(decode_generic);
        codec(value)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_generic_codec() {
        let reg = Registry::with_defaults();
        let v = reg.decode("x-custom", "hello").unwrap();
        assert_eq!(v.primary, "hello");
        assert!(v.params.is_empty());
    }

    #[test]
    fn dispatches_content_type() {
        let reg = Registry::with_defaults();
        let v = reg.decode("content-type", "text/plain; charset=utf-8").unwrap();
        assert_eq!(v.primary, "text/plain");
        assert_eq!(v.param("charset"), Some("utf-8"));
    }

    #[test]
    fn dispatches_set_cookie_with_flags() {
        let reg = Registry::with_defaults();
        let v = reg.decode("set-cookie", "id=1; Secure; HttpOnly").unwrap();
        assert_eq!(v.primary, "id=1");
        assert_eq!(v.param("Secure"), Some(""));
    }
}
