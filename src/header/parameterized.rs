//! The parameterized-header grammar (spec §4.1): scans a header value into
//! a primary value plus an ordered list of `name=value` parameters, honoring
//! a configurable set of delimiters and quoting rules. `Content-Type`,
//! `Accept`, and `Set-Cookie` are all instances of this grammar with
//! different [`ParameterizedOptions`].

use crate::error::{Decode, Error};

/// Options controlling one grammar instance. Different headers pick
/// different combinations (e.g. `Content-Type` uses `;`/`;`/`=` with quoted
/// values allowed and no flag parameters; `Set-Cookie`'s trailing
/// attributes allow flag parameters like `Secure`/`HttpOnly`).
#[derive(Debug, Clone)]
pub struct ParameterizedOptions {
    /// Byte separating the primary value from its parameter list (and
    /// separating one "value group" from the next under `allow_multiple`
    /// when that separator differs from the parameter delimiter, e.g. `,`
    /// for `Accept`).
    pub value_delimiter: char,
    /// Byte separating parameters from one another.
    pub parameter_delimiter: char,
    /// Byte separating a parameter's name from its value.
    pub parameter_value_delimiter: char,
    /// Whether a parameter may be present with an empty value (`name=`).
    pub allow_empty_value: bool,
    /// Whether the primary value itself may be absent (an all-parameter
    /// value, e.g. a bare `charset=utf-8`).
    pub expect_no_value: bool,
    /// Whether a parameter may appear with no `=value` at all (a flag, e.g.
    /// `Secure` in `Set-Cookie`).
    pub allow_flag_parameter: bool,
    /// Whether unquoted values may contain spaces.
    pub allow_space_in_value: bool,
    /// Whether `"..."` quoting (with `\"` escapes) is recognized for
    /// parameter values.
    pub allow_quoted_value: bool,
    /// Whether the raw input may contain multiple comma-separated
    /// value-groups sharing one header name (e.g. multiple `Accept` ranges).
    pub allow_multiple: bool,
}

impl Default for ParameterizedOptions {
    fn default() -> Self {
        ParameterizedOptions {
            value_delimiter: ';',
            parameter_delimiter: ';',
            parameter_value_delimiter: '=',
            allow_empty_value: false,
            expect_no_value: false,
            allow_flag_parameter: false,
            allow_space_in_value: true,
            allow_quoted_value: true,
            allow_multiple: false,
        }
    }
}

/// A scanned primary value plus its ordered parameter list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParameterizedValue {
    pub primary: String,
    pub params: Vec<(String, String)>,
}

impl ParameterizedValue {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Parses `input` per `opts`, returning one value per comma-separated group
/// when `allow_multiple` is set, else exactly one.
pub fn parse(input: &str, opts: &ParameterizedOptions) -> Result<Vec<ParameterizedValue>, Error> {
    if opts.allow_multiple {
        split_top_level(input, ',')
            .into_iter()
            .map(|group| parse_one(group.trim(), opts))
            .collect()
    } else {
        Ok(vec![parse_one(input.trim(), opts)?])
    }
}

fn parse_one(input: &str, opts: &ParameterizedOptions) -> Result<ParameterizedValue, Error> {
    let parts = split_top_level(input, opts.value_delimiter);
    let mut parts = parts.into_iter();

    let primary = match parts.next() {
        Some(p) if !opts.expect_no_value => p.trim().to_owned(),
        Some(p) if opts.expect_no_value && p.trim().is_empty() => String::new(),
        Some(p) if opts.expect_no_value => {
            // The "primary" slot is actually the first parameter.
            return parse_params(std::iter::once(p).chain(parts), opts)
                .map(|params| ParameterizedValue {
                    primary: String::new(),
                    params,
                });
        }
        Some(_) | None => String::new(),
    };

    if primary.is_empty() && !opts.allow_empty_value && !opts.expect_no_value {
        return Err(Error::new_decode(Decode::Header));
    }

    let params = parse_params(parts, opts)?;
    Ok(ParameterizedValue { primary, params })
}

fn parse_params<'a>(
    rest: impl Iterator<Item = &'a str>,
    opts: &ParameterizedOptions,
) -> Result<Vec<(String, String)>, Error> {
    let mut params = Vec::new();
    for chunk in rest {
        for raw in split_top_level(chunk, opts.parameter_delimiter) {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            match raw.find(opts.parameter_value_delimiter) {
                Some(eq) => {
                    let name = raw[..eq].trim().to_owned();
                    let mut value = raw[eq + 1..].trim();
                    let unquoted;
                    if opts.allow_quoted_value && value.starts_with('"') && value.ends_with('"')
                        && value.len() >= 2
                    {
                        unquoted = unescape_quoted(&value[1..value.len() - 1]);
                        value = &unquoted;
                    }
                    if value.is_empty() && !opts.allow_empty_value {
                        return Err(Error::new_decode(Decode::Header));
                    }
                    if !opts.allow_space_in_value && value.contains(' ') && !raw.contains('"') {
                        return Err(Error::new_decode(Decode::Header));
                    }
                    params.push((name, value.to_owned()));
                }
                None => {
                    if opts.allow_flag_parameter {
                        params.push((raw.to_owned(), String::new()));
                    } else {
                        return Err(Error::new_decode(Decode::Header));
                    }
                }
            }
        }
    }
    Ok(params)
}

fn unescape_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Splits `input` on `delim`, treating `"..."` spans (with `\"` escapes) as
/// opaque so a delimiter inside a quoted value doesn't split the group.
fn split_top_level(input: &str, delim: char) -> Vec<&str> {
    let mut out = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == delim && !in_quotes => {
                out.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    out.push(&input[start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content_type_opts() -> ParameterizedOptions {
        ParameterizedOptions {
            allow_quoted_value: true,
            ..Default::default()
        }
    }

    #[test]
    fn parses_primary_and_params() {
        let v = parse_one(
            "text/html; charset=utf-8; boundary=\"a;b\"",
            &content_type_opts(),
        )
        .unwrap();
        assert_eq!(v.primary, "text/html");
        assert_eq!(v.param("charset"), Some("utf-8"));
        assert_eq!(v.param("boundary"), Some("a;b"));
    }

    #[test]
    fn rejects_empty_value_by_default() {
        let err = parse_one("", &content_type_opts());
        assert!(err.is_err());
    }

    #[test]
    fn flag_parameter_requires_opt_in() {
        let opts = content_type_opts();
        assert!(parse_one("v; Secure", &opts).is_err());
        let opts_flag = ParameterizedOptions {
            allow_flag_parameter: true,
            ..opts
        };
        let v = parse_one("v; Secure", &opts_flag).unwrap();
        assert_eq!(v.param("Secure"), Some(""));
    }

    #[test]
    fn multiple_values_split_on_top_level_comma() {
        let opts = ParameterizedOptions {
            allow_multiple: true,
            ..content_type_opts()
        };
        let values = parse("text/html, application/json;q=0.9", &opts).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].primary, "text/html");
        assert_eq!(values[1].primary, "application/json");
        assert_eq!(values[1].param("q"), Some("0.9"));
    }

    #[test]
    fn roundtrip_is_order_preserving_for_params() {
        let v = parse_one("a/b;x=1;y=2", &content_type_opts()).unwrap();
        assert_eq!(
            v.params,
            vec![("x".to_owned(), "1".to_owned()), ("y".to_owned(), "2".to_owned())]
        );
    }
}
