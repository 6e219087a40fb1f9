//! `Set-Cookie` codec: the first `name=value` pair is the cookie identity;
//! subsequent attributes are recognized case-insensitively (spec §4.1).

use std::fmt::Write as _;
use std::time::Duration;

use crate::error::{Decode, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

#[derive(Debug, Clone, Default)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub expires: Option<String>,
    pub max_age: Option<Duration>,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl SetCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        SetCookie {
            name: name.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    pub fn parse(input: &str) -> Result<SetCookie, Error> {
        let mut parts = input.split(';');
        let identity = parts.next().ok_or_else(|| Error::new_decode(Decode::Header))?;
        let (name, value) = identity
            .split_once('=')
            .ok_or_else(|| Error::new_decode(Decode::Header))?;

        let mut cookie = SetCookie::new(name.trim(), value.trim());

        for attr in parts {
            let attr = attr.trim();
            if attr.is_empty() {
                continue;
            }
            match attr.split_once('=') {
                Some((k, v)) => {
                    let v = v.trim();
                    match k.trim().to_ascii_lowercase().as_str() {
                        "expires" => cookie.expires = Some(v.to_owned()),
                        "max-age" => {
                            cookie.max_age =
                                v.parse::<i64>().ok().map(|s| Duration::from_secs(s.max(0) as u64));
                        }
                        "domain" => cookie.domain = Some(v.to_owned()),
                        "path" => cookie.path = Some(v.to_owned()),
                        "samesite" => {
                            cookie.same_site = match v.to_ascii_lowercase().as_str() {
                                "strict" => Some(SameSite::Strict),
                                "lax" => Some(SameSite::Lax),
                                "none" => Some(SameSite::None),
                                _ => None,
                            };
                        }
                        _ => {}
                    }
                }
                None => match attr.to_ascii_lowercase().as_str() {
                    "secure" => cookie.secure = true,
                    "httponly" => cookie.http_only = true,
                    _ => {}
                },
            }
        }

        Ok(cookie)
    }

    /// Encodes the cookie onto the wire. Field order matches spec §8's
    /// testable property: `name=value; Max-Age=...; Path=...; HttpOnly`.
    pub fn encode(&self) -> String {
        let mut out = format!("{}={}", self.name, self.value);
        if let Some(expires) = &self.expires {
            let _ = write!(out, "; Expires={}", expires);
        }
        if let Some(max_age) = self.max_age {
            let _ = write!(out, "; Max-Age={}", max_age.as_secs());
        }
        if let Some(domain) = &self.domain {
            let _ = write!(out, "; Domain={}", domain);
        }
        if let Some(path) = &self.path {
            let _ = write!(out, "; Path={}", path);
        }
        if self.secure {
            out.push_str("; Secure");
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        if let Some(same_site) = self.same_site {
            out.push_str("; SameSite=");
            out.push_str(match same_site {
                SameSite::Strict => "Strict",
                SameSite::Lax => "Lax",
                SameSite::None => "None",
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_per_spec_example() {
        // spec §8: (name="s", value="v", path="/", httpOnly=true, maxAge=3600)
        // -> "s=v; Max-Age=3600; Path=/; HttpOnly"
        let cookie = SetCookie::new("s", "v")
            .max_age(Duration::from_secs(3600))
            .path("/")
            .http_only(true);
        assert_eq!(cookie.encode(), "s=v; Max-Age=3600; Path=/; HttpOnly");
    }

    #[test]
    fn parses_attributes_case_insensitively() {
        let cookie = SetCookie::parse("id=42; SECURE; httponly; Path=/api").unwrap();
        assert_eq!(cookie.name, "id");
        assert_eq!(cookie.value, "42");
        assert!(cookie.secure);
        assert!(cookie.http_only);
        assert_eq!(cookie.path.as_deref(), Some("/api"));
    }
}
