//! Registration session cookie.

use axum::http::{header, HeaderMap, HeaderValue};
use std::time::Duration;

/// Reads and writes the cookie carrying the registration session key.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    name: String,
    max_age: Duration,
    secure: bool,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, max_age: Duration, secure: bool) -> Self {
        Self {
            name: name.into(),
            max_age,
            secure,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Session key sent by the client, if any.
    pub fn read<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, value)| *name == self.name && !value.is_empty())
            .map(|(_, value)| value)
    }

    /// `Set-Cookie` value for `key`.
    pub fn header(&self, key: &str) -> Option<HeaderValue> {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            self.name,
            key,
            self.max_age.as_secs()
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie() -> SessionCookie {
        SessionCookie::new("registration", Duration::from_secs(600), true)
    }

    #[test]
    fn test_read_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; registration=abc123; lang=nl"),
        );

        assert_eq!(cookie().read(&headers), Some("abc123"));
    }

    #[test]
    fn test_read_missing_or_empty() {
        let mut headers = HeaderMap::new();
        assert_eq!(cookie().read(&headers), None);

        headers.insert(header::COOKIE, HeaderValue::from_static("registration="));
        assert_eq!(cookie().read(&headers), None);
    }

    #[test]
    fn test_header() {
        let value = cookie().header("abc123").unwrap();
        assert_eq!(
            value.to_str().unwrap(),
            "registration=abc123; Path=/; Max-Age=600; HttpOnly; SameSite=Lax; Secure"
        );

        let plain = SessionCookie::new("registration", Duration::from_secs(60), false);
        assert!(!plain
            .header("k")
            .unwrap()
            .to_str()
            .unwrap()
            .contains("Secure"));
    }
}
