use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// An http(s) URL with its fragment stripped, stored in its canonical
/// string form. Equality and hashing compare the canonical string, which
/// is what the coordinator's seen-set keys on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalUrl {
    canonical: String,
    host: String,
    scheme: String,
}

#[derive(Debug, Error)]
pub enum UrlError {
    #[error("invalid URL: {0}")]
    Parse(#[from] url::ParseError),
    #[error("unsupported scheme {scheme:?}, only http and https are crawled")]
    UnsupportedScheme { scheme: String },
    #[error("URL has no host")]
    NoHost,
}

impl CanonicalUrl {
    /// Parse and canonicalize a URL: reject non-http(s) schemes, strip the
    /// fragment, and keep the rest of the `url` crate's normalization
    /// (lowercased scheme/host, percent-encoding).
    pub fn parse(raw: &str) -> Result<Self, UrlError> {
        let mut parsed = Url::parse(raw)?;
        Self::from_parsed(&mut parsed)
    }

    /// Resolve `href` against `base` (the page's final URL, so redirects
    /// are already accounted for) and canonicalize the result.
    pub fn resolve(base: &Url, href: &str) -> Result<Self, UrlError> {
        let mut joined = base.join(href)?;
        Self::from_parsed(&mut joined)
    }

    fn from_parsed(url: &mut Url) -> Result<Self, UrlError> {
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(UrlError::UnsupportedScheme {
                scheme: url.scheme().to_string(),
            });
        }
        let host = url.host_str().ok_or(UrlError::NoHost)?.to_string();
        let scheme = url.scheme().to_string();
        url.set_fragment(None);
        Ok(Self {
            canonical: url.to_string(),
            host,
            scheme,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn into_inner(self) -> String {
        self.canonical
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl TryFrom<String> for CanonicalUrl {
    type Error = UrlError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fragment() {
        let u = CanonicalUrl::parse("https://example.com/a#section").unwrap();
        assert_eq!(u.as_str(), "https://example.com/a");
    }

    #[test]
    fn rejects_non_http_scheme() {
        let err = CanonicalUrl::parse("ftp://example.com/a").unwrap_err();
        assert!(matches!(err, UrlError::UnsupportedScheme { .. }));
    }

    #[test]
    fn resolves_relative_against_base() {
        let base = Url::parse("https://example.com/dir/page.html").unwrap();
        let u = CanonicalUrl::resolve(&base, "../other#frag").unwrap();
        assert_eq!(u.as_str(), "https://example.com/other");
    }

    #[test]
    fn host_accessor() {
        let u = CanonicalUrl::parse("https://example.com/a").unwrap();
        assert_eq!(u.host(), "example.com");
    }

    #[test]
    fn scheme_accessor_retains_http() {
        let https = CanonicalUrl::parse("https://example.com/a").unwrap();
        assert_eq!(https.scheme(), "https");
        let http = CanonicalUrl::parse("http://example.com/a").unwrap();
        assert_eq!(http.scheme(), "http");
    }
}
