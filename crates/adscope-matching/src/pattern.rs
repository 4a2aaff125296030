//! WebExtension match patterns.
//!
//! A pattern has the shape `<scheme>://<host><path>` or is the special
//! `<all_urls>` pattern. The scheme `*` covers `http`, `https`, `ws` and
//! `wss`. A host of the form `*.example.com` matches `example.com` and
//! every subdomain of it. The path is a glob in which `*` matches any run
//! of characters, evaluated against the URL's path and query.

use crate::error::{MatchPatternError, Result};
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use url::Url;

const ALL_URLS: &str = "<all_urls>";
const WILDCARD_SCHEMES: [&str; 4] = ["http", "https", "ws", "wss"];
const SUPPORTED_SCHEMES: [&str; 6] = ["http", "https", "ws", "wss", "ftp", "file"];

#[derive(Debug, Clone)]
enum SchemeMatch {
    Wildcard,
    Exact(String),
}

impl SchemeMatch {
    fn matches(&self, scheme: &str) -> bool {
        match self {
            SchemeMatch::Wildcard => WILDCARD_SCHEMES.contains(&scheme),
            SchemeMatch::Exact(expected) => expected == scheme,
        }
    }
}

#[derive(Debug, Clone)]
enum HostMatch {
    Any,
    Subdomains(String),
    Exact(String),
}

impl HostMatch {
    fn matches(&self, host: &str) -> bool {
        match self {
            HostMatch::Any => true,
            HostMatch::Subdomains(domain) => {
                host == domain
                    || host
                        .strip_suffix(domain.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            }
            HostMatch::Exact(expected) => expected == host,
        }
    }
}

#[derive(Debug, Clone)]
enum PatternKind {
    AllUrls,
    Parts {
        scheme: SchemeMatch,
        host: HostMatch,
        path: Regex,
    },
}

/// A single parsed match pattern.
#[derive(Debug, Clone)]
pub struct MatchPattern {
    source: String,
    kind: PatternKind,
}

impl MatchPattern {
    /// Parse a match pattern string.
    ///
    /// # Errors
    /// Returns `MatchPatternError::InvalidPattern` if the scheme is not
    /// supported, the host contains a misplaced wildcard or a port, or the
    /// path is missing.
    pub fn parse(pattern: &str) -> Result<Self> {
        if pattern == ALL_URLS {
            return Ok(Self {
                source: pattern.to_string(),
                kind: PatternKind::AllUrls,
            });
        }

        let invalid = |reason: &str| MatchPatternError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let (scheme, rest) = pattern
            .split_once("://")
            .ok_or_else(|| invalid("missing scheme separator"))?;

        let scheme = match scheme {
            "*" => SchemeMatch::Wildcard,
            s if SUPPORTED_SCHEMES.contains(&s) => SchemeMatch::Exact(s.to_string()),
            _ => return Err(invalid("unsupported scheme")),
        };

        let path_start = rest.find('/').ok_or_else(|| invalid("missing path"))?;
        let (host, path) = rest.split_at(path_start);

        let host = match (&scheme, host) {
            (SchemeMatch::Exact(s), "") if s == "file" => HostMatch::Exact(String::new()),
            (_, "") => return Err(invalid("missing host")),
            (_, "*") => HostMatch::Any,
            (_, h) if h.contains(':') => return Err(invalid("ports are not allowed")),
            (_, h) => match h.strip_prefix("*.") {
                Some(domain) if !domain.is_empty() && !domain.contains('*') => {
                    HostMatch::Subdomains(domain.to_ascii_lowercase())
                }
                Some(_) => return Err(invalid("wildcard must prefix a domain")),
                None if h.contains('*') => {
                    return Err(invalid("wildcard is only allowed as the first label"))
                }
                None => HostMatch::Exact(h.to_ascii_lowercase()),
            },
        };

        Ok(Self {
            source: pattern.to_string(),
            kind: PatternKind::Parts {
                scheme,
                host,
                path: glob_to_regex(path),
            },
        })
    }

    /// The pattern as originally written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Check whether a URL is covered by this pattern.
    #[must_use]
    pub fn matches(&self, url: &Url) -> bool {
        match &self.kind {
            PatternKind::AllUrls => SUPPORTED_SCHEMES.contains(&url.scheme()),
            PatternKind::Parts { scheme, host, path } => {
                if !scheme.matches(url.scheme()) {
                    return false;
                }

                let url_host = url.host_str().unwrap_or_default();
                if url.scheme() != "file" && url_host.is_empty() {
                    return false;
                }
                if !host.matches(url_host) {
                    return false;
                }

                match url.query() {
                    Some(query) => path.is_match(&format!("{}?{}", url.path(), query)),
                    None => path.is_match(url.path()),
                }
            }
        }
    }
}

impl fmt::Display for MatchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl PartialEq for MatchPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for MatchPattern {}

impl Serialize for MatchPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

fn glob_to_regex(glob: &str) -> Regex {
    let body = glob
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{body}$")).expect("escaped glob is a valid regex")
}

/// An ordered, duplicate-free collection of match patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchPatternSet {
    patterns: Vec<MatchPattern>,
}

impl MatchPatternSet {
    /// Create an empty set; it matches no URL.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every pattern string into a set.
    ///
    /// # Errors
    /// Returns the first parse failure.
    pub fn parse<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for pattern in patterns {
            set.insert(MatchPattern::parse(pattern.as_ref())?);
        }
        Ok(set)
    }

    /// Add a pattern unless an identical one is already present.
    pub fn insert(&mut self, pattern: MatchPattern) {
        if !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }
    }

    /// Check whether any pattern covers the URL.
    #[must_use]
    pub fn matches(&self, url: &Url) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(url))
    }

    /// Parse a URL string and check it against the set.
    ///
    /// Unparseable URLs match nothing.
    #[must_use]
    pub fn matches_str(&self, url: &str) -> bool {
        Url::parse(url).is_ok_and(|url| self.matches(&url))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MatchPattern> {
        self.patterns.iter()
    }

    /// The patterns in the string form expected by content script hosts.
    #[must_use]
    pub fn as_strings(&self) -> Vec<String> {
        self.patterns.iter().map(|p| p.source.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).expect("valid test URL")
    }

    #[test]
    fn test_wildcard_scheme() {
        let pattern = MatchPattern::parse("*://example.com/*").expect("valid pattern");
        assert!(pattern.matches(&url("https://example.com/x")));
        assert!(pattern.matches(&url("http://example.com/")));
        assert!(pattern.matches(&url("wss://example.com/socket")));
        assert!(!pattern.matches(&url("ftp://example.com/file")));
    }

    #[test]
    fn test_exact_host_excludes_subdomains() {
        let pattern = MatchPattern::parse("https://example.com/*").expect("valid pattern");
        assert!(pattern.matches(&url("https://example.com/a?x=1")));
        assert!(!pattern.matches(&url("https://sub.example.com/a")));
        assert!(!pattern.matches(&url("http://example.com/a")));
    }

    #[test]
    fn test_subdomain_host() {
        let pattern = MatchPattern::parse("*://*.example.com/*").expect("valid pattern");
        assert!(pattern.matches(&url("https://sub.example.com/x")));
        assert!(pattern.matches(&url("https://a.b.example.com/x")));
        assert!(pattern.matches(&url("https://example.com/x")));
        assert!(!pattern.matches(&url("https://notexample.com/x")));
        assert!(!pattern.matches(&url("https://example.com.evil.net/x")));
    }

    #[test]
    fn test_host_is_case_insensitive() {
        let pattern = MatchPattern::parse("*://Example.COM/*").expect("valid pattern");
        assert!(pattern.matches(&url("https://EXAMPLE.com/x")));
    }

    #[test]
    fn test_path_glob() {
        let pattern =
            MatchPattern::parse("https://example.com/news/*.html").expect("valid pattern");
        assert!(pattern.matches(&url("https://example.com/news/today.html")));
        assert!(!pattern.matches(&url("https://example.com/sports/today.html")));
        assert!(!pattern.matches(&url("https://example.com/news/today.htm")));

        let literal = MatchPattern::parse("https://example.com/a.b").expect("valid pattern");
        assert!(!literal.matches(&url("https://example.com/axb")));
    }

    #[test]
    fn test_all_urls() {
        let pattern = MatchPattern::parse("<all_urls>").expect("valid pattern");
        assert!(pattern.matches(&url("https://anything.example/")));
        assert!(pattern.matches(&url("file:///tmp/page.html")));
        assert!(!pattern.matches(&url("about:blank")));
    }

    #[test]
    fn test_file_scheme() {
        let pattern = MatchPattern::parse("file:///tmp/*").expect("valid pattern");
        assert!(pattern.matches(&url("file:///tmp/page.html")));
        assert!(!pattern.matches(&url("file:///etc/passwd")));
    }

    #[test]
    fn test_invalid_patterns() {
        for bad in [
            "example.com",
            "gopher://example.com/*",
            "https://example.com",
            "https:///path",
            "https://ex*ample.com/*",
            "https://*./*",
            "https://example.com:8080/*",
        ] {
            assert!(
                matches!(
                    MatchPattern::parse(bad),
                    Err(MatchPatternError::InvalidPattern { .. })
                ),
                "should reject {bad}"
            );
        }
    }

    #[test]
    fn test_empty_set_matches_nothing() {
        let set = MatchPatternSet::new();
        assert!(set.is_empty());
        assert!(!set.matches_str("https://example.com/x"));
        assert!(set.as_strings().is_empty());
    }

    #[test]
    fn test_set_deduplicates() {
        let set = MatchPatternSet::parse(["*://example.com/*", "*://example.com/*"])
            .expect("valid patterns");
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_set_serializes_as_strings() {
        let set = MatchPatternSet::parse(["*://example.com/*"]).expect("valid patterns");
        let json = serde_json::to_string(&set).expect("serialize set");
        assert_eq!(json, r#"{"patterns":["*://example.com/*"]}"#);
    }
}
