//! URL matchers used by cache rules.

use edge_data::HttpRequest;
use serde::{Deserialize, Serialize};
use url::Url;

/// A URL matcher.
///
/// Serialized externally tagged so rule tables read naturally in TOML:
///
/// ```toml
/// pattern = { path_prefix = "/_next/static/" }
/// pattern = { extension = ["woff", "woff2"] }
/// pattern = { any_of = [{ extension = ["png"] }, { host = "*.cloudinary.com" }] }
/// pattern = "navigation"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlPattern {
    /// Path starts with the prefix.
    PathPrefix(String),
    /// Path matches a glob (`*` matches any run of characters).
    Path(String),
    /// Last path segment ends with one of the extensions.
    Extension(Vec<String>),
    /// Host equals or glob-matches (`*.example.com`).
    Host(String),
    /// Any nested matcher matches.
    AnyOf(Vec<UrlPattern>),
    /// Top-level page navigations (`mode = navigate`).
    Navigation,
}

impl UrlPattern {
    /// Create a path prefix matcher.
    pub fn path_prefix(prefix: impl Into<String>) -> Self {
        Self::PathPrefix(prefix.into())
    }

    /// Create a path glob matcher.
    pub fn path(glob: impl Into<String>) -> Self {
        Self::Path(glob.into())
    }

    /// Create an extension matcher.
    pub fn extensions(exts: &[&str]) -> Self {
        Self::Extension(exts.iter().map(|e| e.to_string()).collect())
    }

    /// Create a host matcher.
    pub fn host(pattern: impl Into<String>) -> Self {
        Self::Host(pattern.into())
    }

    /// Check whether a request matches.
    pub fn matches_request(&self, request: &HttpRequest) -> bool {
        match self {
            Self::Navigation => request.is_navigation(),
            Self::AnyOf(patterns) => patterns.iter().any(|p| p.matches_request(request)),
            _ => self.matches(&request.url),
        }
    }

    /// Check whether the URL matches.
    ///
    /// [`UrlPattern::Navigation`] depends on the request mode and never
    /// matches a bare URL.
    pub fn matches(&self, url: &Url) -> bool {
        match self {
            Self::PathPrefix(prefix) => url.path().starts_with(prefix.as_str()),
            Self::Path(glob) => glob_match(glob, url.path()),
            Self::Extension(exts) => match extension_of(url.path()) {
                Some(ext) => exts
                    .iter()
                    .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext)),
                None => false,
            },
            Self::Host(pattern) => url
                .host_str()
                .is_some_and(|host| glob_match(&pattern.to_ascii_lowercase(), host)),
            Self::AnyOf(patterns) => patterns.iter().any(|p| p.matches(url)),
            Self::Navigation => false,
        }
    }

    /// Whether this matcher accepts every URL, making later rules unreachable.
    pub fn is_catch_all(&self) -> bool {
        match self {
            Self::PathPrefix(prefix) => prefix.is_empty() || prefix == "/",
            Self::Path(glob) => glob.chars().all(|c| c == '*') || glob == "/*",
            Self::Host(pattern) => pattern.chars().all(|c| c == '*'),
            Self::Extension(_) | Self::Navigation => false,
            Self::AnyOf(patterns) => patterns.iter().any(Self::is_catch_all),
        }
    }
}

fn extension_of(path: &str) -> Option<&str> {
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

/// Glob match where `*` matches any (possibly empty) run of characters.
///
/// Without a wildcard the pattern must equal the input.
pub fn glob_match(pattern: &str, input: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == input;
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let (first, rest) = match parts.split_first() {
        Some(split) => split,
        None => return false,
    };
    let (last, middle) = match rest.split_last() {
        Some(split) => split,
        None => return false,
    };

    if !input.starts_with(first) {
        return false;
    }
    let mut remaining = &input[first.len()..];

    for part in middle {
        if part.is_empty() {
            continue;
        }
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }

    remaining.len() >= last.len() && remaining.ends_with(last)
}
