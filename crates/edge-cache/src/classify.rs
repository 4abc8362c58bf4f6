//! Request classification against the rule table.

use edge_data::HttpRequest;
use http::Method;
use serde::Serialize;
use url::{Origin, Url};

use crate::config::CacheConfig;
use crate::pattern::glob_match;
use crate::rule::CacheRule;

/// External hosts whose requests the proxy handles.
#[derive(Debug, Clone, Default)]
pub struct HostAllowList {
    patterns: Vec<String>,
}

impl HostAllowList {
    /// Create a new allowlist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow a host or a `*.` pattern.
    pub fn allow(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into().to_ascii_lowercase());
        self
    }

    /// Allow several hosts.
    pub fn allow_all<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns
            .extend(patterns.into_iter().map(|p| p.into().to_ascii_lowercase()));
        self
    }

    /// Check if a host is allowed.
    pub fn is_allowed(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.patterns.iter().any(|p| glob_match(p, &host))
    }

    /// Configured patterns.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// Why a request is not handled by a cache rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BypassReason {
    /// Only GET requests are cached.
    Method,
    /// Cross-origin host not on the allowlist.
    Origin,
}

impl std::fmt::Display for BypassReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Method => write!(f, "non-GET method"),
            Self::Origin => write!(f, "foreign origin"),
        }
    }
}

/// Result of classifying a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification<'a> {
    /// Pass straight to the network.
    Bypass(BypassReason),
    /// Handle with a rule.
    Rule {
        /// The rule to apply.
        rule: &'a CacheRule,
        /// Whether the rule is the fallback rule.
        fallback: bool,
    },
}

impl Classification<'_> {
    /// The matched rule, if any.
    pub fn rule(&self) -> Option<&CacheRule> {
        match self {
            Self::Rule { rule, .. } => Some(rule),
            Self::Bypass(_) => None,
        }
    }
}

/// Classifies requests against an ordered rule table.
#[derive(Debug, Clone)]
pub struct RequestClassifier {
    origin: Origin,
    allow: HostAllowList,
    rules: Vec<CacheRule>,
    fallback: CacheRule,
}

impl RequestClassifier {
    /// Create a classifier.
    pub fn new(origin: &Url, allow: HostAllowList, rules: Vec<CacheRule>, fallback: CacheRule) -> Self {
        Self {
            origin: origin.origin(),
            allow,
            rules,
            fallback,
        }
    }

    /// Build from proxy configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            &config.origin,
            HostAllowList::new().allow_all(config.allowed_hosts.iter().cloned()),
            config.rules.clone(),
            config.fallback_rule.clone(),
        )
    }

    /// Whether a URL is served by the proxy's origin or an allowed host.
    pub fn is_handled_origin(&self, url: &Url) -> bool {
        if url.origin() == self.origin {
            return true;
        }
        matches!(url.scheme(), "http" | "https")
            && url.host_str().is_some_and(|host| self.allow.is_allowed(host))
    }

    /// Classify a request.
    ///
    /// Non-GET requests and foreign origins are bypassed; otherwise the first
    /// matching rule wins, falling back to the default rule.
    pub fn classify(&self, request: &HttpRequest) -> Classification<'_> {
        if request.method != Method::GET {
            return Classification::Bypass(BypassReason::Method);
        }
        if !self.is_handled_origin(&request.url) {
            return Classification::Bypass(BypassReason::Origin);
        }

        match self.rules.iter().find(|r| r.pattern.matches_request(request)) {
            Some(rule) => Classification::Rule {
                rule,
                fallback: false,
            },
            None => Classification::Rule {
                rule: &self.fallback,
                fallback: true,
            },
        }
    }

    /// The rule table.
    pub fn rules(&self) -> &[CacheRule] {
        &self.rules
    }
}
