//! Outbound HTTP requests.

use http::header::{HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use http::{HeaderMap, Method};
use serde::Serialize;
use url::Url;

use crate::FetchError;

/// How the request was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level page navigation.
    Navigate,
    /// Same-origin subresource.
    SameOrigin,
    /// Cross-origin subresource with CORS.
    #[default]
    Cors,
    /// Opaque cross-origin subresource.
    NoCors,
}

/// An owned HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request mode.
    pub mode: RequestMode,
    /// Request body.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Create a new request.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            mode: RequestMode::default(),
            body: None,
        }
    }

    /// Create a GET request from a URL string.
    pub fn get(url: &str) -> Result<Self, FetchError> {
        Ok(Self::new(Method::GET, Url::parse(url)?))
    }

    /// Create a navigation request (a page load).
    pub fn navigate(url: &str) -> Result<Self, FetchError> {
        Ok(Self::get(url)?
            .with_mode(RequestMode::Navigate)
            .with_header(ACCEPT, HeaderValue::from_static("text/html")))
    }

    /// Create a POST request with a JSON body.
    pub fn post_json<T: Serialize>(url: Url, value: &T) -> Result<Self, FetchError> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new(Method::POST, url)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(body))
    }

    /// Set the request mode.
    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the request body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Whether this is a top-level page navigation.
    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_parses_url() {
        let req = HttpRequest::get("https://shop.example.com/products?page=2").unwrap();
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.url.path(), "/products");
        assert!(!req.is_navigation());
    }

    #[test]
    fn test_get_rejects_relative_url() {
        assert!(matches!(
            HttpRequest::get("/products"),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_navigate_sets_mode_and_accept() {
        let req = HttpRequest::navigate("https://shop.example.com/").unwrap();
        assert!(req.is_navigation());
        assert_eq!(req.headers.get(ACCEPT).unwrap(), "text/html");
    }

    #[test]
    fn test_post_json() {
        let url = Url::parse("https://shop.example.com/api/orders").unwrap();
        let req = HttpRequest::post_json(url, &serde_json::json!({"id": "o1"})).unwrap();

        assert_eq!(req.method, Method::POST);
        assert_eq!(req.headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(req.body.unwrap(), br#"{"id":"o1"}"#.to_vec());
    }
}
