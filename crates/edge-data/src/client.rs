//! Fetch seam and `reqwest`-backed client.

use async_trait::async_trait;

use crate::request::HttpRequest;
use crate::response::HttpResponse;
use crate::retry::RetryPolicy;
use crate::timeout::TimeoutConfig;
use crate::FetchError;

/// Anything that can perform an HTTP request.
///
/// A response with a non-2xx status is still `Ok`; only transport failures
/// (connection, timeout, malformed request) are errors.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the request.
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError>;
}

/// Fetch policy combining timeout and retry configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FetchPolicy {
    /// Timeout configuration.
    #[serde(default)]
    pub timeout: TimeoutConfig,
    /// Retry policy for idempotent requests.
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl FetchPolicy {
    /// Create a new fetch policy.
    pub fn new(timeout: TimeoutConfig, retry: RetryPolicy) -> Self {
        Self { timeout, retry }
    }
}

/// Platform fetch client.
///
/// Applies timeouts to every request and retries idempotent (GET/HEAD)
/// requests according to the retry policy. Non-idempotent requests are sent
/// exactly once; their callers own retry decisions.
#[derive(Debug, Clone)]
pub struct FetchClient {
    http: reqwest::Client,
    policy: FetchPolicy,
}

impl FetchClient {
    /// Create a client with the default policy.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_policy(FetchPolicy::default())
    }

    /// Create a client with an explicit policy.
    pub fn with_policy(policy: FetchPolicy) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .connect_timeout(policy.timeout.connect())
            .read_timeout(policy.timeout.response())
            .timeout(policy.timeout.total())
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;

        Ok(Self { http, policy })
    }

    /// The active policy.
    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    async fn send_once(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError> {
        let mut builder = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());

        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let resp = builder.send().await.map_err(|e| self.map_error(e))?;
        let status = resp.status();
        let headers = resp.headers().clone();
        // The body is read fully before returning so callers never see a
        // partially received response.
        let body = resp.bytes().await.map_err(|e| self.map_error(e))?;

        Ok(HttpResponse::new(status, headers, body.to_vec()))
    }

    fn map_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.policy.timeout.total())
        } else if e.is_connect() {
            FetchError::Connection(e.to_string())
        } else {
            FetchError::Request(e.to_string())
        }
    }
}

#[async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError> {
        let idempotent = request.method == http::Method::GET || request.method == http::Method::HEAD;
        let retry = &self.policy.retry;
        let mut attempt = 0;

        loop {
            let result = self.send_once(request).await;

            let retry_now = idempotent
                && match &result {
                    Ok(resp) => retry.should_retry_status(resp.status.as_u16(), attempt),
                    Err(e) => retry.should_retry_error(e, attempt),
                };

            if !retry_now {
                return result;
            }

            let delay = retry.backoff.delay_for_attempt(attempt);
            tracing::debug!(url = %request.url, attempt, ?delay, "retrying fetch");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_with_default_policy() {
        let client = FetchClient::new().unwrap();
        assert_eq!(client.policy().retry.max_attempts, 0);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let client = FetchClient::with_policy(FetchPolicy::new(
            TimeoutConfig::from_total(std::time::Duration::from_secs(2)),
            RetryPolicy::none(),
        ))
        .unwrap();

        // Reserve a free port, then release it so nothing is listening.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let request = HttpRequest::get(&format!("http://127.0.0.1:{}/", port)).unwrap();
        let err = client.fetch(&request).await.unwrap_err();
        assert!(err.is_network());
    }
}
