//! Replay of mutations against the server.

use std::sync::Arc;

use async_trait::async_trait;
use edge_data::{FetchError, Fetcher, HttpRequest};
use http::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ReplayError;
use crate::record::{MutationKind, MutationRecord};

/// Header carrying the mutation ID so the server can drop duplicates.
pub const MUTATION_ID_HEADER: &str = "x-mutation-id";

/// Sends one mutation to the server.
///
/// `Ok` means the server acknowledged the mutation with a 2xx status.
#[async_trait]
pub trait ReplayTransport: Send + Sync {
    /// Replay a mutation.
    async fn replay(&self, record: &MutationRecord) -> Result<(), ReplayError>;
}

/// Endpoint paths per mutation kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayEndpoints {
    /// Endpoint for `cart_update`.
    pub cart_update: String,
    /// Endpoint for `order_create`.
    pub order_create: String,
    /// Endpoint for `user_action`.
    pub user_action: String,
}

impl Default for ReplayEndpoints {
    fn default() -> Self {
        Self {
            cart_update: "/api/cart/sync".to_string(),
            order_create: "/api/orders".to_string(),
            user_action: "/api/analytics/events".to_string(),
        }
    }
}

impl ReplayEndpoints {
    /// Endpoint for a kind, `None` for unknown kinds.
    pub fn for_kind(&self, kind: &MutationKind) -> Option<&str> {
        match kind {
            MutationKind::CartUpdate => Some(&self.cart_update),
            MutationKind::OrderCreate => Some(&self.order_create),
            MutationKind::UserAction => Some(&self.user_action),
            MutationKind::Other(_) => None,
        }
    }

    /// All `(kind, endpoint)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (MutationKind, &str)> {
        [
            (MutationKind::CartUpdate, self.cart_update.as_str()),
            (MutationKind::OrderCreate, self.order_create.as_str()),
            (MutationKind::UserAction, self.user_action.as_str()),
        ]
        .into_iter()
    }
}

/// Replays mutations as JSON POSTs.
pub struct HttpReplayTransport {
    fetcher: Arc<dyn Fetcher>,
    base_url: Url,
    endpoints: ReplayEndpoints,
}

impl HttpReplayTransport {
    /// Create a new transport.
    pub fn new(fetcher: Arc<dyn Fetcher>, base_url: Url, endpoints: ReplayEndpoints) -> Self {
        Self {
            fetcher,
            base_url,
            endpoints,
        }
    }

    /// Build the request for a record.
    pub fn request_for(&self, record: &MutationRecord) -> Result<HttpRequest, ReplayError> {
        let path = self
            .endpoints
            .for_kind(&record.kind)
            .ok_or_else(|| ReplayError::UnknownKind(record.kind.to_string()))?;
        let url = self.base_url.join(path).map_err(FetchError::from)?;

        let mut request = HttpRequest::post_json(url, &record.payload)?;
        if let Ok(id) = HeaderValue::from_str(record.id.as_str()) {
            request = request.with_header(HeaderName::from_static(MUTATION_ID_HEADER), id);
        }
        Ok(request)
    }
}

#[async_trait]
impl ReplayTransport for HttpReplayTransport {
    async fn replay(&self, record: &MutationRecord) -> Result<(), ReplayError> {
        let request = self.request_for(record)?;
        let response = self.fetcher.fetch(&request).await?;
        response.error_for_status(request.url.as_str())?;
        Ok(())
    }
}
