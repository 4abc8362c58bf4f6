//! Mutation records.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use edge_core::Timestamp;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::partitions::SYNC_QUEUE;

/// Unique identifier of a queued mutation.
///
/// Format: `sync_queue_{enqueued_at}_{random}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MutationId(String);

impl MutationId {
    /// Create an ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh ID for a mutation enqueued at `now`.
    pub fn generate(now: Timestamp) -> Self {
        let bytes: [u8; 9] = rand::thread_rng().gen();
        Self(format!("{}_{}_{}", SYNC_QUEUE, now, URL_SAFE_NO_PAD.encode(bytes)))
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MutationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MutationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// What a mutation does on the server.
///
/// Kinds read back from storage that are not recognized are kept as
/// [`MutationKind::Other`] so the drain can count them as failures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MutationKind {
    /// Cart contents changed.
    CartUpdate,
    /// An order was placed.
    OrderCreate,
    /// An analytics event.
    UserAction,
    /// Anything else.
    Other(String),
}

impl MutationKind {
    /// Wire name of the kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::CartUpdate => "cart_update",
            Self::OrderCreate => "order_create",
            Self::UserAction => "user_action",
            Self::Other(kind) => kind,
        }
    }

    /// Whether the kind is one of the known kinds.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<String> for MutationKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "cart_update" => Self::CartUpdate,
            "order_create" => Self::OrderCreate,
            "user_action" => Self::UserAction,
            _ => Self::Other(kind),
        }
    }
}

impl From<&str> for MutationKind {
    fn from(kind: &str) -> Self {
        Self::from(kind.to_string())
    }
}

impl From<MutationKind> for String {
    fn from(kind: MutationKind) -> Self {
        match kind {
            MutationKind::Other(kind) => kind,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A write intent waiting to be replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    /// Unique ID, also the storage key.
    pub id: MutationId,
    /// What the mutation does.
    pub kind: MutationKind,
    /// Request body sent on replay.
    pub payload: serde_json::Value,
    /// When the mutation was enqueued.
    pub enqueued_at: Timestamp,
    /// Failed replay attempts so far.
    pub attempt_count: u32,
    /// When the last failed attempt happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<Timestamp>,
}

impl MutationRecord {
    /// Create a record enqueued at `now`.
    pub fn new(kind: MutationKind, payload: serde_json::Value, now: Timestamp) -> Self {
        Self {
            id: MutationId::generate(now),
            kind,
            payload,
            enqueued_at: now,
            attempt_count: 0,
            last_attempt_at: None,
        }
    }

    /// Note a failed replay attempt.
    pub fn record_failure(&mut self, now: Timestamp) {
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.last_attempt_at = Some(now);
    }

    /// Whether the record has used up its attempts.
    pub fn is_exhausted(&self, max_attempts: u32) -> bool {
        self.attempt_count >= max_attempts
    }
}

/// A mutation dropped after exhausting its attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    /// The dropped record, with its final attempt count.
    pub record: MutationRecord,
    /// When it was dropped.
    pub dropped_at: Timestamp,
    /// The error of the final attempt.
    pub last_error: String,
}
