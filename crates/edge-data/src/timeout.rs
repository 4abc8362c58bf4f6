//! Timeout configuration for fetch operations.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timeout configuration for a fetch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Connection timeout in milliseconds.
    pub connect_ms: u64,
    /// Maximum idle time between body chunks in milliseconds.
    pub response_ms: u64,
    /// Total operation timeout in milliseconds.
    pub total_ms: u64,
}

impl TimeoutConfig {
    /// Create a new timeout configuration.
    pub fn new(connect: Duration, response: Duration, total: Duration) -> Self {
        Self {
            connect_ms: connect.as_millis() as u64,
            response_ms: response.as_millis() as u64,
            total_ms: total.as_millis() as u64,
        }
    }

    /// Create from a single total timeout.
    pub fn from_total(total: Duration) -> Self {
        let total_ms = total.as_millis() as u64;
        Self {
            connect_ms: total_ms / 4,
            response_ms: total_ms / 2,
            total_ms,
        }
    }

    /// Connection timeout.
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    /// Read timeout.
    pub fn response(&self) -> Duration {
        Duration::from_millis(self.response_ms)
    }

    /// Total timeout.
    pub fn total(&self) -> Duration {
        Duration::from_millis(self.total_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 3_000,
            response_ms: 10_000,
            total_ms: 15_000,
        }
    }
}
