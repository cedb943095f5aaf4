//! Timed HTTP probes against the data-access services.
//!
//! [`ProbeClient`] performs exactly one request per call and reports a
//! [`ProbeResult`] whether or not the service answered with a success status.
//! The narrow API clients (`bond`, `gen3`, `martha`) build on it.

pub mod bond;
pub mod drs;
pub mod gen3;
pub mod http;
pub mod martha;

pub use self::bond::BondClient;
pub use self::gen3::Gen3Client;
pub use self::http::{bearer_headers, json_headers, ProbeClient};
pub use self::martha::MarthaClient;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Status code recorded when no HTTP response was received.
pub const TRANSPORT_FAILURE_STATUS: u16 = 0;

/// Timing and outcome of a single HTTP call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub start_time: DateTime<Utc>,
    /// Seconds, rounded to the millisecond.
    pub duration: f64,
    pub status_code: u16,
    pub reason: String,
}

impl ProbeResult {
    pub fn new(start_time: DateTime<Utc>, elapsed: std::time::Duration, status_code: u16, reason: impl Into<String>) -> Self {
        Self {
            start_time,
            duration: round_millis(elapsed.as_secs_f64()),
            status_code,
            reason: reason.into(),
        }
    }

    /// Sentinel result for a call that never produced a response.
    pub fn transport_failure(start_time: DateTime<Utc>, elapsed: std::time::Duration, reason: impl Into<String>) -> Self {
        Self::new(start_time, elapsed, TRANSPORT_FAILURE_STATUS, reason)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

fn round_millis(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        result: ProbeResult,
        #[source]
        source: reqwest::Error,
    },

    #[error("response from {url} is not valid JSON: {source}")]
    Decode {
        url: String,
        result: ProbeResult,
        #[source]
        source: serde_json::Error,
    },

    #[error("response is missing field '{field}'")]
    MissingField { field: &'static str },

    #[error("not a DRS URI: {uri}")]
    InvalidDrsUri { uri: String },

    #[error("token cannot be used in an authorization header")]
    InvalidToken,

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl ProbeError {
    /// The result to record for the failed hop, when the failure happened
    /// after a request was attempted.
    pub fn probe_result(&self) -> Option<&ProbeResult> {
        match self {
            ProbeError::Transport { result, .. } | ProbeError::Decode { result, .. } => Some(result),
            _ => None,
        }
    }
}
