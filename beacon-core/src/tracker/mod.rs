//! Measurement Protocol tracker.
//!
//! Builds hit payloads, dispatches them as GET or POST through a
//! [`Transport`](crate::transport::Transport), and reports every finished
//! dispatch attempt to subscribers as a [`TrackedEvent`].

pub mod client;
mod completion;
pub mod query;

use std::fmt;
use std::str::FromStr;

pub use client::Tracker;
pub use query::Query;

use crate::transport::{DispatchOutcome, PendingRequest};

/// Plaintext collection endpoint, the default.
pub const NORMAL_ENDPOINT: &str = "http://www.google-analytics.com/collect";

/// TLS collection endpoint.
pub const SECURE_ENDPOINT: &str = "https://ssl.google-analytics.com/collect";

/// Value of the `v` parameter on every hit.
pub const PROTOCOL_VERSION: &str = "1";

/// Collector limit for POST bodies, in bytes.
pub const MAX_POST_PAYLOAD_BYTES: usize = 8192;

/// Collector limit for GET URLs, in bytes.
pub const MAX_GET_URL_BYTES: usize = 2000;

/// Upper bound (exclusive) of the cache-busting `z` parameter.
pub const CACHE_BUSTER_RANGE: u32 = 100_000_000;

pub(crate) const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// How hits travel to the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchMode {
    /// Parameters in the URL query string
    Get,
    /// Parameters in a form-encoded request body
    Post,
}

impl DispatchMode {
    /// Maps an HTTP method onto a dispatch mode; only GET and POST qualify.
    pub fn from_method(method: &reqwest::Method) -> Option<Self> {
        if *method == reqwest::Method::GET {
            Some(DispatchMode::Get)
        } else if *method == reqwest::Method::POST {
            Some(DispatchMode::Post)
        } else {
            None
        }
    }

    pub fn as_method(self) -> reqwest::Method {
        match self {
            DispatchMode::Get => reqwest::Method::GET,
            DispatchMode::Post => reqwest::Method::POST,
        }
    }
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchMode::Get => write!(f, "GET"),
            DispatchMode::Post => write!(f, "POST"),
        }
    }
}

impl FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "get" => Ok(DispatchMode::Get),
            "post" => Ok(DispatchMode::Post),
            _ => Err(format!("Invalid dispatch mode: {s}")),
        }
    }
}

/// Emitted once per finished dispatch attempt, successful or not.
#[derive(Debug, Clone)]
pub struct TrackedEvent {
    pub request: PendingRequest,
    pub outcome: DispatchOutcome,
}
