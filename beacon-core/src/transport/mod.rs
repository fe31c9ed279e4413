//! Transport capability used by the tracker to send hits.
//!
//! A transport starts a request, hands back an opaque [`PendingRequest`]
//! immediately, and later publishes a [`Completion`] for it to every
//! subscriber. The tracker never waits on a request directly.

pub mod dispatcher;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

pub use dispatcher::Dispatcher;

use crate::network::HitRequest;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque handle for a request that has been handed to a transport.
///
/// Handles are unique for the lifetime of the process, so handles issued by
/// different transports never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingRequest(u64);

impl PendingRequest {
    /// Allocates a fresh, process-unique handle.
    pub fn next() -> Self {
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw identifier, for logging.
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PendingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Transport-level failure of a single request.
///
/// Cloneable so one failure can be delivered to several subscribers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Failed to connect to {url}")]
    ConnectionFailed { url: String },

    #[error("{url} responded with HTTP status {status}")]
    Status { url: String, status: u16 },

    #[error("Request failed: {reason}")]
    Request { reason: String },
}

impl TransportError {
    /// Maps a reqwest failure onto the transport taxonomy.
    pub fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
            }
        } else if error.is_connect() {
            TransportError::ConnectionFailed {
                url: url.to_string(),
            }
        } else {
            TransportError::Request {
                reason: error.to_string(),
            }
        }
    }
}

/// Result of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The collector answered with a 2xx status.
    Delivered { status: u16 },
    /// The request failed at the transport level.
    Failed(TransportError),
}

impl DispatchOutcome {
    /// Returns true if the hit reached the collector.
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered { .. })
    }
}

/// Completion notification published by a transport.
#[derive(Debug, Clone)]
pub struct Completion {
    pub request: PendingRequest,
    pub outcome: DispatchOutcome,
}

/// Send-and-notify capability the tracker dispatches through.
///
/// `get` and `post` must not block: they start the request and return its
/// handle right away. Every started request eventually yields exactly one
/// [`Completion`] on every channel returned by `subscribe`, unless the
/// transport is shut down first. Completions are never dropped for a
/// subscriber that is slow to receive.
pub trait Transport: Send + Sync {
    /// Starts a GET request; all hit parameters are in `request.url`.
    fn get(&self, request: HitRequest) -> PendingRequest;

    /// Starts a POST request carrying `body`.
    fn post(&self, request: HitRequest, body: Vec<u8>) -> PendingRequest;

    /// Subscribes to completion notifications of requests started from now on.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<Completion>;

    /// Frees whatever the transport still holds for a completed request.
    fn release(&self, _request: PendingRequest) {}

    /// Short name for log output.
    fn name(&self) -> &str;
}
