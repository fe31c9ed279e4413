//! Beacon Core - Measurement Protocol tracking client
//!
//! This crate reports usage and event hits to an analytics collection
//! endpoint: tracker configuration and validation, payload construction,
//! GET/POST dispatch through an injectable transport, and asynchronous
//! completion tracking.

pub mod config;
pub mod hit;
pub mod network;
pub mod tracing_setup;
pub mod tracker;
pub mod transport;

// Re-export main types for convenient access
pub use config::{BeaconConfig, NetworkConfig, TrackerConfig};
pub use hit::{Hit, HitType};
pub use network::{
    HitRequest, HttpResponse, NetworkLayer, ProductionNetworkLayer, SimulationNetworkLayer,
};
pub use tracker::{
    DispatchMode, NORMAL_ENDPOINT, PROTOCOL_VERSION, Query, SECURE_ENDPOINT, TrackedEvent, Tracker,
};
pub use transport::{
    Completion, DispatchOutcome, Dispatcher, PendingRequest, Transport, TransportError,
};

/// Errors surfaced to applications embedding the tracker.
///
/// The tracker itself never returns these; they exist for callers (such as
/// the CLI) that want to turn a failed hit or a rejected setting into a hard
/// error.
#[derive(Debug, thiserror::Error)]
pub enum BeaconError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BeaconError {
    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(self, BeaconError::Configuration { .. })
    }
}

pub type Result<T> = std::result::Result<T, BeaconError>;
