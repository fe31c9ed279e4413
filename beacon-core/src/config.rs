//! Centralized configuration for Beacon.
//!
//! Tracker settings are validated on every write; network tunables feed the
//! production transport.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use url::Url;

use crate::tracker::{DispatchMode, NORMAL_ENDPOINT};

/// Client ID reported when the application does not set one.
pub const DEFAULT_CLIENT_ID: &str = "beacon";

/// User agent sent when the application does not set one.
pub const DEFAULT_USER_AGENT: &str = "beacon/0.1.0";

static TRACKING_ID_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^(UA|YT|MO)-\d+-\d+$").ok());

/// Central configuration for all Beacon components.
///
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct BeaconConfig {
    pub tracker: TrackerConfig,
    pub network: NetworkConfig,
}

/// Per-tracker settings.
///
/// Setters never fail: input that does not validate is ignored and the
/// previous value stays, with the exception of [`set_tracking_id`].
///
/// [`set_tracking_id`]: TrackerConfig::set_tracking_id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    tracking_id: String,
    client_id: String,
    user_agent: String,
    endpoint: Url,
    operation: DispatchMode,
    cache_busting: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tracking_id: String::new(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            endpoint: default_endpoint(),
            operation: DispatchMode::Post,
            cache_busting: false,
        }
    }
}

fn default_endpoint() -> Url {
    match Url::parse(NORMAL_ENDPOINT) {
        Ok(url) => url,
        Err(_) => unreachable!("NORMAL_ENDPOINT is a valid absolute URL"),
    }
}

impl TrackerConfig {
    /// Returns true if `tracking_id` has the `UA|YT|MO-<digits>-<digits>` form.
    ///
    /// The prefix is matched case-insensitively, digits may be any Unicode
    /// decimal digit, and the whole string must match.
    pub fn is_valid_tracking_id(tracking_id: &str) -> bool {
        TRACKING_ID_PATTERN
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(tracking_id))
    }

    /// Parses `endpoint` as an absolute http(s) URL.
    pub fn parse_endpoint(endpoint: &str) -> Option<Url> {
        Url::parse(endpoint)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
    }

    /// Generates a random UUIDv4 client ID, the format collectors recommend.
    pub fn generate_client_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Sets the tracking ID.
    ///
    /// Unlike the other setters this clears the current value first, so an
    /// invalid ID leaves the tracker with no tracking ID at all rather than
    /// the previous one. Callers rely on this behavior; confirm with product
    /// owners before changing it.
    pub fn set_tracking_id(&mut self, tracking_id: &str) {
        self.tracking_id.clear();
        if Self::is_valid_tracking_id(tracking_id) {
            self.tracking_id = tracking_id.to_string();
        } else {
            tracing::debug!("Rejected tracking ID {:?}", tracking_id);
        }
    }

    pub fn tracking_id(&self) -> &str {
        &self.tracking_id
    }

    /// Sets the client ID. Any non-empty text is accepted.
    pub fn set_client_id(&mut self, client_id: &str) {
        if client_id.is_empty() {
            tracing::debug!("Ignoring empty client ID");
            return;
        }
        self.client_id = client_id.to_string();
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Sets the `User-Agent` header value. Empty strings are ignored.
    pub fn set_user_agent(&mut self, user_agent: &str) {
        if user_agent.is_empty() {
            tracing::debug!("Ignoring empty user agent");
            return;
        }
        self.user_agent = user_agent.to_string();
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Sets the collection endpoint. Anything but an absolute http(s) URL is
    /// ignored.
    pub fn set_endpoint(&mut self, endpoint: &str) {
        match Self::parse_endpoint(endpoint) {
            Some(url) => self.endpoint = url,
            None => tracing::debug!("Rejected endpoint {:?}", endpoint),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Selects GET or POST dispatch. Other methods are ignored.
    pub fn set_operation(&mut self, method: &reqwest::Method) {
        match DispatchMode::from_method(method) {
            Some(mode) => self.operation = mode,
            None => tracing::debug!("Ignoring unsupported dispatch method {}", method),
        }
    }

    pub fn operation(&self) -> DispatchMode {
        self.operation
    }

    /// Enables the random `z` parameter on GET hits.
    pub fn set_cache_busting(&mut self, enabled: bool) {
        self.cache_busting = enabled;
    }

    pub fn cache_busting(&self) -> bool {
        self.cache_busting
    }
}

/// Production transport configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Per-request timeout applied by the HTTP client
    pub request_timeout: Duration,
    /// Maximum redirects followed per request
    pub max_redirects: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_redirects: 3,
        }
    }
}

impl BeaconConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults. Values go through the validating
    /// setters, so invalid overrides are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(tracking_id) = lookup("BEACON_TRACKING_ID") {
            config.tracker.set_tracking_id(&tracking_id);
        }

        if let Some(client_id) = lookup("BEACON_CLIENT_ID") {
            config.tracker.set_client_id(&client_id);
        }

        if let Some(user_agent) = lookup("BEACON_USER_AGENT") {
            config.tracker.set_user_agent(&user_agent);
        }

        if let Some(endpoint) = lookup("BEACON_ENDPOINT") {
            config.tracker.set_endpoint(&endpoint);
        }

        if let Some(operation) = lookup("BEACON_OPERATION") {
            if let Ok(method) = reqwest::Method::from_bytes(operation.to_uppercase().as_bytes()) {
                config.tracker.set_operation(&method);
            }
        }

        if let Some(enabled) = lookup("BEACON_CACHE_BUSTING") {
            config.tracker.set_cache_busting(enabled.parse().unwrap_or(false));
        }

        if let Some(timeout) = lookup("BEACON_REQUEST_TIMEOUT") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.network.request_timeout = Duration::from_secs(seconds);
            }
        }

        config
    }
}

#[cfg(test)]
mod config_tests {
    use std::collections::HashMap;

    use reqwest::Method;

    use super::*;
    use crate::tracker::SECURE_ENDPOINT;

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.tracking_id(), "");
        assert_eq!(config.client_id(), DEFAULT_CLIENT_ID);
        assert_eq!(config.user_agent(), DEFAULT_USER_AGENT);
        assert_eq!(config.endpoint().as_str(), NORMAL_ENDPOINT);
        assert_eq!(config.operation(), DispatchMode::Post);
        assert!(!config.cache_busting());
    }

    #[test]
    fn test_invalid_tracking_ids_leave_field_empty() {
        let mut config = TrackerConfig::default();
        for invalid in [
            "WT-1234-56",
            "-1234-56",
            "UA--12",
            "YT-1-",
            "-123-",
            "--1234",
            "UA-1234-56 ",
            "xUA-1-1",
            "UA-1a-1",
            "",
        ] {
            config.set_tracking_id(invalid);
            assert_eq!(config.tracking_id(), "", "accepted {invalid:?}");
        }
    }

    #[test]
    fn test_valid_tracking_ids_are_stored() {
        let mut config = TrackerConfig::default();
        for valid in [
            "UA-1234-12",
            "YT-1234-12",
            "MO-1-1",
            "UA-1234-1",
            "ua-1-1",
            "UA-١٢-٣",
            "mo-४२-७",
        ] {
            config.set_tracking_id(valid);
            assert_eq!(config.tracking_id(), valid);
        }
    }

    #[test]
    fn test_invalid_tracking_id_clears_previous_value() {
        let mut config = TrackerConfig::default();
        config.set_tracking_id("UA-1234-1");
        config.set_tracking_id("not-a-tracking-id");
        assert_eq!(config.tracking_id(), "");
    }

    #[test]
    fn test_empty_client_id_and_user_agent_are_ignored() {
        let mut config = TrackerConfig::default();
        config.set_client_id("35009a79-1a05-49d7-b876-2b884d0f825b");
        config.set_client_id("");
        assert_eq!(config.client_id(), "35009a79-1a05-49d7-b876-2b884d0f825b");

        config.set_user_agent("MyApp/2.0");
        config.set_user_agent("");
        assert_eq!(config.user_agent(), "MyApp/2.0");
    }

    #[test]
    fn test_client_id_accepts_arbitrary_text() {
        let mut config = TrackerConfig::default();
        config.set_client_id("not a uuid at all");
        assert_eq!(config.client_id(), "not a uuid at all");
    }

    #[test]
    fn test_invalid_endpoint_is_ignored() {
        let mut config = TrackerConfig::default();
        config.set_endpoint(SECURE_ENDPOINT);
        assert_eq!(config.endpoint().as_str(), SECURE_ENDPOINT);

        for invalid in ["", "not a url", "collect", "ftp://example.com/collect", "http://"] {
            config.set_endpoint(invalid);
            assert_eq!(config.endpoint().as_str(), SECURE_ENDPOINT, "accepted {invalid:?}");
        }
    }

    #[test]
    fn test_unsupported_operation_is_ignored() {
        let mut config = TrackerConfig::default();
        config.set_operation(&Method::GET);
        assert_eq!(config.operation(), DispatchMode::Get);

        config.set_operation(&Method::PUT);
        config.set_operation(&Method::DELETE);
        config.set_operation(&Method::HEAD);
        assert_eq!(config.operation(), DispatchMode::Get);

        config.set_operation(&Method::POST);
        assert_eq!(config.operation(), DispatchMode::Post);
    }

    #[test]
    fn test_generated_client_ids_are_uuids() {
        let first = TrackerConfig::generate_client_id();
        let second = TrackerConfig::generate_client_id();
        assert_ne!(first, second);
        assert!(uuid::Uuid::parse_str(&first).is_ok());
    }

    #[test]
    fn test_from_lookup_applies_valid_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("BEACON_TRACKING_ID", "UA-42-7"),
            ("BEACON_CLIENT_ID", "device-1"),
            ("BEACON_ENDPOINT", SECURE_ENDPOINT),
            ("BEACON_OPERATION", "get"),
            ("BEACON_CACHE_BUSTING", "true"),
            ("BEACON_REQUEST_TIMEOUT", "5"),
        ]);
        let config = BeaconConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.tracker.tracking_id(), "UA-42-7");
        assert_eq!(config.tracker.client_id(), "device-1");
        assert_eq!(config.tracker.endpoint().as_str(), SECURE_ENDPOINT);
        assert_eq!(config.tracker.operation(), DispatchMode::Get);
        assert!(config.tracker.cache_busting());
        assert_eq!(config.network.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_from_lookup_ignores_invalid_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("BEACON_ENDPOINT", "definitely not a url"),
            ("BEACON_OPERATION", "patch"),
            ("BEACON_REQUEST_TIMEOUT", "soon"),
        ]);
        let config = BeaconConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.tracker.endpoint().as_str(), NORMAL_ENDPOINT);
        assert_eq!(config.tracker.operation(), DispatchMode::Post);
        assert_eq!(config.network.request_timeout, Duration::from_secs(30));
    }
}
