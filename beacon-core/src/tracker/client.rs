//! Tracker: hit construction, dispatch policy and transport ownership

use std::sync::Arc;

use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use super::completion::{CompletionState, spawn_completion_task};
use super::{
    CACHE_BUSTER_RANGE, DispatchMode, FORM_CONTENT_TYPE, MAX_GET_URL_BYTES,
    MAX_POST_PAYLOAD_BYTES, PROTOCOL_VERSION, Query, TrackedEvent,
};
use crate::config::{BeaconConfig, NetworkConfig, TrackerConfig};
use crate::network::{HitRequest, ProductionNetworkLayer};
use crate::transport::{Dispatcher, PendingRequest, Transport};

/// Transport the tracker dispatches through.
enum TransportSlot {
    /// Created by the tracker; shut down when replaced
    Owned(Arc<Dispatcher<ProductionNetworkLayer>>),
    /// Supplied by the application; left running when replaced
    Shared(Arc<dyn Transport>),
}

impl TransportSlot {
    fn transport(&self) -> Arc<dyn Transport> {
        match self {
            TransportSlot::Owned(dispatcher) => Arc::clone(dispatcher) as Arc<dyn Transport>,
            TransportSlot::Shared(transport) => Arc::clone(transport),
        }
    }
}

/// Measurement Protocol tracker.
///
/// [`track`](Tracker::track) returns as soon as the transport has accepted
/// the hit. When the request finishes, successfully or not, a
/// [`TrackedEvent`] is delivered to every [`subscribe`](Tracker::subscribe)r.
/// Failures are logged and reported only through that event; no tracker
/// operation returns an error.
///
/// Must be created and used inside a Tokio runtime.
///
/// # Examples
/// ```rust,no_run
/// # #[tokio::main]
/// # async fn main() {
/// use beacon_core::{Hit, Tracker};
///
/// let mut tracker = Tracker::new();
/// tracker.set_tracking_id("UA-12345-1");
///
/// let mut events = tracker.subscribe();
/// tracker.track(Hit::event("video", "play").label("intro"));
/// let event = events.recv().await.unwrap();
/// println!("hit finished: {:?}", event.outcome);
/// # }
/// ```
pub struct Tracker {
    config: TrackerConfig,
    transport: TransportSlot,
    state: Arc<CompletionState>,
    completion_task: JoinHandle<()>,
}

impl Tracker {
    /// Creates a tracker with default settings and its own HTTP transport.
    pub fn new() -> Self {
        Self::from_config(&BeaconConfig::default())
    }

    /// Creates a tracker with its own HTTP transport built from
    /// `config.network`.
    pub fn from_config(config: &BeaconConfig) -> Self {
        let dispatcher = Arc::new(Self::default_transport(&config.network));
        Self::with_slot(config.tracker.clone(), TransportSlot::Owned(dispatcher))
    }

    /// Creates a tracker that dispatches through an application-supplied
    /// transport.
    pub fn with_transport(config: TrackerConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_slot(config, TransportSlot::Shared(transport))
    }

    fn default_transport(network: &NetworkConfig) -> Dispatcher<ProductionNetworkLayer> {
        Dispatcher::new(Arc::new(ProductionNetworkLayer::new(network)))
    }

    fn with_slot(config: TrackerConfig, transport: TransportSlot) -> Self {
        let state = Arc::new(CompletionState::default());
        let completion_task = spawn_completion_task(transport.transport(), Arc::clone(&state));

        Self {
            config,
            transport,
            state,
            completion_task,
        }
    }

    /// Replaces the transport.
    ///
    /// `None` is ignored so the tracker always has a transport. A transport
    /// the tracker created itself is shut down first. Requests still in
    /// flight on the previous transport are forgotten and produce no
    /// [`TrackedEvent`].
    pub fn set_transport(&mut self, transport: Option<Arc<dyn Transport>>) {
        let Some(transport) = transport else {
            tracing::debug!("Ignoring empty transport");
            return;
        };

        self.completion_task.abort();
        if let TransportSlot::Owned(dispatcher) = &self.transport {
            dispatcher.shutdown();
        }

        let abandoned = {
            let mut in_flight = self.state.in_flight.lock();
            let count = in_flight.len();
            in_flight.clear();
            count
        };
        if abandoned > 0 {
            tracing::debug!(
                "Abandoned {} in-flight hits on {} transport",
                abandoned,
                self.transport.transport().name()
            );
        }

        self.completion_task =
            spawn_completion_task(Arc::clone(&transport), Arc::clone(&self.state));
        self.transport = TransportSlot::Shared(transport);
    }

    /// Returns the transport hits are currently dispatched through.
    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.transport()
    }

    /// Returns true while the tracker uses the transport it created itself.
    pub fn owns_transport(&self) -> bool {
        matches!(self.transport, TransportSlot::Owned(_))
    }

    /// Subscribes to [`TrackedEvent`]s for hits dispatched by this tracker.
    ///
    /// Events queue up until received; drop the receiver to unsubscribe.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<TrackedEvent> {
        self.state.subscribe()
    }

    /// Returns the number of dispatched hits that have not completed yet.
    pub fn pending_count(&self) -> usize {
        self.state.in_flight.lock().len()
    }

    /// Returns true if `request` was dispatched by this tracker and has not
    /// completed yet.
    pub fn is_pending(&self, request: PendingRequest) -> bool {
        self.state.in_flight.lock().contains(&request)
    }

    /// Sends one hit.
    ///
    /// `parameters` are sent in order, followed by the protocol fields `v`,
    /// `tid` and `cid`. A caller-supplied pair with one of those keys stays in
    /// the payload; collectors take the last value, so the protocol field
    /// wins.
    pub fn track<I, K, V>(&self, parameters: I) -> PendingRequest
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut query: Query = parameters.into_iter().collect();
        query.append("v", PROTOCOL_VERSION);
        query.append("tid", self.config.tracking_id());
        query.append("cid", self.config.client_id());
        self.track_query(query)
    }

    /// Sends `query` as-is, without adding protocol fields.
    pub fn track_query(&self, mut query: Query) -> PendingRequest {
        let transport = self.transport.transport();
        let mut request = HitRequest::new(self.config.endpoint().clone(), self.config.user_agent());

        // Registration happens under the lock, before any completion for the
        // new handle can be processed.
        let mut in_flight = self.state.in_flight.lock();
        let handle = match self.config.operation() {
            DispatchMode::Post => {
                let body = query.encode().into_bytes();
                if body.len() > MAX_POST_PAYLOAD_BYTES {
                    tracing::warn!(
                        "{} exceeds {} byte payload size limit for POST operations",
                        body.len(),
                        MAX_POST_PAYLOAD_BYTES
                    );
                }
                request = request.with_content_type(FORM_CONTENT_TYPE);
                transport.post(request, body)
            }
            DispatchMode::Get => {
                if self.config.cache_busting() {
                    let buster = rand::rng().random_range(0..CACHE_BUSTER_RANGE);
                    query.append("z", buster.to_string());
                }
                request.url = Self::get_url(self.config.endpoint(), &query);

                let size = request.url.as_str().len();
                if size > MAX_GET_URL_BYTES {
                    tracing::warn!(
                        "{} exceeds {} byte payload size limit for GET operations",
                        size,
                        MAX_GET_URL_BYTES
                    );
                }
                transport.get(request)
            }
        };
        in_flight.insert(handle);
        drop(in_flight);

        tracing::debug!(
            "Dispatched hit {} via {} {}",
            handle,
            self.config.operation(),
            transport.name()
        );
        handle
    }

    fn get_url(endpoint: &Url, query: &Query) -> Url {
        let mut url = endpoint.clone();
        let encoded = query.encode();
        url.set_query((!encoded.is_empty()).then_some(encoded.as_str()));
        url
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// See [`TrackerConfig::set_tracking_id`]: an invalid ID clears the
    /// current one.
    pub fn set_tracking_id(&mut self, tracking_id: &str) {
        self.config.set_tracking_id(tracking_id);
    }

    pub fn tracking_id(&self) -> &str {
        self.config.tracking_id()
    }

    pub fn set_client_id(&mut self, client_id: &str) {
        self.config.set_client_id(client_id);
    }

    pub fn client_id(&self) -> &str {
        self.config.client_id()
    }

    pub fn set_user_agent(&mut self, user_agent: &str) {
        self.config.set_user_agent(user_agent);
    }

    pub fn user_agent(&self) -> &str {
        self.config.user_agent()
    }

    pub fn set_endpoint(&mut self, endpoint: &str) {
        self.config.set_endpoint(endpoint);
    }

    pub fn endpoint(&self) -> &Url {
        self.config.endpoint()
    }

    pub fn set_operation(&mut self, method: &reqwest::Method) {
        self.config.set_operation(method);
    }

    pub fn operation(&self) -> DispatchMode {
        self.config.operation()
    }

    pub fn set_cache_busting(&mut self, enabled: bool) {
        self.config.set_cache_busting(enabled);
    }

    pub fn cache_busting(&self) -> bool {
        self.config.cache_busting()
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.completion_task.abort();
    }
}
