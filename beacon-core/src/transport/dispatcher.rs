//! Task-per-request transport built on a [`NetworkLayer`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use super::{Completion, DispatchOutcome, PendingRequest, Transport, TransportError};
use crate::network::{HitRequest, NetworkLayer};

type Subscribers = Arc<Mutex<Vec<mpsc::UnboundedSender<Completion>>>>;

/// Transport that runs each request as its own Tokio task.
///
/// A request is tracked only while it runs; its entry is dropped as soon as
/// it finishes, whether or not anyone releases it.
pub struct Dispatcher<N: NetworkLayer> {
    layer: Arc<N>,
    subscribers: Subscribers,
    running: Arc<Mutex<HashMap<PendingRequest, AbortHandle>>>,
}

impl<N: NetworkLayer> Dispatcher<N> {
    pub fn new(layer: Arc<N>) -> Self {
        Self {
            layer,
            subscribers: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the network layer requests are executed on.
    pub fn layer(&self) -> &Arc<N> {
        &self.layer
    }

    /// Returns the number of requests still running.
    pub fn outstanding(&self) -> usize {
        self.running.lock().len()
    }

    /// Aborts every running request.
    ///
    /// Aborted requests publish no completion.
    pub fn shutdown(&self) {
        let aborted: Vec<AbortHandle> = self.running.lock().drain().map(|(_, task)| task).collect();
        for task in &aborted {
            task.abort();
        }
        if !aborted.is_empty() {
            tracing::debug!(
                "{} transport shut down, aborted {} running requests",
                self.layer.name(),
                aborted.len()
            );
        }
    }

    fn dispatch(&self, request: HitRequest, body: Option<Vec<u8>>) -> PendingRequest {
        let id = PendingRequest::next();
        let layer = Arc::clone(&self.layer);
        let running = Arc::clone(&self.running);
        let subscribers = Arc::clone(&self.subscribers);

        // Held across spawn so the task cannot finish before it is registered.
        let mut registry = self.running.lock();
        let task = tokio::spawn(async move {
            let result = match &body {
                Some(body) => layer.http_post(&request, body).await,
                None => layer.http_get(&request).await,
            };

            let outcome = match result {
                Ok(response) if response.is_success() => DispatchOutcome::Delivered {
                    status: response.status_code,
                },
                Ok(response) => DispatchOutcome::Failed(TransportError::Status {
                    url: request.target(),
                    status: response.status_code,
                }),
                Err(e) => DispatchOutcome::Failed(e),
            };

            running.lock().remove(&id);
            publish(&subscribers, Completion {
                request: id,
                outcome,
            });
        });
        registry.insert(id, task.abort_handle());

        tracing::trace!("{} transport started request {}", self.layer.name(), id);
        id
    }
}

/// Delivers `completion` to every live subscriber and forgets closed ones.
fn publish(subscribers: &Subscribers, completion: Completion) {
    subscribers
        .lock()
        .retain(|subscriber| subscriber.send(completion.clone()).is_ok());
}

impl<N: NetworkLayer> Transport for Dispatcher<N> {
    fn get(&self, request: HitRequest) -> PendingRequest {
        self.dispatch(request, None)
    }

    fn post(&self, request: HitRequest, body: Vec<u8>) -> PendingRequest {
        self.dispatch(request, Some(body))
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<Completion> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.lock().push(sender);
        receiver
    }

    fn release(&self, request: PendingRequest) {
        if let Some(task) = self.running.lock().remove(&request) {
            task.abort();
        }
    }

    fn name(&self) -> &str {
        self.layer.name()
    }
}

impl<N: NetworkLayer> Drop for Dispatcher<N> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod dispatcher_tests {
    use std::time::Duration;

    use url::Url;

    use super::*;
    use crate::network::SimulationNetworkLayer;

    fn hit_request() -> HitRequest {
        HitRequest::new(
            Url::parse("http://collector.test/collect").unwrap(),
            "beacon/test",
        )
    }

    #[tokio::test]
    async fn test_completion_published_and_entry_dropped() {
        let dispatcher = Dispatcher::new(Arc::new(SimulationNetworkLayer::new()));
        let mut completions = dispatcher.subscribe();

        let request = dispatcher.post(hit_request(), b"v=1".to_vec());
        assert_eq!(dispatcher.outstanding(), 1);
        let completion = completions.recv().await.unwrap();

        assert_eq!(completion.request, request);
        assert_eq!(completion.outcome, DispatchOutcome::Delivered { status: 200 });
        assert_eq!(dispatcher.outstanding(), 0);

        // Releasing a finished request is harmless.
        dispatcher.release(request);
        assert_eq!(dispatcher.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_non_success_status_is_a_failure() {
        let mut layer = SimulationNetworkLayer::new();
        layer.configure_status(404);
        let dispatcher = Dispatcher::new(Arc::new(layer));
        let mut completions = dispatcher.subscribe();

        dispatcher.get(hit_request());
        let completion = completions.recv().await.unwrap();

        assert_eq!(
            completion.outcome,
            DispatchOutcome::Failed(TransportError::Status {
                url: "http://collector.test/collect".to_string(),
                status: 404,
            })
        );
    }

    #[tokio::test]
    async fn test_burst_reaches_every_subscriber_without_loss() {
        let dispatcher = Dispatcher::new(Arc::new(SimulationNetworkLayer::new()));
        let mut first = dispatcher.subscribe();
        let mut second = dispatcher.subscribe();

        for _ in 0..3000 {
            dispatcher.get(hit_request());
        }

        for receiver in [&mut first, &mut second] {
            for _ in 0..3000 {
                tokio::time::timeout(Duration::from_secs(5), receiver.recv())
                    .await
                    .expect("completion within timeout")
                    .expect("channel open");
            }
        }
        assert_eq!(dispatcher.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_forgotten() {
        let dispatcher = Dispatcher::new(Arc::new(SimulationNetworkLayer::new()));
        drop(dispatcher.subscribe());
        let mut live = dispatcher.subscribe();

        dispatcher.get(hit_request());
        live.recv().await.unwrap();

        assert_eq!(dispatcher.subscribers.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_release_aborts_running_request() {
        let mut layer = SimulationNetworkLayer::new();
        layer.configure_latency(Duration::from_secs(60));
        let dispatcher = Dispatcher::new(Arc::new(layer));
        let mut completions = dispatcher.subscribe();

        let request = dispatcher.get(hit_request());
        dispatcher.release(request);
        assert_eq!(dispatcher.outstanding(), 0);

        let result = tokio::time::timeout(Duration::from_millis(100), completions.recv()).await;
        assert!(result.is_err(), "released request must not complete");
    }

    #[tokio::test]
    async fn test_shutdown_aborts_running_requests() {
        let mut layer = SimulationNetworkLayer::new();
        layer.configure_latency(Duration::from_secs(60));
        let dispatcher = Dispatcher::new(Arc::new(layer));
        let mut completions = dispatcher.subscribe();

        dispatcher.get(hit_request());
        dispatcher.get(hit_request());
        assert_eq!(dispatcher.outstanding(), 2);

        dispatcher.shutdown();
        assert_eq!(dispatcher.outstanding(), 0);

        let result = tokio::time::timeout(Duration::from_millis(100), completions.recv()).await;
        assert!(result.is_err(), "aborted requests must not complete");
    }
}
