//! Completion processing for dispatched hits.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::TrackedEvent;
use crate::transport::{Completion, DispatchOutcome, PendingRequest, Transport};

/// State shared between a tracker and its completion task.
#[derive(Default)]
pub(super) struct CompletionState {
    pub(super) in_flight: Mutex<HashSet<PendingRequest>>,
    observers: Mutex<Vec<mpsc::UnboundedSender<TrackedEvent>>>,
}

impl CompletionState {
    pub(super) fn subscribe(&self) -> mpsc::UnboundedReceiver<TrackedEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.observers.lock().push(sender);
        receiver
    }

    fn emit(&self, event: TrackedEvent) {
        self.observers
            .lock()
            .retain(|observer| observer.send(event.clone()).is_ok());
    }
}

/// Subscribes to `transport` and spawns the task that processes its
/// completions.
///
/// Subscription happens before returning, so completions of requests
/// dispatched afterwards are never missed.
pub(super) fn spawn_completion_task(
    transport: Arc<dyn Transport>,
    state: Arc<CompletionState>,
) -> JoinHandle<()> {
    let receiver = transport.subscribe();
    tokio::spawn(run_completion_loop(receiver, transport, state))
}

/// Processes completions one at a time until the transport's channel closes.
async fn run_completion_loop(
    mut receiver: mpsc::UnboundedReceiver<Completion>,
    transport: Arc<dyn Transport>,
    state: Arc<CompletionState>,
) {
    tracing::debug!("Completion task started for {} transport", transport.name());

    while let Some(completion) = receiver.recv().await {
        handle_completion(transport.as_ref(), &state, completion);
    }

    tracing::debug!("Completion task stopped for {} transport", transport.name());
}

/// Handles one completion notification.
///
/// Completions for requests this tracker did not dispatch, or already saw
/// complete, are ignored.
pub(super) fn handle_completion(
    transport: &dyn Transport,
    state: &CompletionState,
    completion: Completion,
) {
    let Completion { request, outcome } = completion;

    {
        let mut in_flight = state.in_flight.lock();
        if !in_flight.contains(&request) {
            tracing::trace!("Ignoring completion of untracked request {}", request);
            return;
        }

        if let DispatchOutcome::Failed(error) = &outcome {
            tracing::warn!("Hit {} finished with error: {}", request, error);
        }

        transport.release(request);
        in_flight.remove(&request);
    }

    state.emit(TrackedEvent { request, outcome });
}
