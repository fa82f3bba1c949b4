//! In-process notification fanout.
//!
//! Every subscriber gets its own unbounded queue and a dedicated delivery
//! task. [`NotificationFanout::publish`] only pushes onto those queues, so a
//! producer never waits on a handler, and a slow or failing handler only
//! delays its own queue. Queues are unbounded; a backlog past
//! [`QUEUE_DEPTH_WARNING`] is logged so a stuck handler shows up in the logs.
//!
//! There is no replay: a subscriber sees what is published after it
//! subscribed, nothing earlier.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::notification::Notification;

/// Backlog at which a subscriber's queue is reported as falling behind.
/// Warnings repeat at every further multiple.
pub const QUEUE_DEPTH_WARNING: usize = 1024;

/// Error type returned by notification handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Receives notifications for one subscription.
///
/// Calls for the same subscription never overlap and arrive in publication
/// order.
#[async_trait]
pub trait NotificationHandler: Send + Sync + 'static {
    async fn handle(&self, notification: &Notification) -> Result<(), HandlerError>;
}

/// Adapter turning a synchronous closure into a [`NotificationHandler`].
pub struct FnHandler<F>(F);

/// Wrap `f` as a handler.
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&Notification) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F> NotificationHandler for FnHandler<F>
where
    F: Fn(&Notification) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    async fn handle(&self, notification: &Notification) -> Result<(), HandlerError> {
        (self.0)(notification)
    }
}

/// Opaque id returned by [`NotificationFanout::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

struct Subscriber {
    sender: mpsc::UnboundedSender<Arc<Notification>>,
    cancel: CancellationToken,
    /// Notifications queued but not yet taken by the delivery task.
    depth: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Registry {
    subscribers: HashMap<SubscriptionHandle, Subscriber>,
    next_handle: u64,
    next_sequence: u64,
}

// ---------------------------------------------------------------------------
// NotificationFanout
// ---------------------------------------------------------------------------

/// Publish/subscribe hub for [`Notification`]s.
///
/// Designed to be shared via `Arc<NotificationFanout>`.
pub struct NotificationFanout {
    registry: Mutex<Registry>,
    shutdown: CancellationToken,
}

impl NotificationFanout {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            shutdown: CancellationToken::new(),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a handler and spawn its delivery task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe<H: NotificationHandler>(&self, handler: H) -> SubscriptionHandle {
        let (sender, receiver) = mpsc::unbounded_channel();
        let cancel = self.shutdown.child_token();
        let depth = Arc::new(AtomicUsize::new(0));

        let mut registry = self.registry();
        registry.next_handle += 1;
        let handle = SubscriptionHandle(registry.next_handle);
        let task = tokio::spawn(deliver(
            handle,
            Arc::new(handler),
            receiver,
            cancel.clone(),
            Arc::clone(&depth),
        ));
        registry.subscribers.insert(
            handle,
            Subscriber {
                sender,
                cancel,
                depth,
                task,
            },
        );
        drop(registry);

        tracing::debug!(subscription = handle.0, "Notification subscriber added");
        handle
    }

    /// Remove a subscription.
    ///
    /// Once this returns, the handler receives nothing further, including
    /// notifications already queued for it. Returns `false` if the handle
    /// was not subscribed.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let removed = self.registry().subscribers.remove(&handle);
        match removed {
            Some(subscriber) => {
                subscriber.cancel.cancel();
                tracing::debug!(subscription = handle.0, "Notification subscriber removed");
                true
            }
            None => false,
        }
    }

    /// Stamp `notification` with the next sequence number and queue it for
    /// every current subscriber. Never blocks on handlers.
    ///
    /// Returns the assigned sequence number.
    pub fn publish(&self, mut notification: Notification) -> u64 {
        let mut registry = self.registry();
        registry.next_sequence += 1;
        let sequence = registry.next_sequence;
        notification.sequence = sequence;

        tracing::debug!(
            sequence,
            source_id = %notification.source_id,
            kind = notification.kind.as_str(),
            subscribers = registry.subscribers.len(),
            "Publishing notification"
        );

        let notification = Arc::new(notification);
        for (handle, subscriber) in &registry.subscribers {
            // Counted before sending so the delivery task never sees it first.
            let depth = subscriber.depth.fetch_add(1, Ordering::Relaxed) + 1;
            if subscriber.sender.send(Arc::clone(&notification)).is_err() {
                // The delivery task already stopped.
                subscriber.depth.fetch_sub(1, Ordering::Relaxed);
                continue;
            }
            if depth % QUEUE_DEPTH_WARNING == 0 {
                tracing::warn!(
                    subscription = handle.0,
                    depth,
                    sequence,
                    "Notification subscriber is falling behind"
                );
            }
        }
        sequence
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry().subscribers.len()
    }

    /// Notifications queued for `handle` that its handler has not started on.
    pub fn queue_depth(&self, handle: SubscriptionHandle) -> Option<usize> {
        self.registry()
            .subscribers
            .get(&handle)
            .map(|subscriber| subscriber.depth.load(Ordering::Relaxed))
    }

    /// Stop accepting notifications and wait until every subscriber has
    /// handled what was already queued for it.
    ///
    /// Handlers that never finish keep this pending; bound it with a timeout
    /// and follow up with [`shutdown`](Self::shutdown).
    pub async fn close(&self) {
        let subscribers: Vec<Subscriber> = {
            let mut registry = self.registry();
            registry.subscribers.drain().map(|(_, s)| s).collect()
        };
        let count = subscribers.len();

        // Dropping the senders lets each delivery task drain and then stop.
        let tasks: Vec<JoinHandle<()>> = subscribers.into_iter().map(|s| s.task).collect();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Notification delivery task failed");
            }
        }
        tracing::info!(count, "Notification fanout drained");
    }

    /// Stop every delivery task and drop all subscriptions.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        let count = {
            let mut registry = self.registry();
            let count = registry.subscribers.len();
            registry.subscribers.clear();
            count
        };
        tracing::info!(count, "Notification fanout shut down");
    }
}

impl Default for NotificationFanout {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain one subscriber's queue in order until it is closed or cancelled.
async fn deliver(
    handle: SubscriptionHandle,
    handler: Arc<dyn NotificationHandler>,
    mut receiver: mpsc::UnboundedReceiver<Arc<Notification>>,
    cancel: CancellationToken,
    depth: Arc<AtomicUsize>,
) {
    loop {
        let notification = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = receiver.recv() => match next {
                Some(notification) => notification,
                None => break,
            },
        };
        depth.fetch_sub(1, Ordering::Relaxed);

        let outcome = AssertUnwindSafe(handler.handle(&notification))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(
                    subscription = handle.0,
                    sequence = notification.sequence,
                    kind = notification.kind.as_str(),
                    error = %e,
                    "Notification handler failed"
                );
            }
            Err(_) => {
                tracing::error!(
                    subscription = handle.0,
                    sequence = notification.sequence,
                    kind = notification.kind.as_str(),
                    "Notification handler panicked"
                );
            }
        }
    }
    tracing::debug!(subscription = handle.0, "Notification delivery task stopped");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::NotificationKind;
    use chrono::Utc;

    struct Forward(mpsc::UnboundedSender<Notification>);

    #[async_trait]
    impl NotificationHandler for Forward {
        async fn handle(&self, notification: &Notification) -> Result<(), HandlerError> {
            self.0.send(notification.clone())?;
            Ok(())
        }
    }

    fn note(kind: NotificationKind) -> Notification {
        Notification::new("S1", kind, Utc::now())
    }

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let fanout = NotificationFanout::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        fanout.subscribe(Forward(tx));

        let sequence = fanout.publish(
            note(NotificationKind::RangeBreached).with_payload(serde_json::json!({"value": 36.0})),
        );

        let received = rx.recv().await.expect("should receive the notification");
        assert_eq!(received.sequence, sequence);
        assert_eq!(received.kind, NotificationKind::RangeBreached);
        assert_eq!(received.payload["value"], 36.0);
    }

    #[tokio::test]
    async fn sequence_numbers_increase() {
        let fanout = NotificationFanout::new();
        let first = fanout.publish(note(NotificationKind::LivenessChanged));
        let second = fanout.publish(note(NotificationKind::LivenessChanged));
        assert!(second > first);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let fanout = NotificationFanout::new();
        fanout.publish(note(NotificationKind::RangeNormalized));
        assert_eq!(fanout.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn unsubscribe_unknown_handle_returns_false() {
        let fanout = NotificationFanout::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = fanout.subscribe(Forward(tx));
        assert!(fanout.unsubscribe(handle));
        assert!(!fanout.unsubscribe(handle));
    }

    #[tokio::test]
    async fn fn_handler_receives_notifications() {
        let fanout = NotificationFanout::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        fanout.subscribe(handler_fn(move |n: &Notification| {
            tx.send(n.kind)?;
            Ok(())
        }));

        fanout.publish(note(NotificationKind::RangeNormalized));
        assert_eq!(rx.recv().await, Some(NotificationKind::RangeNormalized));
    }
}
