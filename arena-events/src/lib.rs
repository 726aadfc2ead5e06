//! Arena Events - Topic-Based Pub/Sub
//!
//! Fan-out layer between match runners and SSE subscribers. Publishers push
//! onto an unbounded staging queue drained by a single worker; subscribers
//! hold bounded broadcast channels per topic. A subscriber that cannot keep
//! up drops its oldest undelivered events and observes a single `Lagged`
//! event, after which it can resync from the repository.
//!
//! Ordering: the staging queue serializes all publishes, so consumers on a
//! topic observe events in publish order. Across topics no ordering is
//! promised.

mod types;

pub use types::*;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::{broadcast, mpsc, Semaphore};
use tracing::debug;

/// Default bound on each subscriber's channel.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;

/// Staging depth above which publishers are throttled until the worker
/// catches up.
pub const DEFAULT_STAGING_LIMIT: usize = 4096;

struct Shared {
    topics: RwLock<HashMap<Topic, broadcast::Sender<ArenaEvent>>>,
    /// One permit per free staging slot; the drain worker returns permits.
    staging_budget: Semaphore,
    subscriber_capacity: usize,
}

impl Shared {
    fn sender_for(&self, topic: &Topic) -> broadcast::Sender<ArenaEvent> {
        // Wait-free common path: topic already exists
        if let Some(sender) = self.topics.read().expect("topic table poisoned").get(topic) {
            return sender.clone();
        }
        let mut topics = self.topics.write().expect("topic table poisoned");
        topics
            .entry(topic.clone())
            .or_insert_with(|| broadcast::channel(self.subscriber_capacity).0)
            .clone()
    }
}

/// Topic-addressed event bus.
///
/// Cheap to clone; all clones share the same topic table and staging queue.
#[derive(Clone)]
pub struct EventBus {
    shared: Arc<Shared>,
    staging_tx: mpsc::UnboundedSender<(Topic, ArenaEvent)>,
    staging_limit: usize,
}

impl EventBus {
    /// Create a bus with default capacities and spawn its drain worker.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SUBSCRIBER_CAPACITY, DEFAULT_STAGING_LIMIT)
    }

    /// Create a bus with explicit subscriber-channel and staging bounds.
    pub fn with_capacity(subscriber_capacity: usize, staging_limit: usize) -> Self {
        let shared = Arc::new(Shared {
            topics: RwLock::new(HashMap::new()),
            staging_budget: Semaphore::new(staging_limit),
            subscriber_capacity,
        });
        let (staging_tx, staging_rx) = mpsc::unbounded_channel();

        tokio::spawn(drain_worker(Arc::clone(&shared), staging_rx));

        Self {
            shared,
            staging_tx,
            staging_limit,
        }
    }

    /// Publish an event to a topic.
    ///
    /// Non-blocking while staging is below the limit; above it, the next
    /// publish waits for the worker to drain. Events published to a topic
    /// with no subscribers are dropped silently.
    pub async fn publish(&self, topic: Topic, event: ArenaEvent) {
        let permit = self
            .shared
            .staging_budget
            .acquire()
            .await
            .expect("staging budget never closes");
        // The worker returns the permit once the event is fanned out
        permit.forget();
        if self.staging_tx.send((topic, event)).is_err() {
            self.shared.staging_budget.add_permits(1);
        }
    }

    /// Subscribe to a topic. Dropping the subscription unsubscribes.
    pub fn subscribe(&self, topic: &Topic) -> Subscription {
        Subscription {
            rx: self.shared.sender_for(topic).subscribe(),
        }
    }

    /// Number of live subscribers on a topic.
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.shared
            .topics
            .read()
            .expect("topic table poisoned")
            .get(topic)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    /// Drop a topic's channel. Live subscriptions see the stream close.
    pub fn retire_topic(&self, topic: &Topic) {
        self.shared
            .topics
            .write()
            .expect("topic table poisoned")
            .remove(topic);
    }

    /// Events accepted but not yet fanned out.
    pub fn staged_len(&self) -> usize {
        self.staging_limit - self.shared.staging_budget.available_permits()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("staged", &self.staged_len())
            .field("staging_limit", &self.staging_limit)
            .finish()
    }
}

async fn drain_worker(
    shared: Arc<Shared>,
    mut staging_rx: mpsc::UnboundedReceiver<(Topic, ArenaEvent)>,
) {
    while let Some((topic, event)) = staging_rx.recv().await {
        let sender = shared.sender_for(&topic);
        match sender.send(event) {
            Ok(receivers) => {
                debug!(%topic, receivers, "Event fanned out");
            }
            Err(_) => {
                // No receivers on this topic
                debug!(%topic, "Event dropped, no receivers");
            }
        }
        shared.staging_budget.add_permits(1);
    }
}

/// A live subscription to one topic.
///
/// Lag is surfaced in-band: when the subscriber's bounded channel
/// overflows, the oldest events are dropped and the next receive yields a
/// single [`ArenaEvent::Lagged`] carrying the drop count.
pub struct Subscription {
    rx: broadcast::Receiver<ArenaEvent>,
}

impl Subscription {
    /// Receive the next event, or `None` once the topic is retired and all
    /// buffered events are consumed.
    pub async fn next(&mut self) -> Option<ArenaEvent> {
        match self.rx.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(dropped)) => Some(ArenaEvent::Lagged {
                payload: LaggedPayload { dropped },
            }),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    /// Non-blocking receive, for tests and polling consumers.
    pub fn try_next(&mut self) -> Option<ArenaEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(broadcast::error::TryRecvError::Lagged(dropped)) => Some(ArenaEvent::Lagged {
                payload: LaggedPayload { dropped },
            }),
            Err(_) => None,
        }
    }
}
