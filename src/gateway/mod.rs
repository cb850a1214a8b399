//! Live fan-out of feed events to connected subscribers.
//!
//! Every subscriber owns a bounded queue. A broadcast tries each queue without
//! waiting, so one stalled subscriber never holds up the others; a subscriber
//! whose queue is full is evicted and its stream ends. Late subscribers get
//! no backlog.
//!
//! A batch (item + aggregate) lands in a subscriber's queue whole or not at
//! all: slots for every event are reserved before anything is queued.

pub mod sse;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use metrics::gauge;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::error::BroadcastError;
use crate::model::{FeedbackItem, SentimentAggregate};

pub const EVENT_ITEM_CREATED: &str = "feedback.created";
pub const EVENT_AGGREGATE_UPDATED: &str = "aggregate.updated";

/// Smallest per-subscriber queue: one item plus its aggregate.
pub const MIN_SUBSCRIBER_BUFFER: usize = 2;

/// Event pushed over the live channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "camelCase")]
pub enum FeedEvent {
    ItemCreated(FeedbackItem),
    AggregateUpdated(SentimentAggregate),
}

impl FeedEvent {
    /// Wire name of the event on the live channel.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ItemCreated(_) => EVENT_ITEM_CREATED,
            Self::AggregateUpdated(_) => EVENT_AGGREGATE_UPDATED,
        }
    }
}

/// Delivery capability the pipeline depends on.
#[async_trait]
pub trait BroadcastGateway: Send + Sync {
    /// Deliver to every connected subscriber; returns how many were reached.
    ///
    /// Zero connected subscribers is `Ok(0)`. An error means subscribers were
    /// connected but none of them received the event.
    async fn broadcast(&self, event: FeedEvent) -> Result<usize, BroadcastError>;

    /// Deliver several events as one unit, in order.
    ///
    /// Implementations that can must hand a subscriber either every event of
    /// the batch or none of them. The default just sends one by one and
    /// reports the smallest reach.
    async fn broadcast_batch(&self, events: Vec<FeedEvent>) -> Result<usize, BroadcastError> {
        let mut reached = usize::MAX;
        for event in events {
            reached = reached.min(self.broadcast(event).await?);
        }
        Ok(if reached == usize::MAX { 0 } else { reached })
    }
}

pub type DynGateway = Arc<dyn BroadcastGateway>;

type SubscriberId = u64;

struct RegistryInner {
    next_id: AtomicU64,
    buffer: usize,
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<Arc<FeedEvent>>>>,
}

impl RegistryInner {
    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriberId, mpsc::Sender<Arc<FeedEvent>>>> {
        // The map stays consistent even if a holder panicked.
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: SubscriberId) -> bool {
        let mut subs = self.lock();
        let removed = subs.remove(&id).is_some();
        gauge!("feedback_live_subscribers").set(subs.len() as f64);
        removed
    }
}

/// Concurrency-safe set of live subscriber connections.
#[derive(Clone)]
pub struct SubscriberRegistry {
    inner: Arc<RegistryInner>,
}

impl SubscriberRegistry {
    /// `buffer`: queue depth per subscriber, raised to [`MIN_SUBSCRIBER_BUFFER`].
    pub fn new(buffer: usize) -> Self {
        let buffer = buffer.max(MIN_SUBSCRIBER_BUFFER);
        info!(buffer, "subscriber registry initialized");
        Self {
            inner: Arc::new(RegistryInner {
                next_id: AtomicU64::new(1),
                buffer,
                subscribers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Register a new subscriber. Dropping the returned handle disconnects it.
    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.buffer);
        let live = {
            let mut subs = self.inner.lock();
            subs.insert(id, tx);
            subs.len()
        };
        gauge!("feedback_live_subscribers").set(live as f64);
        info!(subscriber = id, live, "subscriber connected");
        Subscription {
            rx: ReceiverStream::new(rx),
            registration: Registration {
                id,
                registry: Arc::clone(&self.inner),
            },
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().len()
    }

    fn fan_out(&self, events: Vec<FeedEvent>) -> Result<usize, BroadcastError> {
        let Some(name) = events.first().map(FeedEvent::name) else {
            return Ok(0);
        };
        let events: Vec<Arc<FeedEvent>> = events.into_iter().map(Arc::new).collect();

        // Held for the whole fan-out so connects/disconnects cannot interleave.
        let mut subs = self.inner.lock();
        let attempted = subs.len();
        if attempted == 0 {
            debug!(event = name, "no subscribers connected");
            return Ok(0);
        }

        let mut delivered = 0usize;
        subs.retain(|id, tx| match tx.try_reserve_many(events.len()) {
            Ok(permits) => {
                for (permit, event) in permits.zip(&events) {
                    permit.send(Arc::clone(event));
                }
                delivered += 1;
                true
            }
            Err(TrySendError::Full(())) => {
                warn!(subscriber = id, event = name, "subscriber queue full, evicting");
                false
            }
            Err(TrySendError::Closed(())) => {
                debug!(subscriber = id, "dropping closed subscriber");
                false
            }
        });
        gauge!("feedback_live_subscribers").set(subs.len() as f64);
        drop(subs);

        debug!(event = name, batch = events.len(), delivered, attempted, "broadcast");
        if delivered == 0 {
            return Err(BroadcastError::NoSubscriberReached {
                event: name,
                attempted,
            });
        }
        Ok(delivered)
    }
}

#[async_trait]
impl BroadcastGateway for SubscriberRegistry {
    async fn broadcast(&self, event: FeedEvent) -> Result<usize, BroadcastError> {
        self.fan_out(vec![event])
    }

    async fn broadcast_batch(&self, events: Vec<FeedEvent>) -> Result<usize, BroadcastError> {
        self.fan_out(events)
    }
}

/// Registry entry of one subscriber; removed on drop.
struct Registration {
    id: SubscriberId,
    registry: Arc<RegistryInner>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove(self.id);
        let live = self.registry.lock().len();
        info!(subscriber = self.id, live, "subscriber disconnected");
    }
}

/// One subscriber's end of the live channel.
pub struct Subscription {
    rx: ReceiverStream<Arc<FeedEvent>>,
    registration: Registration,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.registration.id
    }

    /// Next event, or `None` once the subscriber has been evicted.
    pub async fn recv(&mut self) -> Option<Arc<FeedEvent>> {
        self.rx.next().await
    }

    /// Non-blocking variant of [`Subscription::recv`].
    pub fn try_recv(&mut self) -> Option<Arc<FeedEvent>> {
        let rx: &mut mpsc::Receiver<Arc<FeedEvent>> = self.rx.as_mut();
        rx.try_recv().ok()
    }

    /// Event stream that keeps the subscriber registered until it is dropped.
    pub fn into_stream(self) -> impl Stream<Item = Arc<FeedEvent>> + Send + 'static {
        let Subscription { rx, registration } = self;
        rx.map(move |event| {
            let _registered = &registration;
            event
        })
    }
}
