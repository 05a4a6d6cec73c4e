use model::events::Event;
use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};

/// A subscription handle that can be used to unsubscribe from events.
#[derive(Debug, Clone)]
pub struct Subscription {
    event_type_id: TypeId,
    subscriber_id: u64,
}

type Subscribers = HashMap<TypeId, HashMap<u64, Box<dyn Any + Send + Sync>>>;

/// Typed publish/subscribe hub for pipeline events.
///
/// Publishing never waits on subscribers: a subscriber whose channel is full
/// misses the event and the drop is counted.
#[derive(Clone, Default)]
pub struct EventBus {
    // Event TypeId -> (subscriber id -> mpsc::Sender<Arc<E>>)
    subscribers: Arc<RwLock<Subscribers>>,
    next_id: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber for `E` and returns its receiving end.
    pub async fn subscribe<E>(&self, capacity: usize) -> (Subscription, mpsc::Receiver<Arc<E>>)
    where
        E: Event + Clone,
    {
        let (tx, rx) = mpsc::channel::<Arc<E>>(capacity.max(1));
        let event_type_id = TypeId::of::<E>();
        let subscriber_id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.subscribers
            .write()
            .await
            .entry(event_type_id)
            .or_default()
            .insert(subscriber_id, Box::new(tx));

        debug!(
            event_type = std::any::type_name::<E>(),
            subscriber_id, "Subscribed to event"
        );

        (
            Subscription {
                event_type_id,
                subscriber_id,
            },
            rx,
        )
    }

    pub async fn publish<E>(&self, event: E)
    where
        E: Event + Clone,
    {
        let subscribers = self.subscribers.read().await;
        let Some(type_subscribers) = subscribers.get(&TypeId::of::<E>()) else {
            return;
        };

        let event = Arc::new(event);
        for (subscriber_id, boxed) in type_subscribers {
            let Some(sender) = boxed.downcast_ref::<mpsc::Sender<Arc<E>>>() else {
                warn!(subscriber_id, "Failed to downcast sender for subscriber");
                continue;
            };

            if sender.try_send(event.clone()).is_err() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(
                    event_type = event.event_type(),
                    subscriber_id, "Dropped event for slow or closed subscriber"
                );
            }
        }
    }

    pub async fn unsubscribe(&self, subscription: Subscription) {
        let mut subscribers = self.subscribers.write().await;

        if let Some(type_subscribers) = subscribers.get_mut(&subscription.event_type_id) {
            type_subscribers.remove(&subscription.subscriber_id);
            if type_subscribers.is_empty() {
                subscribers.remove(&subscription.event_type_id);
            }
        }
    }

    pub async fn subscriber_count<E>(&self) -> usize
    where
        E: Event,
    {
        self.subscribers
            .read()
            .await
            .get(&TypeId::of::<E>())
            .map(HashMap::len)
            .unwrap_or(0)
    }

    /// Number of events that could not be handed to a subscriber.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
