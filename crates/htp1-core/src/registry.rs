// ── Subscriber registry ──
//
// Independent notification sinks keyed by subscriber id. Fan-out never
// blocks: each sink is a bounded channel fed with `try_send`. A full sink
// loses the notification and is marked lagged; its next delivery is a
// catch-up (availability + full snapshot) instead of an increment.
// Registration and fan-out share one lock, so a new subscriber's initial
// resync is always queued ahead of any later increment.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use indexmap::IndexMap;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::notification::Notification;

/// Opaque subscriber identity, typically the consuming entity's id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(String);

impl SubscriberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SubscriberId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for SubscriberId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Receiving half handed to subscribers.
pub type NotificationSink = mpsc::Sender<Arc<Notification>>;

struct Subscriber {
    sink: NotificationSink,
    lagged: bool,
}

enum Delivery {
    Sent,
    Full,
    Closed,
}

fn deliver(sink: &NotificationSink, notification: Arc<Notification>) -> Delivery {
    match sink.try_send(notification) {
        Ok(()) => Delivery::Sent,
        Err(TrySendError::Full(_)) => Delivery::Full,
        Err(TrySendError::Closed(_)) => Delivery::Closed,
    }
}

/// Deliver a batch in order, stopping at the first failure.
fn deliver_all(sink: &NotificationSink, batch: Vec<Notification>) -> Delivery {
    for notification in batch {
        match deliver(sink, Arc::new(notification)) {
            Delivery::Sent => {}
            failed => return failed,
        }
    }
    Delivery::Sent
}

#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: Mutex<IndexMap<SubscriberId, Subscriber>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, IndexMap<SubscriberId, Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Add (or replace) a subscriber.
    ///
    /// `initial` is evaluated under the registry lock and its notifications
    /// are queued on the new sink before it can see any fan-out.
    /// Returns `true` if an existing subscriber with this id was replaced.
    pub fn register(
        &self,
        id: SubscriberId,
        sink: NotificationSink,
        initial: impl FnOnce() -> Vec<Notification>,
    ) -> bool {
        let mut subscribers = self.lock();
        let lagged = match deliver_all(&sink, initial()) {
            Delivery::Sent | Delivery::Closed => false,
            Delivery::Full => true,
        };
        tracing::debug!(subscriber = %id, "subscriber registered");
        subscribers
            .insert(id, Subscriber { sink, lagged })
            .is_some()
    }

    pub fn unregister(&self, id: &SubscriberId) -> bool {
        let removed = self.lock().shift_remove(id).is_some();
        if removed {
            tracing::debug!(subscriber = %id, "subscriber removed");
        }
        removed
    }

    pub fn contains(&self, id: &SubscriberId) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Fan `notification` out to every subscriber.
    ///
    /// Lagged subscribers get `catch_up()` instead. Subscribers whose
    /// receiver has been dropped are removed.
    pub fn publish(&self, notification: Notification, catch_up: impl Fn() -> Vec<Notification>) {
        let mut subscribers = self.lock();
        fan_out(&mut subscribers, notification, &catch_up);
    }

    /// Run `commit`, then fan out `batch`, all under the registry lock.
    ///
    /// A subscriber registering concurrently sees either the state from
    /// before `commit` followed by the batch, or its own initial
    /// notifications after `commit` and none of the batch.
    pub fn publish_batch(
        &self,
        batch: Vec<Notification>,
        commit: impl FnOnce(),
        catch_up: impl Fn() -> Vec<Notification>,
    ) {
        let mut subscribers = self.lock();
        commit();
        for notification in batch {
            fan_out(&mut subscribers, notification, &catch_up);
        }
    }
}

fn fan_out(
    subscribers: &mut IndexMap<SubscriberId, Subscriber>,
    notification: Notification,
    catch_up: &impl Fn() -> Vec<Notification>,
) {
    let shared = Arc::new(notification);
    subscribers.retain(|id, subscriber| {
        let outcome = if subscriber.lagged {
            deliver_all(&subscriber.sink, catch_up())
        } else {
            deliver(&subscriber.sink, Arc::clone(&shared))
        };

        match outcome {
            Delivery::Sent => {
                if subscriber.lagged {
                    tracing::debug!(subscriber = %id, "lagged subscriber caught up");
                }
                subscriber.lagged = false;
                true
            }
            Delivery::Full => {
                if !subscriber.lagged {
                    tracing::warn!(subscriber = %id, "subscriber queue full, will resync");
                }
                subscriber.lagged = true;
                true
            }
            Delivery::Closed => {
                tracing::debug!(subscriber = %id, "subscriber sink closed, removing");
                false
            }
        }
    });
}
