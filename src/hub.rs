//! Fan-out of session state to any number of observers.
//!
//! Each notification kind has its own [`Channel`]. Subscribing replays the
//! channel's cached value, if any, and then delivers every later update.
//! Observers receive `Arc` snapshots, never references into live state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, instrument, trace};

use crate::error::SessionError;
use crate::model::{Game, Guess};

type Callback<T> = Arc<dyn Fn(Arc<T>) + Send + Sync>;

/// Handle returned by [`Channel::subscribe`].
///
/// Dropping the handle leaves the subscription in place; pass it to
/// [`Channel::unsubscribe`] to stop notifications.
#[derive(Debug, PartialEq, Eq, Hash)]
#[must_use = "keep the handle to be able to unsubscribe"]
pub struct Subscription {
    channel: &'static str,
    id: u64,
}

struct ChannelState<T> {
    latest: Option<Arc<T>>,
    subscribers: Vec<(u64, Callback<T>)>,
}

/// A single typed notification channel with replay of the last value.
///
/// Callbacks run on the publishing thread after the channel state is
/// unlocked, so they may read [`Channel::latest`] or unsubscribe. Deliveries
/// are serialized: every observer sees updates in publish order.
pub struct Channel<T> {
    name: &'static str,
    next_id: AtomicU64,
    state: Mutex<ChannelState<T>>,
    // held while callbacks run; orders replays and publishes
    delivery: Mutex<()>,
}

impl<T> std::fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("subscribers", &state.subscribers.len())
            .field("has_value", &state.latest.is_some())
            .finish()
    }
}

impl<T> Channel<T> {
    fn lock(&self) -> MutexGuard<'_, ChannelState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Send + Sync + 'static> Channel<T> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            next_id: AtomicU64::new(0),
            state: Mutex::new(ChannelState {
                latest: None,
                subscribers: Vec::new(),
            }),
            delivery: Mutex::new(()),
        }
    }

    /// Registers `callback`, replaying the cached value first if there is one.
    ///
    /// A callback must not subscribe to the channel that is notifying it.
    #[instrument(skip(self, callback), fields(channel = self.name))]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Arc<T>) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let callback: Callback<T> = Arc::new(callback);
        let _delivery = self.deliver();
        let latest = {
            let mut state = self.lock();
            state.subscribers.push((id, Arc::clone(&callback)));
            debug!(id, count = state.subscribers.len(), "Observer subscribed");
            state.latest.clone()
        };
        if let Some(latest) = latest {
            trace!(id, "Replaying cached value");
            callback(latest);
        }
        Subscription {
            channel: self.name,
            id,
        }
    }

    /// Removes a subscription. Returns `false` if it was not registered here.
    #[instrument(skip(self), fields(channel = self.name))]
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        if subscription.channel != self.name {
            return false;
        }
        let mut state = self.lock();
        let before = state.subscribers.len();
        state.subscribers.retain(|(id, _)| *id != subscription.id);
        let removed = state.subscribers.len() != before;
        debug!(id = subscription.id, removed, "Observer unsubscribed");
        removed
    }

    /// Cached value, if any.
    pub fn latest(&self) -> Option<Arc<T>> {
        self.lock().latest.clone()
    }

    /// Number of registered observers.
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Caches `value` and delivers it to every observer in subscription order.
    pub(crate) fn publish(&self, value: Arc<T>) {
        let _delivery = self.deliver();
        let callbacks: Vec<Callback<T>> = {
            let mut state = self.lock();
            state.latest = Some(Arc::clone(&value));
            state.subscribers.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        trace!(channel = self.name, count = callbacks.len(), "Publishing");
        for callback in callbacks {
            callback(Arc::clone(&value));
        }
    }

    /// Drops the cached value without notifying anyone.
    pub(crate) fn clear(&self) {
        self.lock().latest = None;
    }
}

impl<T: PartialEq + Send + Sync + 'static> Channel<T> {
    /// Publishes only when `value` differs from the cached value.
    ///
    /// Returns whether observers were notified.
    pub(crate) fn publish_if_changed(&self, value: Arc<T>) -> bool {
        if self.latest().is_some_and(|latest| *latest == *value) {
            return false;
        }
        self.publish(value);
        true
    }
}

/// The four notification channels of a session.
#[derive(Debug)]
pub struct ObserverHub {
    game: Channel<Game>,
    guess: Channel<Guess>,
    solved: Channel<bool>,
    error: Channel<SessionError>,
}

impl Default for ObserverHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ObserverHub {
    /// Creates a hub with empty channels.
    pub fn new() -> Self {
        Self {
            game: Channel::new("game"),
            guess: Channel::new("guess"),
            solved: Channel::new("solved"),
            error: Channel::new("error"),
        }
    }

    /// Snapshots of the current game after every change.
    pub fn game(&self) -> &Channel<Game> {
        &self.game
    }

    /// The most recently received guess.
    pub fn guess(&self) -> &Channel<Guess> {
        &self.guess
    }

    /// The solved flag; announced once per change.
    pub fn solved(&self) -> &Channel<bool> {
        &self.solved
    }

    /// Every failed operation, exactly once.
    pub fn error(&self) -> &Channel<SessionError> {
        &self.error
    }

    /// Forgets the cached game, guess and solved flag after a session ends.
    pub(crate) fn reset_session(&self) {
        self.game.clear();
        self.guess.clear();
        self.solved.clear();
    }
}
