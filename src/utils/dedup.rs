//! Coalescing of concurrent async operations that share a key.
//!
//! The first caller for a key becomes the leader and runs the operation;
//! callers arriving while it is in flight wait for the leader and receive a
//! clone of its result.
//!
//! If the leader is dropped before it publishes a result (its caller was
//! cancelled or timed out), the slot is marked abandoned and one of the
//! waiting callers takes over as the new leader, so followers never hang on a
//! dead leader.
//!
//! A [`Leader`] is an owned handle. It can be moved into a spawned task so the
//! outcome is still published when the caller that started the work goes
//! away, and it can publish before it is dropped so the slot keeps answering
//! late arrivals until follow-up work finishes.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Notify, OnceCell};
use tracing::debug;

/// One in-flight operation. `None` in the cell means the leader went away
/// without producing a result.
struct Slot<V, E> {
    result: OnceCell<Option<Result<V, E>>>,
    notify: Notify,
}

impl<V, E> Slot<V, E> {
    fn new() -> Self {
        Self {
            result: OnceCell::new(),
            notify: Notify::new(),
        }
    }
}

type Slots<K, V, E> = Arc<Mutex<HashMap<K, Arc<Slot<V, E>>>>>;

fn lock<K, V, E>(slots: &Slots<K, V, E>) -> MutexGuard<'_, HashMap<K, Arc<Slot<V, E>>>> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Outcome of [`InFlight::join`].
pub enum Joined<K: Hash + Eq, V, E> {
    Leader(Leader<K, V, E>),
    Follower(Follower<V, E>),
}

/// The caller responsible for running the operation of a key.
///
/// The slot is released when the handle is dropped. Dropping it without
/// publishing marks the operation abandoned.
pub struct Leader<K: Hash + Eq, V, E> {
    slots: Slots<K, V, E>,
    key: K,
    slot: Arc<Slot<V, E>>,
}

impl<K: Hash + Eq, V: Clone, E: Clone> Leader<K, V, E> {
    /// Hand `result` to every waiting and later follower while this handle
    /// is alive. Only the first published result counts.
    pub fn publish(&self, result: &Result<V, E>) {
        if self.slot.result.set(Some(result.clone())).is_ok() {
            self.slot.notify.notify_waiters();
        }
    }

    /// Publish `result`, release the slot and return `result`.
    pub fn complete(self, result: Result<V, E>) -> Result<V, E> {
        self.publish(&result);
        result
    }
}

impl<K: Hash + Eq, V, E> Drop for Leader<K, V, E> {
    fn drop(&mut self) {
        // no-op if the leader already published
        let _ = self.slot.result.set(None);

        {
            let mut slots = lock(&self.slots);
            if slots.get(&self.key).is_some_and(|s| Arc::ptr_eq(s, &self.slot)) {
                slots.remove(&self.key);
            }
        }

        self.slot.notify.notify_waiters();
    }
}

/// A caller waiting for the leader of its key.
pub struct Follower<V, E> {
    slot: Arc<Slot<V, E>>,
}

impl<V: Clone, E: Clone> Follower<V, E> {
    /// Wait for the leader. Returns `None` if it was abandoned.
    pub async fn wait(self) -> Option<Result<V, E>> {
        loop {
            // register before checking so a notification in between is not lost
            let notified = self.slot.notify.notified();

            if let Some(outcome) = self.slot.result.get() {
                return outcome.clone();
            }

            notified.await;
        }
    }
}

pub struct InFlight<K, V, E> {
    slots: Slots<K, V, E>,
}

impl<K, V, E> InFlight<K, V, E>
where
    K: Hash + Eq + Clone,
    V: Clone,
    E: Clone,
{
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Become the leader for `key`, or follow the leader already registered.
    pub fn join(&self, key: K) -> Joined<K, V, E> {
        let mut slots = lock(&self.slots);
        if let Some(slot) = slots.get(&key) {
            return Joined::Follower(Follower {
                slot: Arc::clone(slot),
            });
        }

        let slot = Arc::new(Slot::new());
        slots.insert(key.clone(), Arc::clone(&slot));
        Joined::Leader(Leader {
            slots: Arc::clone(&self.slots),
            key,
            slot,
        })
    }

    /// Run `f` for `key`, or join the call already in flight for it.
    pub async fn run<F, Fut>(&self, key: K, f: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let leader = loop {
            match self.join(key.clone()) {
                Joined::Leader(leader) => break leader,
                Joined::Follower(follower) => {
                    if let Some(result) = follower.wait().await {
                        return result;
                    }
                    debug!("In-flight leader abandoned, taking over");
                }
            }
        };

        leader.complete(f().await)
    }

    /// Number of keys with an operation currently in flight.
    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V, E> Default for InFlight<K, V, E>
where
    K: Hash + Eq + Clone,
    V: Clone,
    E: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
