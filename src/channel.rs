//! ==============================================================================
//! channel.rs - ambient value broadcast
//! ==============================================================================
//!
//! purpose:
//!     a single optional value plus a list of subscriber callbacks. the sampler
//!     that measures ambient humidity publishes here; the pump decision (and
//!     anything else interested) subscribes without knowing the producer.
//!
//! delivery rules:
//!     - subscribe() calls the new callback once with the current value, even
//!       when it is still absent, before any later publish reaches it
//!     - publish() stores the value, then calls every subscriber in the order
//!       they registered
//!     - one publish is fully delivered before the next one starts, so each
//!       subscriber sees updates in publish order
//!
//! constraint:
//!     a callback must not call publish() or subscribe() on the same channel;
//!     delivery holds the dispatch lock and that would deadlock. reading
//!     current() or dropping a Subscription from inside a callback is fine.
//!
//! ==============================================================================

use std::sync::{Arc, Mutex, MutexGuard, Weak};

type Callback = Arc<dyn Fn(Option<f64>) + Send + Sync>;

struct State {
    value: Option<f64>,
    subscribers: Vec<(u64, Callback)>,
    next_id: u64,
}

struct Shared {
    state: Mutex<State>,
    // serializes deliveries; never held together with `state` by a callback
    dispatch: Mutex<()>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn dispatch(&self) -> MutexGuard<'_, ()> {
        self.dispatch.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// cloneable handle; clones share the same value and subscriber list
#[derive(Clone)]
pub struct AmbientChannel {
    shared: Arc<Shared>,
}

impl Default for AmbientChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl AmbientChannel {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    value: None,
                    subscribers: Vec::new(),
                    next_id: 0,
                }),
                dispatch: Mutex::new(()),
            }),
        }
    }

    /// commit `value` and deliver it to every current subscriber
    pub fn publish(&self, value: Option<f64>) {
        let _delivery = self.shared.dispatch();
        let targets: Vec<Callback> = {
            let mut state = self.shared.state();
            state.value = value;
            state.subscribers.iter().map(|(_, cb)| cb.clone()).collect()
        };
        for callback in targets {
            callback(value);
        }
    }

    /// register `callback` and immediately hand it the current value
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<f64>) + Send + Sync + 'static,
    {
        let _delivery = self.shared.dispatch();
        let callback: Callback = Arc::new(callback);
        let (id, current) = {
            let mut state = self.shared.state();
            let id = state.next_id;
            state.next_id += 1;
            state.subscribers.push((id, callback.clone()));
            (id, state.value)
        };
        callback(current);

        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn current(&self) -> Option<f64> {
        self.shared.state().value
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.state().subscribers.len()
    }
}

/// removes its callback when unsubscribed or dropped
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    shared: Weak<Shared>,
}

impl Subscription {
    /// idempotent; the channel may already be gone
    pub fn unsubscribe(&mut self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        shared.state().subscribers.retain(|(id, _)| *id != self.id);
        self.shared = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
