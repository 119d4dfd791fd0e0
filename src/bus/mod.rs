//! Process-wide refresh signal.
//!
//! A publish carries no payload beyond "something changed"; every subscriber decides for
//! itself what to re-fetch. Handlers run synchronously on the publishing task and may
//! subscribe or unsubscribe from inside the callback.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::ClientError;

/// Monotonic emission counter. Starts at zero before the first publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefreshToken(u64);

impl RefreshToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for RefreshToken {
    fn from(value: u64) -> Self {
        RefreshToken(value)
    }
}

impl fmt::Display for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(RefreshToken) -> Result<(), ClientError> + Send + Sync>;

struct BusState {
    handlers: BTreeMap<SubscriptionId, Handler>,
    next_id: u64,
    token: u64,
    shut_down: bool,
}

/// Cloneable handle to one refresh bus; clones share the same subscriber set.
#[derive(Clone)]
pub struct RefreshBus {
    state: Arc<Mutex<BusState>>,
}

impl Default for RefreshBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshBus {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                handlers: BTreeMap::new(),
                next_id: 1,
                token: 0,
                shut_down: false,
            })),
        }
    }

    /// Register a handler. After shutdown the returned id is inert.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(RefreshToken) -> Result<(), ClientError> + Send + Sync + 'static,
    {
        let mut state = self.state.lock();
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;

        if state.shut_down {
            tracing::warn!("Subscription {:?} requested after refresh bus shutdown", id);
        } else {
            state.handlers.insert(id, Arc::new(handler));
        }
        id
    }

    /// Remove a handler. Removing an unknown or already removed id is a no-op.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if self.state.lock().handlers.remove(&id).is_none() {
            tracing::trace!("Subscription {:?} already removed", id);
        }
    }

    /// Invoke every current subscriber once and return the new token.
    ///
    /// The subscriber set is snapshotted first, so handlers added during the cycle wait for
    /// the next publish. A handler removed during the cycle is skipped if it has not run yet.
    /// Errors and panics are logged per handler and never stop the others.
    pub fn publish(&self) -> RefreshToken {
        let (token, snapshot) = {
            let mut state = self.state.lock();
            if state.shut_down {
                tracing::debug!("Publish ignored, refresh bus is shut down");
                return RefreshToken(state.token);
            }
            state.token += 1;
            let snapshot: Vec<(SubscriptionId, Handler)> = state
                .handlers
                .iter()
                .map(|(id, handler)| (*id, Arc::clone(handler)))
                .collect();
            (RefreshToken(state.token), snapshot)
        };

        tracing::debug!("Publishing refresh {} to {} subscribers", token, snapshot.len());

        for (id, handler) in snapshot {
            if !self.state.lock().handlers.contains_key(&id) {
                continue;
            }

            match panic::catch_unwind(AssertUnwindSafe(|| handler(token))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!("Refresh handler {:?} failed on {}: {}", id, token, e);
                }
                Err(_) => {
                    tracing::error!("Refresh handler {:?} panicked on {}", id, token);
                }
            }
        }

        token
    }

    /// Token of the most recent publish.
    pub fn token(&self) -> RefreshToken {
        RefreshToken(self.state.lock().token)
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().handlers.len()
    }

    /// Drop every subscription and ignore further publishes.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        let dropped = state.handlers.len();
        state.handlers.clear();
        state.shut_down = true;
        tracing::info!("Refresh bus shut down, {} subscriptions released", dropped);
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.lock().shut_down
    }
}

impl fmt::Debug for RefreshBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RefreshBus")
            .field("subscribers", &state.handlers.len())
            .field("token", &state.token)
            .field("shut_down", &state.shut_down)
            .finish()
    }
}
