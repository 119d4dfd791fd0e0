//! Dashboard statistics kept fresh by the refresh bus.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::backend::RevisionBackend;
use crate::bus::{RefreshBus, RefreshToken, SubscriptionId};
use crate::errors::ClientError;
use crate::lists::{LoadGate, LoadTicket};
use crate::models::Statistics;

#[derive(Default)]
struct StatsState {
    snapshot: Option<Statistics>,
    loading: bool,
    error: Option<ClientError>,
    gate: LoadGate,
}

struct Inner {
    backend: Arc<dyn RevisionBackend>,
    state: Mutex<StatsState>,
    changes: watch::Sender<u64>,
    subscription: Mutex<Option<(RefreshBus, SubscriptionId)>>,
}

/// Last known statistics, re-fetched on every refresh.
#[derive(Clone)]
pub struct StatisticsView {
    inner: Arc<Inner>,
}

impl StatisticsView {
    pub fn new(backend: Arc<dyn RevisionBackend>) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                backend,
                state: Mutex::new(StatsState::default()),
                changes,
                subscription: Mutex::new(None),
            }),
        }
    }

    /// Fetch statistics. A failure keeps the previous snapshot.
    pub async fn load(&self) -> Result<Option<Statistics>, ClientError> {
        let ticket = self.inner.begin_load();
        self.inner.finish_load(ticket).await
    }

    pub fn attach(&self, bus: &RefreshBus) {
        self.detach();
        let weak = Arc::downgrade(&self.inner);
        let id = bus.subscribe(move |token| match weak.upgrade() {
            Some(inner) => inner.on_refresh(token),
            None => Ok(()),
        });
        *self.inner.subscription.lock() = Some((bus.clone(), id));
    }

    pub fn detach(&self) {
        let subscription = self.inner.subscription.lock().take();
        if let Some((bus, id)) = subscription {
            bus.unsubscribe(id);
        }
    }

    pub fn snapshot(&self) -> Option<Statistics> {
        self.inner.state.lock().snapshot.clone()
    }

    pub fn error(&self) -> Option<ClientError> {
        self.inner.state.lock().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.lock().loading
    }

    pub fn changes(&self) -> watch::Receiver<u64> {
        self.inner.changes.subscribe()
    }

    pub async fn settled(&self) {
        let mut rx = self.inner.changes.subscribe();
        let _ = rx.wait_for(|_| !self.is_loading()).await;
    }
}

impl Inner {
    fn begin_load(&self) -> LoadTicket {
        let ticket = {
            let mut state = self.state.lock();
            state.loading = true;
            state.gate.issue()
        };
        self.notify();
        ticket
    }

    async fn finish_load(&self, ticket: LoadTicket) -> Result<Option<Statistics>, ClientError> {
        let _pending = PendingLoad {
            inner: self,
            ticket,
        };
        let fetched = self.backend.statistics().await;

        let outcome = {
            let mut state = self.state.lock();
            if !state.gate.is_current(ticket) {
                tracing::debug!("Discarding superseded statistics load");
                return Ok(state.snapshot.clone());
            }
            state.loading = false;
            match fetched {
                Ok(stats) => {
                    state.snapshot = Some(stats);
                    state.error = None;
                    Ok(state.snapshot.clone())
                }
                Err(e) => {
                    tracing::warn!("Statistics load failed: {}", e);
                    let err = ClientError::fetch(&e);
                    state.error = Some(err.clone());
                    Err(err)
                }
            }
        };

        self.notify();
        outcome
    }

    fn on_refresh(self: &Arc<Self>, token: RefreshToken) -> Result<(), ClientError> {
        let handle = Handle::try_current().map_err(|_| {
            ClientError::FetchFailed(format!("no runtime to reload statistics on {}", token))
        })?;
        let ticket = self.begin_load();
        let inner = Arc::clone(self);
        handle.spawn(async move {
            let _ = inner.finish_load(ticket).await;
        });
        Ok(())
    }

    fn notify(&self) {
        self.changes.send_modify(|version| *version += 1);
    }
}

struct PendingLoad<'a> {
    inner: &'a Inner,
    ticket: LoadTicket,
}

impl Drop for PendingLoad<'_> {
    fn drop(&mut self) {
        let abandoned = {
            let mut state = self.inner.state.lock();
            let abandoned = state.loading && state.gate.is_current(self.ticket);
            if abandoned {
                state.loading = false;
            }
            abandoned
        };
        if abandoned {
            tracing::debug!("Statistics load cancelled before it resolved");
            self.inner.notify();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some((bus, id)) = self.subscription.get_mut().take() {
            bus.unsubscribe(id);
        }
    }
}
