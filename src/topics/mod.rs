//! Topic listings kept fresh by the refresh bus.
//!
//! `TopicListView` mirrors either every topic or only those created today. It follows the
//! same load rules as the revision lists: last-initiated-wins, stale data kept on failure.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::backend::RevisionBackend;
use crate::bus::{RefreshBus, RefreshToken, SubscriptionId};
use crate::errors::{BackendError, ClientError};
use crate::lists::{LoadGate, LoadTicket};
use crate::models::Topic;

/// Which topic listing a view mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicScope {
    All,
    CreatedToday,
}

impl TopicScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicScope::All => "all topics",
            TopicScope::CreatedToday => "today's topics",
        }
    }
}

impl fmt::Display for TopicScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Default)]
struct TopicState {
    topics: Vec<Topic>,
    loading: bool,
    error: Option<ClientError>,
    gate: LoadGate,
}

struct Inner {
    scope: TopicScope,
    backend: Arc<dyn RevisionBackend>,
    state: Mutex<TopicState>,
    changes: watch::Sender<u64>,
    subscription: Mutex<Option<(RefreshBus, SubscriptionId)>>,
}

#[derive(Clone)]
pub struct TopicListView {
    inner: Arc<Inner>,
}

impl TopicListView {
    pub fn new(backend: Arc<dyn RevisionBackend>, scope: TopicScope) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                scope,
                backend,
                state: Mutex::new(TopicState::default()),
                changes,
                subscription: Mutex::new(None),
            }),
        }
    }

    pub fn scope(&self) -> TopicScope {
        self.inner.scope
    }

    /// Fetch the listing and replace the current topics. A failure keeps the previous ones.
    pub async fn load(&self) -> Result<Vec<Topic>, ClientError> {
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

    pub fn topics(&self) -> Vec<Topic> {
        self.inner.state.lock().topics.clone()
    }

    pub fn get(&self, topic_id: i64) -> Option<Topic> {
        self.inner
            .state
            .lock()
            .topics
            .iter()
            .find(|topic| topic.id == topic_id)
            .cloned()
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

    async fn fetch(&self) -> Result<Vec<Topic>, BackendError> {
        match self.scope {
            TopicScope::All => self.backend.all_topics().await,
            TopicScope::CreatedToday => self.backend.topics_today().await,
        }
    }

    async fn finish_load(&self, ticket: LoadTicket) -> Result<Vec<Topic>, ClientError> {
        let _pending = PendingLoad {
            inner: self,
            ticket,
        };
        let fetched = self.fetch().await;

        let outcome = {
            let mut state = self.state.lock();
            if !state.gate.is_current(ticket) {
                tracing::debug!("{}: discarding superseded load", self.scope);
                return Ok(state.topics.clone());
            }
            state.loading = false;
            match fetched {
                Ok(topics) => {
                    tracing::debug!("{}: loaded {} topics", self.scope, topics.len());
                    state.topics = topics;
                    state.error = None;
                    Ok(state.topics.clone())
                }
                Err(e) => {
                    tracing::warn!("{}: load failed, keeping stale topics: {}", self.scope, e);
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
            ClientError::FetchFailed(format!("no runtime to reload {} on {}", self.scope, token))
        })?;
        let ticket = self.begin_load();
        let inner = Arc::clone(self);
        handle.spawn(async move {
            let _ = inner.finish_load(ticket).await;
        });
        Ok(())
    }

    // `settled` reads the state inside the watch lock, so never call this with `state` held.
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
            tracing::debug!("{}: load cancelled before it resolved", self.inner.scope);
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

impl fmt::Debug for TopicListView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("TopicListView")
            .field("scope", &self.inner.scope)
            .field("topics", &state.topics.len())
            .field("loading", &state.loading)
            .finish()
    }
}
