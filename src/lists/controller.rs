use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;

use super::{GroupingMode, LoadGate, LoadTicket, RevisionList};
use crate::backend::{BackendSource, ListKind, ListSource, RevisionBackend};
use crate::bus::{RefreshBus, RefreshToken, SubscriptionId};
use crate::errors::ClientError;
use crate::models::RevisionId;

struct ListState {
    items: RevisionList,
    animating: BTreeSet<RevisionId>,
    loading: bool,
    error: Option<ClientError>,
    gate: LoadGate,
}

struct Inner {
    kind: ListKind,
    grouping: GroupingMode,
    source: Arc<dyn ListSource>,
    state: Mutex<ListState>,
    changes: watch::Sender<u64>,
    refreshes: AtomicU64,
    last_token: AtomicU64,
    subscription: Mutex<Option<(RefreshBus, SubscriptionId)>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RemovalMark {
    Marked,
    /// Another action on this revision is still in flight
    AlreadyMarked,
    Absent,
}

/// Keeps one revision list in step with the backend.
///
/// Cloning yields another handle to the same list. Overlapping loads resolve
/// last-initiated-wins: a result from a superseded load is dropped on arrival.
#[derive(Clone)]
pub struct RevisionListController {
    inner: Arc<Inner>,
}

impl RevisionListController {
    pub fn new(kind: ListKind, source: Arc<dyn ListSource>, grouping: GroupingMode) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                kind,
                grouping,
                source,
                state: Mutex::new(ListState {
                    items: RevisionList::empty(grouping),
                    animating: BTreeSet::new(),
                    loading: false,
                    error: None,
                    gate: LoadGate::default(),
                }),
                changes,
                refreshes: AtomicU64::new(0),
                last_token: AtomicU64::new(0),
                subscription: Mutex::new(None),
            }),
        }
    }

    /// Controller fetching `kind` from `backend`.
    pub fn for_backend(
        backend: Arc<dyn RevisionBackend>,
        kind: ListKind,
        grouping: GroupingMode,
    ) -> Self {
        Self::new(kind, Arc::new(BackendSource::new(backend, kind)), grouping)
    }

    pub fn kind(&self) -> ListKind {
        self.inner.kind
    }

    pub fn grouping(&self) -> GroupingMode {
        self.inner.grouping
    }

    /// Fetch the list and replace the current items.
    ///
    /// On failure the previous items stay in place and the error is kept for the view.
    /// If a newer load started meanwhile, this one returns the current snapshot unchanged.
    pub async fn load(&self) -> Result<RevisionList, ClientError> {
        let ticket = self.inner.begin_load();
        self.inner.finish_load(ticket).await
    }

    /// Mark `id` as animating out. Returns false if it is absent or already marked.
    pub fn begin_optimistic_removal(&self, id: RevisionId) -> bool {
        self.mark_removal(id) == RemovalMark::Marked
    }

    pub(crate) fn mark_removal(&self, id: RevisionId) -> RemovalMark {
        let mark = {
            let mut state = self.inner.state.lock();
            if !state.items.contains(&id) {
                RemovalMark::Absent
            } else if state.animating.insert(id) {
                RemovalMark::Marked
            } else {
                RemovalMark::AlreadyMarked
            }
        };
        if mark == RemovalMark::Marked {
            tracing::debug!("{} list: {} animating out", self.inner.kind, id);
            self.inner.notify();
        }
        mark
    }

    /// Drop the animating marker for `id`, leaving the item visible.
    pub fn cancel_optimistic_removal(&self, id: RevisionId) {
        let cleared = self.inner.state.lock().animating.remove(&id);
        if cleared {
            tracing::debug!("{} list: {} restored", self.inner.kind, id);
            self.inner.notify();
        }
    }

    /// Remove `id` and its marker. A no-op if a reload already dropped it.
    pub fn commit_removal(&self, id: RevisionId) {
        let changed = {
            let mut state = self.inner.state.lock();
            let unmarked = state.animating.remove(&id);
            let removed = state.items.remove(&id);
            unmarked || removed
        };
        if changed {
            self.inner.notify();
        }
    }

    /// Refresh-bus entry point: counts the emission and starts a background load.
    pub fn on_refresh(&self, token: RefreshToken) -> Result<(), ClientError> {
        self.inner.on_refresh(token)
    }

    /// Subscribe to `bus`, replacing any earlier subscription.
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

    pub fn items(&self) -> RevisionList {
        self.inner.state.lock().items.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.lock().loading
    }

    /// Error from the most recent completed load, cleared by the next success.
    pub fn error(&self) -> Option<ClientError> {
        self.inner.state.lock().error.clone()
    }

    pub fn is_animating(&self, id: &RevisionId) -> bool {
        self.inner.state.lock().animating.contains(id)
    }

    pub fn animating(&self) -> Vec<RevisionId> {
        self.inner.state.lock().animating.iter().copied().collect()
    }

    /// Number of refresh emissions this controller has reacted to.
    pub fn refresh_count(&self) -> u64 {
        self.inner.refreshes.load(Ordering::SeqCst)
    }

    pub fn last_refresh_token(&self) -> RefreshToken {
        RefreshToken::from(self.inner.last_token.load(Ordering::SeqCst))
    }

    /// Receiver bumped on every visible state change.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.inner.changes.subscribe()
    }

    /// Wait until no load is in flight.
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

    async fn finish_load(&self, ticket: LoadTicket) -> Result<RevisionList, ClientError> {
        let _pending = PendingLoad {
            inner: self,
            ticket,
        };
        let fetched = self.source.fetch().await;

        let outcome = {
            let mut state = self.state.lock();
            if !state.gate.is_current(ticket) {
                tracing::debug!("{} list: discarding superseded load", self.kind);
                return Ok(state.items.clone());
            }
            state.loading = false;

            match fetched {
                Ok(feed) => {
                    state.items = RevisionList::from_feed(feed, self.grouping);
                    state.animating.clear();
                    state.error = None;
                    tracing::debug!("{} list: loaded {} revisions", self.kind, state.items.len());
                    Ok(state.items.clone())
                }
                Err(e) => {
                    tracing::warn!("{} list: load failed, keeping stale items: {}", self.kind, e);
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
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.last_token.store(token.value(), Ordering::SeqCst);

        let handle = Handle::try_current().map_err(|_| {
            ClientError::FetchFailed(format!("no runtime to reload the {} list", self.kind))
        })?;
        let ticket = self.begin_load();
        let inner = Arc::clone(self);
        handle.spawn(async move {
            // Failures are already recorded on the controller.
            let _ = inner.finish_load(ticket).await;
        });
        Ok(())
    }

    // Never call with `state` locked: `settled` reads the state from inside the watch lock.
    fn notify(&self) {
        self.changes.send_modify(|version| *version += 1);
    }
}

/// Clears `loading` when a current load is dropped before its fetch resolves.
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
            tracing::debug!("{} list: load cancelled before it resolved", self.inner.kind);
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

impl fmt::Debug for RevisionListController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("RevisionListController")
            .field("kind", &self.inner.kind)
            .field("grouping", &self.inner.grouping)
            .field("items", &state.items.len())
            .field("animating", &state.animating.len())
            .field("loading", &state.loading)
            .finish()
    }
}
