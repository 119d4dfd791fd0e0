//! Step-by-step review of a fixed set of revisions.
//!
//! The player copies its items at construction and never sees later list refreshes.

use std::time::Duration;

use tokio::time::Instant;

use crate::errors::ClientError;
use crate::models::{RevisionItem, StudySessionId};
use crate::mutations::{MutationCoordinator, RevisionAction};

/// Where the player is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Showing the card at this index
    Active(usize),
    Ended,
    /// Constructed without items; nothing to show
    Empty,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionState::Active(_))
    }
}

/// Counters for the summary screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub total: usize,
    pub completed: usize,
    pub postponed: usize,
    /// Time billed to cards that were acted on
    pub time_spent: Duration,
}

pub struct SessionPlayer {
    items: Vec<RevisionItem>,
    state: SessionState,
    stats: SessionStats,
    card_started: Instant,
    coordinator: MutationCoordinator,
    tracking: Option<StudySessionId>,
}

impl SessionPlayer {
    pub fn new(items: Vec<RevisionItem>, coordinator: MutationCoordinator) -> Self {
        let state = if items.is_empty() {
            SessionState::Empty
        } else {
            SessionState::Active(0)
        };
        Self {
            stats: SessionStats {
                total: items.len(),
                ..Default::default()
            },
            items,
            state,
            card_started: Instant::now(),
            coordinator,
            tracking: None,
        }
    }

    /// Like `new`, and also opens a backend study session when there is something to review.
    pub async fn start(items: Vec<RevisionItem>, coordinator: MutationCoordinator) -> Self {
        let mut player = Self::new(items, coordinator);
        if player.state != SessionState::Empty {
            player.tracking = player.coordinator.open_study_session().await;
            player.card_started = Instant::now();
        }
        player
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn items(&self) -> &[RevisionItem] {
        &self.items
    }

    pub fn current(&self) -> Option<&RevisionItem> {
        match self.state {
            SessionState::Active(index) => self.items.get(index),
            _ => None,
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn tracking_session(&self) -> Option<&StudySessionId> {
        self.tracking.as_ref()
    }

    /// Time on the current card so far.
    pub fn elapsed(&self) -> Duration {
        self.card_started.elapsed()
    }

    /// Advance one card, ending after the last.
    pub fn next(&mut self) {
        if let SessionState::Active(index) = self.state {
            if index + 1 < self.items.len() {
                self.move_to(index + 1);
            } else {
                tracing::debug!("Review session reached its end");
                self.state = SessionState::Ended;
            }
        }
    }

    /// Go back one card. A no-op on the first card.
    pub fn previous(&mut self) {
        if let SessionState::Active(index) = self.state {
            if index > 0 {
                self.move_to(index - 1);
            }
        }
    }

    /// "Got it": complete the current card and advance.
    ///
    /// On a backend failure the player stays on the same card and returns the error.
    pub async fn mark_done(&mut self) -> Result<(), ClientError> {
        self.act(RevisionAction::Complete).await
    }

    /// Postpone the current card and advance.
    pub async fn postpone_card(&mut self) -> Result<(), ClientError> {
        self.act(RevisionAction::Postpone).await
    }

    /// End the session from any state and close the tracking session, if open.
    pub async fn exit(&mut self) {
        self.state = SessionState::Ended;
        self.close_tracking().await;
    }

    async fn act(&mut self, action: RevisionAction) -> Result<(), ClientError> {
        let SessionState::Active(index) = self.state else {
            return Ok(());
        };
        let (id, practice) = match self.items.get(index) {
            Some(item) => (item.id, item.is_practice_mode),
            None => return Ok(()),
        };
        let elapsed = self.card_started.elapsed();

        if !practice {
            self.coordinator
                .apply(action, None, id, Some(elapsed))
                .await?;
        }

        match action {
            RevisionAction::Complete => self.stats.completed += 1,
            RevisionAction::Postpone => self.stats.postponed += 1,
        }
        self.stats.time_spent += elapsed;

        self.next();
        if self.state == SessionState::Ended {
            self.close_tracking().await;
        }
        Ok(())
    }

    fn move_to(&mut self, index: usize) {
        self.state = SessionState::Active(index);
        self.card_started = Instant::now();
    }

    async fn close_tracking(&mut self) {
        if let Some(id) = self.tracking.take() {
            self.coordinator.close_study_session(&id).await;
        }
    }
}
