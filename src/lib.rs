//! Revision Sync
//!
//! Client-side refresh and reconciliation core for a spaced-repetition study app: revision
//! lists kept in step with the backend, optimistic completion and postponement, topic
//! creation and editing, and a card-by-card review player.

pub mod backend;
pub mod bus;
pub mod config;
pub mod errors;
pub mod lists;
pub mod models;
pub mod mutations;
pub mod session;
pub mod stats;
pub mod topics;

pub use backend::{BackendSource, HttpBackend, ListKind, ListSource, RevisionBackend};
pub use bus::{RefreshBus, RefreshToken, SubscriptionId};
pub use config::Config;
pub use errors::{BackendError, ClientError};
pub use lists::{GroupingMode, RevisionList, RevisionListController};
pub use mutations::MutationCoordinator;
pub use session::{SessionPlayer, SessionState, SessionStats};
pub use stats::StatisticsView;
pub use topics::{TopicListView, TopicScope};

#[cfg(test)]
mod test_support;
