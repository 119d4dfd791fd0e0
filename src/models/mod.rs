//! Data models for the revision client.
//!
//! These models match the backend JSON payloads, normalised where the wire format is loose.

mod revision;
mod statistics;
mod topic;

pub use revision::{
    Flashcard, FlashcardGroup, RevisionFeed, RevisionId, RevisionItem, RevisionKind,
    RevisionStatus, TopicRef,
};
pub use statistics::*;
pub use topic::*;
