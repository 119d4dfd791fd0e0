//! Revision lists mirrored from the backend.
//!
//! Each `RevisionListController` owns one list ("today", "missed", "completed",
//! "schedule"), refetches it on every refresh signal and tracks optimistic removals.

mod controller;
mod gate;

pub use controller::*;
pub(crate) use controller::RemovalMark;
pub(crate) use gate::*;

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::{FlashcardGroup, RevisionFeed, RevisionId, RevisionItem, RevisionStatus};

/// How a controller shapes the backend feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupingMode {
    Flat,
    GroupedByTopic,
}

/// The items a controller currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum RevisionList {
    Flat(Vec<RevisionItem>),
    /// Topic revisions stand alone; flashcard revisions are grouped by topic.
    Grouped {
        topic_revisions: Vec<RevisionItem>,
        groups: Vec<FlashcardGroup>,
    },
}

impl RevisionList {
    pub fn empty(mode: GroupingMode) -> Self {
        match mode {
            GroupingMode::Flat => RevisionList::Flat(Vec::new()),
            GroupingMode::GroupedByTopic => RevisionList::Grouped {
                topic_revisions: Vec::new(),
                groups: Vec::new(),
            },
        }
    }

    pub fn from_feed(feed: RevisionFeed, mode: GroupingMode) -> Self {
        match mode {
            GroupingMode::Flat => RevisionList::Flat(feed.into_flat()),
            GroupingMode::GroupedByTopic => {
                let (topic_revisions, groups) = feed.into_grouped();
                RevisionList::Grouped {
                    topic_revisions,
                    groups,
                }
            }
        }
    }

    /// Number of revisions, counting every card of every group.
    pub fn len(&self) -> usize {
        match self {
            RevisionList::Flat(items) => items.len(),
            RevisionList::Grouped {
                topic_revisions,
                groups,
            } => topic_revisions.len() + groups.iter().map(|g| g.flashcards.len()).sum::<usize>(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All revisions in display order: topic revisions before flashcard groups.
    pub fn iter(&self) -> Box<dyn Iterator<Item = &RevisionItem> + '_> {
        match self {
            RevisionList::Flat(items) => Box::new(items.iter()),
            RevisionList::Grouped {
                topic_revisions,
                groups,
            } => Box::new(
                topic_revisions
                    .iter()
                    .chain(groups.iter().flat_map(|g| g.flashcards.iter())),
            ),
        }
    }

    pub fn contains(&self, id: &RevisionId) -> bool {
        self.iter().any(|item| &item.id == id)
    }

    pub fn get(&self, id: &RevisionId) -> Option<&RevisionItem> {
        self.iter().find(|item| &item.id == id)
    }

    pub fn ids(&self) -> Vec<RevisionId> {
        self.iter().map(|item| item.id).collect()
    }

    pub fn as_flat(&self) -> Option<&[RevisionItem]> {
        match self {
            RevisionList::Flat(items) => Some(items),
            RevisionList::Grouped { .. } => None,
        }
    }

    pub fn as_groups(&self) -> Option<&[FlashcardGroup]> {
        match self {
            RevisionList::Flat(_) => None,
            RevisionList::Grouped { groups, .. } => Some(groups),
        }
    }

    /// Ungrouped topic revisions of a grouped list.
    pub fn topic_revisions(&self) -> Option<&[RevisionItem]> {
        match self {
            RevisionList::Flat(_) => None,
            RevisionList::Grouped {
                topic_revisions, ..
            } => Some(topic_revisions),
        }
    }

    /// Remove one revision. Groups keep their count in step and disappear once empty.
    pub fn remove(&mut self, id: &RevisionId) -> bool {
        fn remove_from(items: &mut Vec<RevisionItem>, id: &RevisionId) -> bool {
            let before = items.len();
            items.retain(|item| &item.id != id);
            items.len() != before
        }

        match self {
            RevisionList::Flat(items) => remove_from(items, id),
            RevisionList::Grouped {
                topic_revisions,
                groups,
            } => {
                if remove_from(topic_revisions, id) {
                    return true;
                }
                let removed = groups.iter_mut().any(|group| group.remove(id));
                groups.retain(|group| !group.flashcards.is_empty());
                removed
            }
        }
    }

    /// Revisions still waiting for review, excluding postponed ones.
    pub fn pending(&self) -> Vec<RevisionItem> {
        self.with_status(RevisionStatus::Pending)
    }

    pub fn postponed(&self) -> Vec<RevisionItem> {
        self.with_status(RevisionStatus::Postponed)
    }

    fn with_status(&self, status: RevisionStatus) -> Vec<RevisionItem> {
        self.iter()
            .filter(|item| item.status == status)
            .cloned()
            .collect()
    }

    pub fn filtered(&self, filter: &ScheduleFilter) -> Vec<RevisionItem> {
        self.iter()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect()
    }

    /// Bucket revisions by scheduled date for the calendar view.
    pub fn by_date(&self) -> BTreeMap<NaiveDate, Vec<RevisionItem>> {
        let mut days: BTreeMap<NaiveDate, Vec<RevisionItem>> = BTreeMap::new();
        for item in self.iter() {
            days.entry(item.scheduled_date)
                .or_default()
                .push(item.clone());
        }
        days
    }
}

/// Criteria for narrowing the revision schedule. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleFilter {
    /// Exact topic title
    pub topic_title: Option<String>,
    /// Inclusive lower bound on the scheduled date
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on the scheduled date
    pub to: Option<NaiveDate>,
    pub status: Option<RevisionStatus>,
}

impl ScheduleFilter {
    pub fn matches(&self, item: &RevisionItem) -> bool {
        if let Some(title) = &self.topic_title {
            if &item.topic.title != title {
                return false;
            }
        }
        if let Some(from) = self.from {
            if item.scheduled_date < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if item.scheduled_date > to {
                return false;
            }
        }
        match self.status {
            Some(status) => item.status == status,
            None => true,
        }
    }
}
