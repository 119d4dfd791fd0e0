//! Revision models matching the backend revision payloads.
//!
//! Topic revisions and flashcard revisions arrive with different shapes; both decode into
//! `RevisionItem`, tagged by `RevisionKind` so their ids stay unique.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Which backend table a revision lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionKind {
    Topic,
    Flashcard,
}

impl RevisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevisionKind::Topic => "topic",
            RevisionKind::Flashcard => "flashcard",
        }
    }
}

/// Opaque revision identifier, unique across topic and flashcard revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RevisionId {
    kind: RevisionKind,
    raw: i64,
}

impl RevisionId {
    pub fn topic(raw: i64) -> Self {
        Self {
            kind: RevisionKind::Topic,
            raw,
        }
    }

    pub fn flashcard(raw: i64) -> Self {
        Self {
            kind: RevisionKind::Flashcard,
            raw,
        }
    }

    pub fn kind(&self) -> RevisionKind {
        self.kind
    }

    /// Backend primary key, only meaningful together with `kind`.
    pub fn raw(&self) -> i64 {
        self.raw
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.raw)
    }
}

/// Weak reference to a topic: id plus denormalized title.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicRef {
    pub id: i64,
    #[serde(default)]
    pub title: String,
}

/// A single reviewable unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flashcard {
    pub id: i64,
    pub title: String,
    /// Markdown body, opaque to this crate
    pub content: String,
    pub topic: TopicRef,
}

/// Review state of one revision. Exactly one holds at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionStatus {
    Pending,
    Completed,
    Postponed,
}

impl RevisionStatus {
    /// Collapse the backend's two flags, completed taking precedence.
    pub fn from_flags(completed: bool, postponed: bool) -> Self {
        if completed {
            RevisionStatus::Completed
        } else if postponed {
            RevisionStatus::Postponed
        } else {
            RevisionStatus::Pending
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RevisionStatus::Completed)
    }

    pub fn is_postponed(&self) -> bool {
        matches!(self, RevisionStatus::Postponed)
    }
}

/// One scheduled review instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RevisionItemWire", into = "RevisionItemWire")]
pub struct RevisionItem {
    pub id: RevisionId,
    pub scheduled_date: NaiveDate,
    pub status: RevisionStatus,
    pub topic: TopicRef,
    /// Position in the topic's revision sequence, starting at 1
    pub day_number: u32,
    /// Present for flashcard revisions
    pub flashcard: Option<Flashcard>,
    pub completed_at: Option<DateTime<Utc>>,
    pub time_spent_seconds: Option<u64>,
    /// Navigation-only review: completing it never reaches the backend
    pub is_practice_mode: bool,
}

impl RevisionItem {
    /// Title to show for this item: the flashcard's when there is one, else the topic's.
    pub fn title(&self) -> &str {
        self.flashcard
            .as_ref()
            .map(|f| f.title.as_str())
            .unwrap_or(self.topic.title.as_str())
    }

    pub fn into_practice(mut self) -> Self {
        self.is_practice_mode = true;
        self
    }

    pub(crate) fn from_wire(
        wire: RevisionItemWire,
        fallback_topic: Option<&TopicRef>,
    ) -> Result<Self, String> {
        if wire.completed && wire.postponed {
            tracing::warn!(
                "Revision {} is flagged both completed and postponed, treating as completed",
                wire.id
            );
        }
        let status = RevisionStatus::from_flags(wire.completed, wire.postponed);

        let flashcard = wire
            .flashcard
            .map(|card| {
                let topic = card
                    .topic
                    .or_else(|| wire.topic.clone())
                    .or_else(|| fallback_topic.cloned())
                    .ok_or_else(|| format!("flashcard {} has no topic", card.id))?;
                Ok::<_, String>(Flashcard {
                    id: card.id,
                    title: card.title,
                    content: card.content,
                    topic,
                })
            })
            .transpose()?;

        let (id, topic) = match &flashcard {
            Some(card) => (RevisionId::flashcard(wire.id), card.topic.clone()),
            None => {
                let topic = wire
                    .topic
                    .or_else(|| fallback_topic.cloned())
                    .ok_or_else(|| format!("revision {} has neither topic nor flashcard", wire.id))?;
                (RevisionId::topic(wire.id), topic)
            }
        };

        Ok(Self {
            id,
            scheduled_date: wire.scheduled_date,
            status,
            topic,
            day_number: wire.day_number.max(1),
            flashcard,
            completed_at: wire.completed_at,
            time_spent_seconds: wire.time_spent_seconds,
            is_practice_mode: wire.is_practice_mode,
        })
    }
}

/// Flashcard revisions of one topic, in backend order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FlashcardGroupWire")]
pub struct FlashcardGroup {
    pub topic: TopicRef,
    pub flashcards: Vec<RevisionItem>,
    /// Always equal to `flashcards.len()`
    pub flashcard_count: usize,
}

impl FlashcardGroup {
    pub fn new(topic: TopicRef, flashcards: Vec<RevisionItem>) -> Self {
        let flashcard_count = flashcards.len();
        Self {
            topic,
            flashcards,
            flashcard_count,
        }
    }

    /// Remove a revision, keeping the count in step. Returns whether it was present.
    pub fn remove(&mut self, id: &RevisionId) -> bool {
        let before = self.flashcards.len();
        self.flashcards.retain(|item| &item.id != id);
        self.flashcard_count = self.flashcards.len();
        self.flashcard_count != before
    }
}

/// Payload of the revision list endpoints, in any of the shapes the backend emits.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "RevisionFeedWire")]
pub struct RevisionFeed {
    /// Ungrouped revisions, in backend order
    pub revisions: Vec<RevisionItem>,
    /// Pre-grouped flashcard revisions, in backend order
    pub flashcard_groups: Vec<FlashcardGroup>,
}

impl RevisionFeed {
    pub fn flat(revisions: Vec<RevisionItem>) -> Self {
        Self {
            revisions,
            flashcard_groups: Vec::new(),
        }
    }

    /// Every revision in backend order: ungrouped ones first, then each group's.
    pub fn into_flat(self) -> Vec<RevisionItem> {
        let mut items = self.revisions;
        for group in self.flashcard_groups {
            items.extend(group.flashcards);
        }
        items
    }

    /// Split into topic revisions and flashcard groups.
    ///
    /// Topic revisions keep backend order and never join a group. Flashcard revisions merge
    /// into one group per topic id, in order of first occurrence; within a group the backend
    /// order is kept and the count is recomputed.
    pub fn into_grouped(self) -> (Vec<RevisionItem>, Vec<FlashcardGroup>) {
        let mut topic_revisions = Vec::new();
        let mut groups: Vec<FlashcardGroup> = Vec::new();
        for item in self.into_flat() {
            if item.id.kind() == RevisionKind::Topic {
                topic_revisions.push(item);
                continue;
            }
            match groups.iter_mut().find(|g| g.topic.id == item.topic.id) {
                Some(group) => group.flashcards.push(item),
                None => groups.push(FlashcardGroup {
                    topic: item.topic.clone(),
                    flashcards: vec![item],
                    flashcard_count: 0,
                }),
            }
        }
        for group in &mut groups {
            group.flashcard_count = group.flashcards.len();
        }
        (topic_revisions, groups)
    }
}

// ==================== WIRE SHAPES ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashcardWire {
    id: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    topic: Option<TopicRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionItemWire {
    id: i64,
    scheduled_date: NaiveDate,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    postponed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    topic: Option<TopicRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    flashcard: Option<FlashcardWire>,
    #[serde(default = "first_day")]
    day_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_spent_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    is_practice_mode: bool,
}

fn first_day() -> u32 {
    1
}

impl TryFrom<RevisionItemWire> for RevisionItem {
    type Error = String;

    fn try_from(wire: RevisionItemWire) -> Result<Self, Self::Error> {
        RevisionItem::from_wire(wire, None)
    }
}

impl From<RevisionItem> for RevisionItemWire {
    fn from(item: RevisionItem) -> Self {
        let flashcard = item.flashcard.map(|card| FlashcardWire {
            id: card.id,
            title: card.title,
            content: card.content,
            topic: Some(card.topic),
        });
        Self {
            id: item.id.raw(),
            scheduled_date: item.scheduled_date,
            completed: item.status.is_completed(),
            postponed: item.status.is_postponed(),
            topic: Some(item.topic),
            flashcard,
            day_number: item.day_number,
            completed_at: item.completed_at,
            time_spent_seconds: item.time_spent_seconds,
            is_practice_mode: item.is_practice_mode,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FlashcardGroupWire {
    topic: TopicRef,
    #[serde(default)]
    flashcards: Vec<RevisionItemWire>,
    #[serde(default)]
    flashcard_count: Option<usize>,
}

impl TryFrom<FlashcardGroupWire> for FlashcardGroup {
    type Error = String;

    fn try_from(wire: FlashcardGroupWire) -> Result<Self, Self::Error> {
        let flashcards = wire
            .flashcards
            .into_iter()
            .map(|card| RevisionItem::from_wire(card, Some(&wire.topic)))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(reported) = wire.flashcard_count {
            if reported != flashcards.len() {
                tracing::debug!(
                    "Topic {} reported {} flashcards but sent {}",
                    wire.topic.id,
                    reported,
                    flashcards.len()
                );
            }
        }

        Ok(FlashcardGroup::new(wire.topic, flashcards))
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RevisionFeedWire {
    Flat(Vec<RevisionItem>),
    Grouped {
        topic_revisions: Option<Vec<RevisionItem>>,
        flashcard_topics: Option<Vec<FlashcardGroup>>,
        /// Older ungrouped flashcard format
        flashcard_revisions: Option<Vec<RevisionItem>>,
    },
}

impl TryFrom<RevisionFeedWire> for RevisionFeed {
    type Error = String;

    fn try_from(wire: RevisionFeedWire) -> Result<Self, Self::Error> {
        match wire {
            RevisionFeedWire::Flat(revisions) => Ok(RevisionFeed::flat(revisions)),
            RevisionFeedWire::Grouped {
                topic_revisions: None,
                flashcard_topics: None,
                flashcard_revisions: None,
            } => Err("revision feed object has no known revision keys".to_string()),
            RevisionFeedWire::Grouped {
                topic_revisions,
                flashcard_topics,
                flashcard_revisions,
            } => {
                let mut revisions = topic_revisions.unwrap_or_default();
                revisions.extend(flashcard_revisions.unwrap_or_default());
                Ok(RevisionFeed {
                    revisions,
                    flashcard_groups: flashcard_topics.unwrap_or_default(),
                })
            }
        }
    }
}
