//! Fixtures shared by unit and integration tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::backend::{ListKind, ListSource, RevisionBackend};
use crate::errors::BackendError;
use crate::models::{
    CreateTopicRequest, Flashcard, RevisionFeed, RevisionId, RevisionItem, RevisionStatus,
    SourceType, Statistics, StudySessionId, Topic, TopicCreationSummary, TopicRef,
    UpdateTopicRequest, UploadFile, UploadLinkRequest,
};

pub(crate) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
}

/// Pending topic revision `id` of topic `topic_id`, titled "Topic {topic_id}".
pub(crate) fn revision(id: i64, topic_id: i64) -> RevisionItem {
    RevisionItem {
        id: RevisionId::topic(id),
        scheduled_date: today(),
        status: RevisionStatus::Pending,
        topic: TopicRef {
            id: topic_id,
            title: format!("Topic {}", topic_id),
        },
        day_number: 1,
        flashcard: None,
        completed_at: None,
        time_spent_seconds: None,
        is_practice_mode: false,
    }
}

/// Pending flashcard revision `id` of topic `topic_id`.
pub(crate) fn flashcard_revision(id: i64, topic_id: i64) -> RevisionItem {
    let topic = TopicRef {
        id: topic_id,
        title: format!("Topic {}", topic_id),
    };
    RevisionItem {
        id: RevisionId::flashcard(id),
        flashcard: Some(Flashcard {
            id: id * 10,
            title: format!("Card {}", id),
            content: format!("Answer {}", id),
            topic: topic.clone(),
        }),
        topic,
        ..revision(id, topic_id)
    }
}

pub(crate) fn with_status(mut item: RevisionItem, status: RevisionStatus) -> RevisionItem {
    item.status = status;
    item
}

pub(crate) fn on(mut item: RevisionItem, date: &str) -> RevisionItem {
    item.scheduled_date = date.parse().unwrap();
    item
}

/// Manual topic `id` created at 08:00 on `date`.
pub(crate) fn topic_created(id: i64, title: &str, date: NaiveDate) -> Topic {
    let created = Utc.from_utc_datetime(&date.and_hms_opt(8, 0, 0).unwrap());
    Topic {
        id,
        title: title.to_string(),
        content: format!("Notes on {}", title),
        resource_url: None,
        source_type: SourceType::Manual,
        created_at: Some(created),
        updated_at: Some(created),
    }
}

/// One mutation the scripted backend accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedMutation {
    pub action: &'static str,
    pub id: RevisionId,
    pub time_spent: Option<Duration>,
}

/// In-memory stand-in for the REST backend that applies mutations to its own lists.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    lists: Mutex<HashMap<ListKind, Vec<RevisionItem>>>,
    failing_fetches: Mutex<HashSet<ListKind>>,
    fail_mutations: AtomicBool,
    fail_sessions: AtomicBool,
    fail_statistics: AtomicBool,
    stall_statistics: AtomicBool,
    topics: Mutex<Vec<Topic>>,
    fail_topics: AtomicBool,
    topic_fetches: AtomicUsize,
    fetches: Mutex<HashMap<ListKind, usize>>,
    mutations: Mutex<Vec<RecordedMutation>>,
    calls: Mutex<Vec<String>>,
    statistics: Mutex<Statistics>,
    next_session: AtomicU64,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set_list(&self, kind: ListKind, items: Vec<RevisionItem>) {
        self.lists.lock().insert(kind, items);
    }

    pub(crate) fn set_statistics(&self, stats: Statistics) {
        *self.statistics.lock() = stats;
    }

    pub(crate) fn set_topics(&self, topics: Vec<Topic>) {
        *self.topics.lock() = topics;
    }

    pub(crate) fn fail_topics(&self, fail: bool) {
        self.fail_topics.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn topic_fetch_count(&self) -> usize {
        self.topic_fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_fetch(&self, kind: ListKind, fail: bool) {
        let mut failing = self.failing_fetches.lock();
        if fail {
            failing.insert(kind);
        } else {
            failing.remove(&kind);
        }
    }

    pub(crate) fn fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_sessions(&self, fail: bool) {
        self.fail_sessions.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_statistics(&self, fail: bool) {
        self.fail_statistics.store(fail, Ordering::SeqCst);
    }

    /// While set, `statistics()` never resolves.
    pub(crate) fn stall_statistics(&self, stall: bool) {
        self.stall_statistics.store(stall, Ordering::SeqCst);
    }

    pub(crate) fn fetch_count(&self, kind: ListKind) -> usize {
        self.fetches.lock().get(&kind).copied().unwrap_or(0)
    }

    pub(crate) fn mutations(&self) -> Vec<RecordedMutation> {
        self.mutations.lock().clone()
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn fetch(&self, kind: ListKind) -> Result<Vec<RevisionItem>, BackendError> {
        *self.fetches.lock().entry(kind).or_default() += 1;
        if self.failing_fetches.lock().contains(&kind) {
            return Err(BackendError::Status {
                status: 503,
                message: format!("{} unavailable", kind),
            });
        }
        Ok(self.lists.lock().get(&kind).cloned().unwrap_or_default())
    }

    fn fetch_topics(&self) -> Result<Vec<Topic>, BackendError> {
        self.topic_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_topics.load(Ordering::SeqCst) {
            return Err(BackendError::Transport("topics unavailable".to_string()));
        }
        Ok(self.topics.lock().clone())
    }

    fn mutate(
        &self,
        action: &'static str,
        id: RevisionId,
        time_spent: Option<Duration>,
    ) -> Result<(), BackendError> {
        self.calls.lock().push(format!("{} {}", action, id));
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(BackendError::Status {
                status: 500,
                message: format!("cannot {} {}", action, id),
            });
        }

        let mut lists = self.lists.lock();
        let mut moved = None;
        for kind in [ListKind::Today, ListKind::Missed] {
            if let Some(items) = lists.get_mut(&kind) {
                if let Some(pos) = items.iter().position(|item| item.id == id) {
                    moved = Some(items.remove(pos));
                }
            }
        }
        let status = if action == "complete" {
            RevisionStatus::Completed
        } else {
            RevisionStatus::Postponed
        };
        if let Some(schedule) = lists.get_mut(&ListKind::Schedule) {
            for item in schedule.iter_mut().filter(|item| item.id == id) {
                item.status = status;
            }
        }
        if let (Some(item), RevisionStatus::Completed) = (moved, status) {
            lists
                .entry(ListKind::CompletedToday)
                .or_default()
                .push(with_status(item, status));
        }
        drop(lists);

        self.mutations.lock().push(RecordedMutation {
            action,
            id,
            time_spent,
        });
        Ok(())
    }

    fn check_mutations(&self, call: String) -> Result<(), BackendError> {
        self.calls.lock().push(call);
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(BackendError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RevisionBackend for ScriptedBackend {
    async fn today_revisions(&self) -> Result<RevisionFeed, BackendError> {
        self.fetch(ListKind::Today).map(RevisionFeed::flat)
    }

    async fn missed_revisions(&self) -> Result<RevisionFeed, BackendError> {
        self.fetch(ListKind::Missed).map(RevisionFeed::flat)
    }

    async fn completed_today_revisions(&self) -> Result<RevisionFeed, BackendError> {
        self.fetch(ListKind::CompletedToday).map(RevisionFeed::flat)
    }

    async fn revision_schedule(&self) -> Result<Vec<RevisionItem>, BackendError> {
        self.fetch(ListKind::Schedule)
    }

    async fn complete_revision(
        &self,
        id: RevisionId,
        time_spent: Option<Duration>,
    ) -> Result<(), BackendError> {
        self.mutate("complete", id, time_spent)
    }

    async fn postpone_revision(
        &self,
        id: RevisionId,
        time_spent: Option<Duration>,
    ) -> Result<(), BackendError> {
        self.mutate("postpone", id, time_spent)
    }

    async fn create_topic(
        &self,
        request: &CreateTopicRequest<'_>,
    ) -> Result<TopicCreationSummary, BackendError> {
        self.check_mutations(format!("create manual {}", request.title))?;
        Ok(TopicCreationSummary {
            flashcards_count: 3,
            llm_provider: Some("gemini".to_string()),
            ..Default::default()
        })
    }

    async fn upload_document(
        &self,
        title: &str,
        file: &UploadFile,
        _initial_revision_date: Option<NaiveDate>,
    ) -> Result<TopicCreationSummary, BackendError> {
        self.check_mutations(format!("create document {} {}", title, file.file_name))?;
        Ok(TopicCreationSummary {
            flashcards_count: 5,
            ..Default::default()
        })
    }

    async fn upload_images(
        &self,
        title: &str,
        files: &[UploadFile],
        _initial_revision_date: Option<NaiveDate>,
    ) -> Result<TopicCreationSummary, BackendError> {
        self.check_mutations(format!("create image {} {}", title, files.len()))?;
        Ok(TopicCreationSummary {
            flashcards_count: 2 * files.len() as u32,
            images_processed: Some(files.len() as u32),
            ..Default::default()
        })
    }

    async fn upload_link(
        &self,
        request: &UploadLinkRequest<'_>,
    ) -> Result<TopicCreationSummary, BackendError> {
        self.check_mutations(format!("create link {}", request.url))?;
        Ok(TopicCreationSummary {
            flashcards_count: 4,
            link_type: Some("webpage".to_string()),
            ..Default::default()
        })
    }

    async fn all_topics(&self) -> Result<Vec<Topic>, BackendError> {
        self.fetch_topics()
    }

    async fn topics_today(&self) -> Result<Vec<Topic>, BackendError> {
        let mut topics = self.fetch_topics()?;
        topics.retain(|topic| topic.created_at.map(|at| at.date_naive()) == Some(today()));
        Ok(topics)
    }

    async fn update_topic(
        &self,
        topic_id: i64,
        request: &UpdateTopicRequest<'_>,
    ) -> Result<Topic, BackendError> {
        self.check_mutations(format!("update topic {} {}", topic_id, request.title))?;
        let mut topics = self.topics.lock();
        let topic = topics
            .iter_mut()
            .find(|topic| topic.id == topic_id)
            .ok_or_else(|| BackendError::NotFound(format!("topic {}", topic_id)))?;
        topic.title = request.title.to_string();
        topic.content = request.content.to_string();
        topic.resource_url = request.resource_url.map(str::to_string);
        Ok(topic.clone())
    }

    async fn delete_topic(&self, topic_id: i64) -> Result<(), BackendError> {
        self.check_mutations(format!("delete topic {}", topic_id))?;
        self.topics.lock().retain(|topic| topic.id != topic_id);
        for items in self.lists.lock().values_mut() {
            items.retain(|item| item.topic.id != topic_id);
        }
        Ok(())
    }

    async fn start_study_session(&self) -> Result<StudySessionId, BackendError> {
        if self.fail_sessions.load(Ordering::SeqCst) {
            return Err(BackendError::Transport("session service down".to_string()));
        }
        let id = self.next_session.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls.lock().push(format!("start session {}", id));
        Ok(StudySessionId::new(id.to_string()))
    }

    async fn end_study_session(&self, id: &StudySessionId) -> Result<(), BackendError> {
        self.calls.lock().push(format!("end session {}", id));
        if self.fail_sessions.load(Ordering::SeqCst) {
            return Err(BackendError::Transport("session service down".to_string()));
        }
        Ok(())
    }

    async fn statistics(&self) -> Result<Statistics, BackendError> {
        if self.stall_statistics.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_statistics.load(Ordering::SeqCst) {
            return Err(BackendError::Unauthorized("token expired".to_string()));
        }
        Ok(self.statistics.lock().clone())
    }
}

type Gate = oneshot::Receiver<Result<RevisionFeed, BackendError>>;

/// `ListSource` whose fetches block until the test releases them, in call order.
#[derive(Default)]
pub(crate) struct GatedSource {
    gates: Mutex<VecDeque<Gate>>,
    calls: AtomicUsize,
}

impl GatedSource {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a gate for the next fetch; sending on the returned half resolves it.
    pub(crate) fn push_gate(&self) -> oneshot::Sender<Result<RevisionFeed, BackendError>> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().push_back(rx);
        tx
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Yield until at least `n` fetches have started.
    pub(crate) async fn wait_for_calls(&self, n: usize) {
        while self.calls() < n {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl ListSource for GatedSource {
    async fn fetch(&self) -> Result<RevisionFeed, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gates.lock().pop_front();
        match gate {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(BackendError::Transport("gate dropped".to_string()))),
            None => Ok(RevisionFeed::default()),
        }
    }
}
