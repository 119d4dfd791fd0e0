//! Backend collaborator.
//!
//! The REST backend owns scheduling; this crate only consumes it through `RevisionBackend`.
//! List controllers take a `ListSource` so every list kind shares one reconciliation path.

mod http;

pub use http::*;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::BackendError;
use crate::models::{
    CreateTopicRequest, RevisionFeed, RevisionId, RevisionItem, Statistics, StudySessionId,
    Topic, TopicCreationSummary, UpdateTopicRequest, UploadFile, UploadLinkRequest,
};

/// Every backend call this crate makes.
#[async_trait]
pub trait RevisionBackend: Send + Sync {
    async fn today_revisions(&self) -> Result<RevisionFeed, BackendError>;

    async fn missed_revisions(&self) -> Result<RevisionFeed, BackendError>;

    async fn completed_today_revisions(&self) -> Result<RevisionFeed, BackendError>;

    /// Full history, always flat, including completed and postponed items.
    async fn revision_schedule(&self) -> Result<Vec<RevisionItem>, BackendError>;

    async fn complete_revision(
        &self,
        id: RevisionId,
        time_spent: Option<Duration>,
    ) -> Result<(), BackendError>;

    async fn postpone_revision(
        &self,
        id: RevisionId,
        time_spent: Option<Duration>,
    ) -> Result<(), BackendError>;

    async fn create_topic(
        &self,
        request: &CreateTopicRequest<'_>,
    ) -> Result<TopicCreationSummary, BackendError>;

    async fn upload_document(
        &self,
        title: &str,
        file: &UploadFile,
        initial_revision_date: Option<NaiveDate>,
    ) -> Result<TopicCreationSummary, BackendError>;

    async fn upload_images(
        &self,
        title: &str,
        files: &[UploadFile],
        initial_revision_date: Option<NaiveDate>,
    ) -> Result<TopicCreationSummary, BackendError>;

    async fn upload_link(
        &self,
        request: &UploadLinkRequest<'_>,
    ) -> Result<TopicCreationSummary, BackendError>;

    async fn all_topics(&self) -> Result<Vec<Topic>, BackendError>;

    /// Topics created today.
    async fn topics_today(&self) -> Result<Vec<Topic>, BackendError>;

    async fn update_topic(
        &self,
        topic_id: i64,
        request: &UpdateTopicRequest<'_>,
    ) -> Result<Topic, BackendError>;

    async fn delete_topic(&self, topic_id: i64) -> Result<(), BackendError>;

    async fn start_study_session(&self) -> Result<StudySessionId, BackendError>;

    async fn end_study_session(&self, id: &StudySessionId) -> Result<(), BackendError>;

    async fn statistics(&self) -> Result<Statistics, BackendError>;
}

/// Which revision list a controller mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    Today,
    Missed,
    CompletedToday,
    Schedule,
}

impl ListKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListKind::Today => "today",
            ListKind::Missed => "missed",
            ListKind::CompletedToday => "completed",
            ListKind::Schedule => "schedule",
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// The fetch a list controller runs on every load.
#[async_trait]
pub trait ListSource: Send + Sync {
    async fn fetch(&self) -> Result<RevisionFeed, BackendError>;
}

/// `ListSource` backed by one endpoint of a `RevisionBackend`.
#[derive(Clone)]
pub struct BackendSource {
    backend: Arc<dyn RevisionBackend>,
    kind: ListKind,
}

impl BackendSource {
    pub fn new(backend: Arc<dyn RevisionBackend>, kind: ListKind) -> Self {
        Self { backend, kind }
    }

    pub fn kind(&self) -> ListKind {
        self.kind
    }
}

#[async_trait]
impl ListSource for BackendSource {
    async fn fetch(&self) -> Result<RevisionFeed, BackendError> {
        match self.kind {
            ListKind::Today => self.backend.today_revisions().await,
            ListKind::Missed => self.backend.missed_revisions().await,
            ListKind::CompletedToday => self.backend.completed_today_revisions().await,
            ListKind::Schedule => self
                .backend
                .revision_schedule()
                .await
                .map(RevisionFeed::flat),
        }
    }
}
