//! State-changing actions against the backend.
//!
//! Every successful mutation ends with exactly one refresh publish, issued after the backend
//! call resolved and after the originating list reconciled its optimistic state.

mod validation;

pub use validation::*;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::RevisionBackend;
use crate::bus::RefreshBus;
use crate::config::Config;
use crate::errors::ClientError;
use crate::lists::{RemovalMark, RevisionListController};
use crate::models::{
    CreateTopicRequest, RevisionId, StudySessionId, Topic, TopicCreationSummary, TopicPayload,
    TopicSource, UpdateTopicRequest, UploadLinkRequest,
};

/// Which revision endpoint a mutation hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionAction {
    Complete,
    Postpone,
}

impl RevisionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevisionAction::Complete => "complete",
            RevisionAction::Postpone => "postpone",
        }
    }
}

impl fmt::Display for RevisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs mutations and notifies the refresh bus on success.
#[derive(Clone)]
pub struct MutationCoordinator {
    backend: Arc<dyn RevisionBackend>,
    bus: RefreshBus,
    presentation_delay: Duration,
}

impl MutationCoordinator {
    pub fn new(
        backend: Arc<dyn RevisionBackend>,
        bus: RefreshBus,
        presentation_delay: Duration,
    ) -> Self {
        Self {
            backend,
            bus,
            presentation_delay,
        }
    }

    pub fn from_config(backend: Arc<dyn RevisionBackend>, bus: RefreshBus, config: &Config) -> Self {
        Self::new(backend, bus, config.presentation_delay)
    }

    pub fn bus(&self) -> &RefreshBus {
        &self.bus
    }

    pub fn presentation_delay(&self) -> Duration {
        self.presentation_delay
    }

    /// Complete a revision. `origin` is the list the action was taken from, if any.
    pub async fn complete(
        &self,
        origin: Option<&RevisionListController>,
        id: RevisionId,
    ) -> Result<(), ClientError> {
        self.apply(RevisionAction::Complete, origin, id, None).await
    }

    /// Complete a revision, reporting how long the user spent on it.
    pub async fn complete_timed(
        &self,
        origin: Option<&RevisionListController>,
        id: RevisionId,
        time_spent: Duration,
    ) -> Result<(), ClientError> {
        self.apply(RevisionAction::Complete, origin, id, Some(time_spent))
            .await
    }

    pub async fn postpone(
        &self,
        origin: Option<&RevisionListController>,
        id: RevisionId,
    ) -> Result<(), ClientError> {
        self.apply(RevisionAction::Postpone, origin, id, None).await
    }

    pub async fn postpone_timed(
        &self,
        origin: Option<&RevisionListController>,
        id: RevisionId,
        time_spent: Duration,
    ) -> Result<(), ClientError> {
        self.apply(RevisionAction::Postpone, origin, id, Some(time_spent))
            .await
    }

    /// Optimistic mark, presentation delay, backend call, then commit and publish or roll back.
    ///
    /// The delay only runs when there is an origin list to animate. While the origin list
    /// still shows `id` animating out from an earlier action, this returns `Ok` without
    /// calling the backend.
    pub async fn apply(
        &self,
        action: RevisionAction,
        origin: Option<&RevisionListController>,
        id: RevisionId,
        time_spent: Option<Duration>,
    ) -> Result<(), ClientError> {
        if let Some(list) = origin {
            if list.mark_removal(id) == RemovalMark::AlreadyMarked {
                tracing::debug!(
                    "Revision {} already has an action in flight, ignoring {}",
                    id,
                    action
                );
                return Ok(());
            }
            if !self.presentation_delay.is_zero() {
                tokio::time::sleep(self.presentation_delay).await;
            }
        }

        let result = match action {
            RevisionAction::Complete => self.backend.complete_revision(id, time_spent).await,
            RevisionAction::Postpone => self.backend.postpone_revision(id, time_spent).await,
        };

        match result {
            Ok(()) => {
                if let Some(list) = origin {
                    list.commit_removal(id);
                }
                tracing::info!("Revision {} {}d", id, action);
                self.bus.publish();
                Ok(())
            }
            Err(e) => {
                if let Some(list) = origin {
                    list.cancel_optimistic_removal(id);
                }
                tracing::warn!("Failed to {} revision {}: {}", action, id, e);
                Err(ClientError::mutation(&e))
            }
        }
    }

    /// Validate the payload, then call the creation endpoint for its source type.
    pub async fn create_topic(
        &self,
        payload: &TopicPayload,
    ) -> Result<TopicCreationSummary, ClientError> {
        validate_payload(payload)?;

        let title = payload.title.trim();
        let date = payload.initial_revision_date;
        let result = match &payload.source {
            TopicSource::Manual {
                content,
                resource_url,
            } => {
                let request = CreateTopicRequest {
                    title,
                    content,
                    resource_url: resource_url
                        .as_deref()
                        .map(str::trim)
                        .filter(|url| !url.is_empty()),
                    initial_revision_date: date,
                };
                self.backend.create_topic(&request).await
            }
            TopicSource::Link { url } => {
                let request = UploadLinkRequest {
                    url: url.trim(),
                    title: Some(title).filter(|t| !t.is_empty()),
                    initial_revision_date: date,
                };
                self.backend.upload_link(&request).await
            }
            TopicSource::Image { files } => self.backend.upload_images(title, files, date).await,
            TopicSource::Document { file } => {
                self.backend.upload_document(title, file, date).await
            }
        };

        match result {
            Ok(summary) => {
                tracing::info!(
                    "Created {} topic {:?} with {} flashcards",
                    payload.source_type(),
                    title,
                    summary.flashcards_count
                );
                self.bus.publish();
                Ok(summary)
            }
            Err(e) => {
                tracing::warn!("Failed to create {} topic: {}", payload.source_type(), e);
                Err(ClientError::mutation(&e))
            }
        }
    }

    /// Edit a topic's title, content and resource link, then refresh every view.
    pub async fn update_topic(
        &self,
        topic_id: i64,
        title: &str,
        content: &str,
        resource_url: Option<&str>,
    ) -> Result<Topic, ClientError> {
        validate_topic_update(title, content, resource_url)?;

        let request = UpdateTopicRequest {
            title: title.trim(),
            content,
            resource_url: resource_url.map(str::trim).filter(|url| !url.is_empty()),
        };
        match self.backend.update_topic(topic_id, &request).await {
            Ok(topic) => {
                tracing::info!("Updated topic {}", topic_id);
                self.bus.publish();
                Ok(topic)
            }
            Err(e) => {
                tracing::warn!("Failed to update topic {}: {}", topic_id, e);
                Err(ClientError::mutation(&e))
            }
        }
    }

    /// Delete a topic. Its revisions go with it server-side; lists catch up on refresh.
    pub async fn delete_topic(&self, topic_id: i64) -> Result<(), ClientError> {
        match self.backend.delete_topic(topic_id).await {
            Ok(()) => {
                tracing::info!("Deleted topic {}", topic_id);
                self.bus.publish();
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to delete topic {}: {}", topic_id, e);
                Err(ClientError::mutation(&e))
            }
        }
    }

    /// Open a study-tracking session. Failures are logged and yield `None`.
    pub async fn open_study_session(&self) -> Option<StudySessionId> {
        match self.backend.start_study_session().await {
            Ok(id) => {
                tracing::debug!("Opened study session {}", id);
                Some(id)
            }
            Err(e) => {
                tracing::warn!("Could not open study session: {}", e);
                None
            }
        }
    }

    /// Close a study-tracking session. Failures are logged only.
    pub async fn close_study_session(&self, id: &StudySessionId) {
        if let Err(e) = self.backend.end_study_session(id).await {
            tracing::warn!("Could not close study session {}: {}", id, e);
        }
    }
}

impl fmt::Debug for MutationCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationCoordinator")
            .field("bus", &self.bus)
            .field("presentation_delay", &self.presentation_delay)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ListKind;
    use crate::lists::GroupingMode;
    use crate::models::UploadFile;
    use crate::test_support::{revision, topic_created, RecordedMutation, ScriptedBackend};

    async fn today(backend: &Arc<ScriptedBackend>, bus: &RefreshBus) -> RevisionListController {
        backend.set_list(ListKind::Today, vec![revision(1, 1), revision(2, 1)]);
        let list =
            RevisionListController::for_backend(backend.clone(), ListKind::Today, GroupingMode::Flat);
        list.attach(bus);
        list.load().await.unwrap();
        list
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_marks_waits_then_commits() {
        let backend = ScriptedBackend::new();
        let bus = RefreshBus::new();
        let list = today(&backend, &bus).await;
        let coordinator =
            MutationCoordinator::new(backend.clone(), bus.clone(), Duration::from_millis(500));

        let id = RevisionId::topic(1);
        let task = tokio::spawn({
            let coordinator = coordinator.clone();
            let list = list.clone();
            async move { coordinator.complete(Some(&list), id).await }
        });
        while !list.is_animating(&id) {
            tokio::task::yield_now().await;
        }
        assert!(list.items().contains(&id));
        assert!(backend.mutations().is_empty());

        task.await.unwrap().unwrap();
        list.settled().await;

        assert_eq!(list.items().ids(), vec![RevisionId::topic(2)]);
        assert!(!list.is_animating(&id));
        assert_eq!(bus.token().value(), 1);
        assert_eq!(list.refresh_count(), 1);
        assert_eq!(
            backend.mutations(),
            vec![RecordedMutation {
                action: "complete",
                id,
                time_spent: None
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_action_while_animating_is_ignored() {
        let backend = ScriptedBackend::new();
        let bus = RefreshBus::new();
        let list = today(&backend, &bus).await;
        let coordinator =
            MutationCoordinator::new(backend.clone(), bus.clone(), Duration::from_millis(500));
        backend.fail_mutations(true);

        let id = RevisionId::topic(1);
        let first = tokio::spawn({
            let coordinator = coordinator.clone();
            let list = list.clone();
            async move { coordinator.complete(Some(&list), id).await }
        });
        while !list.is_animating(&id) {
            tokio::task::yield_now().await;
        }

        coordinator.complete(Some(&list), id).await.unwrap();
        assert!(backend.calls().is_empty());
        assert!(list.is_animating(&id));

        let err = first.await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::MutationFailed(_)));
        assert_eq!(backend.calls(), vec!["complete topic:1"]);
        assert!(!list.is_animating(&id));
        assert!(list.items().contains(&id));
        assert_eq!(bus.token().value(), 0);
    }

    #[tokio::test]
    async fn test_failed_mutation_rolls_back_without_publish() {
        let backend = ScriptedBackend::new();
        let bus = RefreshBus::new();
        let list = today(&backend, &bus).await;
        let coordinator = MutationCoordinator::new(backend.clone(), bus.clone(), Duration::ZERO);
        backend.fail_mutations(true);

        let id = RevisionId::topic(1);
        let err = coordinator.postpone(Some(&list), id).await.unwrap_err();

        assert!(matches!(err, ClientError::MutationFailed(_)));
        assert!(list.items().contains(&id));
        assert!(!list.is_animating(&id));
        assert_eq!(bus.token().value(), 0);
        assert_eq!(list.refresh_count(), 0);
    }

    #[tokio::test]
    async fn test_timed_postpone_without_origin() {
        let backend = ScriptedBackend::new();
        let bus = RefreshBus::new();
        let coordinator = MutationCoordinator::new(backend.clone(), bus.clone(), Duration::ZERO);

        let id = RevisionId::flashcard(9);
        coordinator
            .postpone_timed(None, id, Duration::from_secs(42))
            .await
            .unwrap();

        assert_eq!(bus.token().value(), 1);
        assert_eq!(
            backend.mutations()[0].time_spent,
            Some(Duration::from_secs(42))
        );
    }

    #[tokio::test]
    async fn test_create_topic_validates_before_calling_backend() {
        let backend = ScriptedBackend::new();
        let bus = RefreshBus::new();
        let coordinator = MutationCoordinator::new(backend.clone(), bus.clone(), Duration::ZERO);

        let err = coordinator
            .create_topic(&TopicPayload::link("Article", "http://localhost/admin"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::ValidationFailed(_)));
        assert!(backend.calls().is_empty());
        assert_eq!(bus.token().value(), 0);
    }

    #[tokio::test]
    async fn test_create_topic_dispatches_by_source() {
        let backend = ScriptedBackend::new();
        let bus = RefreshBus::new();
        let coordinator = MutationCoordinator::new(backend.clone(), bus.clone(), Duration::ZERO);

        let manual = coordinator
            .create_topic(&TopicPayload::manual(" Graphs ", "BFS, DFS"))
            .await
            .unwrap();
        assert_eq!(manual.llm_provider.as_deref(), Some("gemini"));

        coordinator
            .create_topic(&TopicPayload::link("", " https://example.com/post "))
            .await
            .unwrap();
        let images = vec![
            UploadFile::new("a.png", "image/png", vec![1; 8]),
            UploadFile::new("b.jpg", "image/jpeg", vec![1; 8]),
        ];
        let summary = coordinator
            .create_topic(&TopicPayload::images("Slides", images))
            .await
            .unwrap();
        assert_eq!(summary.images_processed, Some(2));
        coordinator
            .create_topic(&TopicPayload::document(
                "Paper",
                UploadFile::new("paper.pdf", "application/pdf", vec![1; 8]),
            ))
            .await
            .unwrap();

        assert_eq!(
            backend.calls(),
            vec![
                "create manual Graphs",
                "create link https://example.com/post",
                "create image Slides 2",
                "create document Paper paper.pdf",
            ]
        );
        assert_eq!(bus.token().value(), 4);
    }

    #[tokio::test]
    async fn test_delete_topic_publishes_only_on_success() {
        let backend = ScriptedBackend::new();
        let bus = RefreshBus::new();
        let coordinator = MutationCoordinator::new(backend.clone(), bus.clone(), Duration::ZERO);

        coordinator.delete_topic(3).await.unwrap();
        assert_eq!(bus.token().value(), 1);

        backend.fail_mutations(true);
        let err = coordinator.delete_topic(3).await.unwrap_err();
        assert_eq!(err.error_code(), crate::errors::codes::MUTATION_FAILED);
        assert_eq!(bus.token().value(), 1);
    }

    #[tokio::test]
    async fn test_update_topic_validates_then_publishes() {
        let backend = ScriptedBackend::new();
        backend.set_topics(vec![topic_created(5, "Graphs", crate::test_support::today())]);
        let bus = RefreshBus::new();
        let coordinator = MutationCoordinator::new(backend.clone(), bus.clone(), Duration::ZERO);

        let err = coordinator.update_topic(5, "Graphs", "  ", None).await.unwrap_err();
        assert!(matches!(err, ClientError::ValidationFailed(_)));
        assert!(backend.calls().is_empty());

        let updated = coordinator
            .update_topic(5, " Graph search ", "BFS", Some(" https://example.com/bfs "))
            .await
            .unwrap();
        assert_eq!(updated.title, "Graph search");
        assert_eq!(updated.resource_url.as_deref(), Some("https://example.com/bfs"));
        assert_eq!(bus.token().value(), 1);

        let err = coordinator.update_topic(99, "Gone", "x", None).await.unwrap_err();
        assert!(matches!(err, ClientError::MutationFailed(_)));
        assert_eq!(bus.token().value(), 1);
        assert_eq!(
            backend.calls(),
            vec!["update topic 5 Graph search", "update topic 99 Gone"]
        );
    }

    #[tokio::test]
    async fn test_study_session_failures_are_swallowed() {
        let backend = ScriptedBackend::new();
        let coordinator =
            MutationCoordinator::new(backend.clone(), RefreshBus::new(), Duration::ZERO);

        let id = coordinator.open_study_session().await.unwrap();
        coordinator.close_study_session(&id).await;

        backend.fail_sessions(true);
        assert!(coordinator.open_study_session().await.is_none());
        coordinator.close_study_session(&id).await;
        assert_eq!(
            backend.calls(),
            vec!["start session 1", "end session 1", "end session 1"]
        );
    }
}
