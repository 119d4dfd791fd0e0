//! `reqwest` implementation of the backend collaborator.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::RevisionBackend;
use crate::config::Config;
use crate::errors::BackendError;
use crate::models::{
    CreateTopicRequest, RevisionFeed, RevisionId, RevisionItem, RevisionKind, Statistics,
    StudySessionId, StudySessionStarted, Topic, TopicCreationSummary, UpdateTopicRequest,
    UploadFile, UploadLinkRequest,
};

/// Header carrying the user's timezone so "today" is computed locally.
pub const TIMEZONE_HEADER: &str = "x-timezone";
/// Header tagging each request for correlation in backend logs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// HTTP client for the revision backend.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
    timezone: Option<String>,
}

impl HttpBackend {
    /// Build a client from configuration.
    pub fn new(config: &Config) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
            timezone: config.timezone.clone(),
        })
    }

    /// Build a client around an existing `reqwest::Client`.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: None,
            timezone: None,
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request_id = uuid::Uuid::new_v4().to_string();
        tracing::debug!("{} {} ({})", method, path, request_id);

        let mut builder = self
            .client
            .request(method, self.url(path))
            .header(REQUEST_ID_HEADER, request_id);
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(tz) = &self.timezone {
            builder = builder.header(TIMEZONE_HEADER, tz);
        }
        builder
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, BackendError> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status, &body));
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn send_empty(&self, builder: RequestBuilder) -> Result<(), BackendError> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status, &body));
        }
        Ok(())
    }

    fn revision_action(
        &self,
        id: RevisionId,
        action: &str,
        time_spent: Option<Duration>,
    ) -> RequestBuilder {
        let path = match id.kind() {
            RevisionKind::Topic => format!("revisions/{}/{}/", id.raw(), action),
            RevisionKind::Flashcard => format!("flashcard-revisions/{}/{}/", id.raw(), action),
        };
        let builder = self.request(Method::POST, &path);
        match time_spent {
            Some(spent) => builder.json(&json!({ "time_spent_seconds": spent.as_secs() })),
            None => builder,
        }
    }
}

fn file_part(file: &UploadFile) -> Result<Part, BackendError> {
    Ok(Part::bytes(file.bytes.clone())
        .file_name(file.file_name.clone())
        .mime_str(&file.content_type)?)
}

fn upload_form(title: &str, initial_revision_date: Option<NaiveDate>) -> Form {
    let mut form = Form::new();
    if !title.trim().is_empty() {
        form = form.text("title", title.trim().to_string());
    }
    if let Some(date) = initial_revision_date {
        form = form.text("initial_revision_date", date.format("%Y-%m-%d").to_string());
    }
    form
}

#[async_trait]
impl RevisionBackend for HttpBackend {
    async fn today_revisions(&self) -> Result<RevisionFeed, BackendError> {
        self.send_json(self.request(Method::GET, "revisions/today/"))
            .await
    }

    async fn missed_revisions(&self) -> Result<RevisionFeed, BackendError> {
        self.send_json(self.request(Method::GET, "revisions/missed/"))
            .await
    }

    async fn completed_today_revisions(&self) -> Result<RevisionFeed, BackendError> {
        self.send_json(self.request(Method::GET, "revisions/completed-today/"))
            .await
    }

    async fn revision_schedule(&self) -> Result<Vec<RevisionItem>, BackendError> {
        self.send_json(self.request(Method::GET, "revisions/schedule/"))
            .await
    }

    async fn complete_revision(
        &self,
        id: RevisionId,
        time_spent: Option<Duration>,
    ) -> Result<(), BackendError> {
        self.send_empty(self.revision_action(id, "complete", time_spent))
            .await
    }

    async fn postpone_revision(
        &self,
        id: RevisionId,
        time_spent: Option<Duration>,
    ) -> Result<(), BackendError> {
        self.send_empty(self.revision_action(id, "postpone", time_spent))
            .await
    }

    async fn create_topic(
        &self,
        request: &CreateTopicRequest<'_>,
    ) -> Result<TopicCreationSummary, BackendError> {
        self.send_json(self.request(Method::POST, "topics/").json(request))
            .await
    }

    async fn upload_document(
        &self,
        title: &str,
        file: &UploadFile,
        initial_revision_date: Option<NaiveDate>,
    ) -> Result<TopicCreationSummary, BackendError> {
        let form = upload_form(title, initial_revision_date).part("document", file_part(file)?);
        self.send_json(
            self.request(Method::POST, "topics/upload-document/")
                .multipart(form),
        )
        .await
    }

    async fn upload_images(
        &self,
        title: &str,
        files: &[UploadFile],
        initial_revision_date: Option<NaiveDate>,
    ) -> Result<TopicCreationSummary, BackendError> {
        let mut form = upload_form(title, initial_revision_date);
        for file in files {
            form = form.part("images", file_part(file)?);
        }
        self.send_json(
            self.request(Method::POST, "topics/upload-images/")
                .multipart(form),
        )
        .await
    }

    async fn upload_link(
        &self,
        request: &UploadLinkRequest<'_>,
    ) -> Result<TopicCreationSummary, BackendError> {
        self.send_json(self.request(Method::POST, "topics/upload-link/").json(request))
            .await
    }

    async fn all_topics(&self) -> Result<Vec<Topic>, BackendError> {
        self.send_json(self.request(Method::GET, "topics/")).await
    }

    async fn topics_today(&self) -> Result<Vec<Topic>, BackendError> {
        self.send_json(self.request(Method::GET, "topics/today/"))
            .await
    }

    async fn update_topic(
        &self,
        topic_id: i64,
        request: &UpdateTopicRequest<'_>,
    ) -> Result<Topic, BackendError> {
        self.send_json(
            self.request(Method::PUT, &format!("topics/{}/", topic_id))
                .json(request),
        )
        .await
    }

    async fn delete_topic(&self, topic_id: i64) -> Result<(), BackendError> {
        self.send_empty(self.request(Method::DELETE, &format!("topics/{}/", topic_id)))
            .await
    }

    async fn start_study_session(&self) -> Result<StudySessionId, BackendError> {
        let started: StudySessionStarted = self
            .send_json(self.request(Method::POST, "study-sessions/start/"))
            .await?;
        Ok(started.session.id)
    }

    async fn end_study_session(&self, id: &StudySessionId) -> Result<(), BackendError> {
        self.send_empty(self.request(Method::POST, &format!("study-sessions/{}/end/", id)))
            .await
    }

    async fn statistics(&self) -> Result<Statistics, BackendError> {
        self.send_json(self.request(Method::GET, "statistics/"))
            .await
    }
}
