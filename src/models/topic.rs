//! Topic models: listed topics, and the bodies of the creation and update endpoints.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A topic as listed by `GET topics/` and `GET topics/today/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_url: Option<String>,
    #[serde(default = "default_source_type")]
    pub source_type: SourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_source_type() -> SourceType {
    SourceType::Manual
}

/// JSON body for `PUT topics/{id}/`.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateTopicRequest<'a> {
    pub title: &'a str,
    pub content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_url: Option<&'a str>,
}

/// Which creation endpoint a payload targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Manual,
    Link,
    Image,
    Document,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Manual => "manual",
            SourceType::Link => "link",
            SourceType::Image => "image",
            SourceType::Document => "document",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file attached to an image or document upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Lower-cased extension after the last dot, if any.
    pub fn extension(&self) -> Option<String> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }
}

/// The material flashcards are generated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicSource {
    Manual {
        content: String,
        resource_url: Option<String>,
    },
    Link {
        url: String,
    },
    Image {
        files: Vec<UploadFile>,
    },
    Document {
        file: UploadFile,
    },
}

impl TopicSource {
    pub fn source_type(&self) -> SourceType {
        match self {
            TopicSource::Manual { .. } => SourceType::Manual,
            TopicSource::Link { .. } => SourceType::Link,
            TopicSource::Image { .. } => SourceType::Image,
            TopicSource::Document { .. } => SourceType::Document,
        }
    }
}

/// Request to create a topic from one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPayload {
    pub title: String,
    pub initial_revision_date: Option<NaiveDate>,
    pub source: TopicSource,
}

impl TopicPayload {
    pub fn manual(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            initial_revision_date: None,
            source: TopicSource::Manual {
                content: content.into(),
                resource_url: None,
            },
        }
    }

    pub fn link(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            initial_revision_date: None,
            source: TopicSource::Link { url: url.into() },
        }
    }

    pub fn images(title: impl Into<String>, files: Vec<UploadFile>) -> Self {
        Self {
            title: title.into(),
            initial_revision_date: None,
            source: TopicSource::Image { files },
        }
    }

    pub fn document(title: impl Into<String>, file: UploadFile) -> Self {
        Self {
            title: title.into(),
            initial_revision_date: None,
            source: TopicSource::Document { file },
        }
    }

    pub fn starting(mut self, date: NaiveDate) -> Self {
        self.initial_revision_date = Some(date);
        self
    }

    pub fn source_type(&self) -> SourceType {
        self.source.source_type()
    }
}

/// JSON body for `POST topics/`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateTopicRequest<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub resource_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_revision_date: Option<NaiveDate>,
}

/// JSON body for `POST topics/upload-link/`.
#[derive(Debug, Clone, Serialize)]
pub struct UploadLinkRequest<'a> {
    pub url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_revision_date: Option<NaiveDate>,
}

/// What the backend generated for a new topic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicCreationSummary {
    #[serde(default)]
    pub flashcards_count: u32,
    /// AI provider that generated the cards (manual creation only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images_processed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,
}
