//! Checks run before any topic creation or edit reaches the backend.

use crate::errors::ClientError;
use crate::models::{TopicPayload, TopicSource, UploadFile};

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_URL_CHARS: usize = 2048;
pub const MAX_IMAGES: usize = 10;
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const MAX_DOCUMENT_BYTES: usize = 2 * 1024 * 1024;

const IMAGE_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp"];
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx"];
const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1", "0.0.0.0"];

/// Validate a creation payload for its source type.
pub fn validate_payload(payload: &TopicPayload) -> Result<(), ClientError> {
    let title = payload.title.trim();
    validate_title_length(title)?;

    match &payload.source {
        TopicSource::Manual { content, .. } => {
            if title.is_empty() {
                return Err(ClientError::validation("Title is required"));
            }
            if content.trim().is_empty() {
                return Err(ClientError::validation("Content is required"));
            }
            Ok(())
        }
        TopicSource::Link { url } => validate_url(url),
        TopicSource::Image { files } => validate_images(files),
        TopicSource::Document { file } => validate_document(file),
    }
}

/// Validate an edit of an existing topic. Title and content are both required.
pub fn validate_topic_update(
    title: &str,
    content: &str,
    resource_url: Option<&str>,
) -> Result<(), ClientError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ClientError::validation("Title is required"));
    }
    validate_title_length(title)?;
    if content.trim().is_empty() {
        return Err(ClientError::validation("Content is required"));
    }
    match resource_url.map(str::trim).filter(|url| !url.is_empty()) {
        Some(url) => validate_url(url),
        None => Ok(()),
    }
}

fn validate_title_length(title: &str) -> Result<(), ClientError> {
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(ClientError::validation(format!(
            "Title must be at most {} characters",
            MAX_TITLE_CHARS
        )));
    }
    Ok(())
}

fn validate_url(url: &str) -> Result<(), ClientError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ClientError::validation("URL is required"));
    }
    if url.chars().count() > MAX_URL_CHARS {
        return Err(ClientError::validation(format!(
            "URL must be at most {} characters",
            MAX_URL_CHARS
        )));
    }

    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| ClientError::validation("URL must start with http:// or https://"))?;

    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority.rsplit('@').next().unwrap_or_default();
    let host = host_port.split(':').next().unwrap_or_default().to_ascii_lowercase();
    if host.is_empty() {
        return Err(ClientError::validation("URL has no host"));
    }
    if LOCAL_HOSTS.contains(&host.as_str()) {
        return Err(ClientError::validation("Local URLs are not allowed"));
    }
    Ok(())
}

fn validate_images(files: &[UploadFile]) -> Result<(), ClientError> {
    if files.is_empty() {
        return Err(ClientError::validation("At least one image is required"));
    }
    if files.len() > MAX_IMAGES {
        return Err(ClientError::validation(format!(
            "At most {} images can be uploaded at once",
            MAX_IMAGES
        )));
    }
    for file in files {
        if !IMAGE_TYPES.contains(&file.content_type.to_ascii_lowercase().as_str()) {
            return Err(ClientError::validation(format!(
                "{}: unsupported image type {}",
                file.file_name, file.content_type
            )));
        }
        if file.bytes.len() > MAX_IMAGE_BYTES {
            return Err(ClientError::validation(format!(
                "{}: image exceeds 5 MB",
                file.file_name
            )));
        }
    }
    Ok(())
}

fn validate_document(file: &UploadFile) -> Result<(), ClientError> {
    let supported = file
        .extension()
        .map(|ext| DOCUMENT_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false);
    if !supported {
        return Err(ClientError::validation(format!(
            "{}: only PDF and Word documents are supported",
            file.file_name
        )));
    }
    if file.bytes.len() > MAX_DOCUMENT_BYTES {
        return Err(ClientError::validation(format!(
            "{}: document exceeds 2 MB",
            file.file_name
        )));
    }
    Ok(())
}
