//! Content ingestion.
//!
//! Normalizes every supported source into a [`ContentItem`], writes it under
//! `content:<id>` with the content TTL, and returns the client-facing JSON.
//!
//! | Source | Title | Metadata |
//! |--------|-------|----------|
//! | file upload | (file name in `name`) | none |
//! | `youtube` | `YouTube Video` | `{duration, url}` |
//! | `url` | page `<title>` or `Web Article` | `{url}` |
//! | `text` | `Text Input` | `{}` |
//!
//! One store write per call, no retry: a failed write fails the request.

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::extract::{extract_file_text, fetch_web_content};
use crate::models::{new_id, ContentItem, ContentKind};
use crate::store::{content_key, put_json, KvStore};
use crate::youtube;

pub const FILE_UPLOADED_MESSAGE: &str = "File uploaded successfully";
pub const CONTENT_PROCESSED_MESSAGE: &str = "Content processed successfully";
pub const TEXT_INPUT_TITLE: &str = "Text Input";

/// A file received through the multipart `file` field.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// JSON body for non-file ingestion.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestRequest {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Stores an uploaded file and returns `{id, content, message}`.
pub async fn ingest_file(
    store: &dyn KvStore,
    config: &Config,
    file: UploadedFile,
) -> AppResult<Value> {
    let source = extract_file_text(&file.name, file.content_type.as_deref(), &file.bytes);
    let supported = source.is_supported();
    let content = source.into_text();

    let item = ContentItem {
        id: new_id(),
        kind: ContentKind::File,
        title: None,
        name: Some(file.name),
        size: Some(file.bytes.len() as u64),
        content,
        metadata: None,
        uploaded_at: Utc::now(),
    };

    put_json(
        store,
        &content_key(&item.id),
        &item,
        config.retention.content_ttl(),
    )
    .await?;

    info!(id = %item.id, name = ?item.name, extracted = supported, "file ingested");

    Ok(json!({
        "id": item.id,
        "content": item.content,
        "message": FILE_UPLOADED_MESSAGE,
    }))
}

fn required<'a>(value: &'a Option<String>, message: &str) -> AppResult<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::invalid(message))
}

/// Resolves a YouTube link, web page or raw text and stores the result.
///
/// The response is `{id, title, content, ...metadata, message}`.
pub async fn ingest_request(
    store: &dyn KvStore,
    client: &reqwest::Client,
    config: &Config,
    request: IngestRequest,
) -> AppResult<Value> {
    let mut metadata = Map::new();
    let (kind, title, content) = match request.kind.as_deref() {
        Some("youtube") => {
            let url = required(&request.url, "No URL provided")?;
            let video = youtube::fetch_video(url)
                .ok_or_else(|| AppError::invalid("Invalid YouTube URL"))?;
            if !video.transcript.is_supported() {
                info!(video_id = %video.video_id, "transcript unavailable, storing placeholder");
            }
            metadata.insert("duration".into(), Value::String(video.duration));
            metadata.insert("url".into(), Value::String(url.to_string()));
            (ContentKind::Youtube, video.title, video.transcript.into_text())
        }
        Some("url") => {
            let url = required(&request.url, "No URL provided")?;
            let page = fetch_web_content(client, url, config.extraction.web_max_chars).await?;
            metadata.insert("url".into(), Value::String(url.to_string()));
            (ContentKind::Url, page.title, page.content)
        }
        Some("text") => {
            let text = request
                .text
                .ok_or_else(|| AppError::invalid("No text provided"))?;
            (ContentKind::Text, TEXT_INPUT_TITLE.to_string(), text)
        }
        _ => return Err(AppError::invalid("Unsupported content type")),
    };

    let item = ContentItem {
        id: new_id(),
        kind,
        title: Some(title),
        name: None,
        size: None,
        content,
        metadata: Some(metadata),
        uploaded_at: Utc::now(),
    };

    put_json(
        store,
        &content_key(&item.id),
        &item,
        config.retention.content_ttl(),
    )
    .await?;

    info!(id = %item.id, kind = kind.as_str(), "content ingested");

    let mut response = Map::new();
    response.insert("id".into(), Value::String(item.id));
    response.insert("title".into(), json!(item.title));
    response.insert("content".into(), Value::String(item.content));
    if let Some(metadata) = item.metadata {
        response.extend(metadata);
    }
    response.insert(
        "message".into(),
        Value::String(CONTENT_PROCESSED_MESSAGE.to_string()),
    );
    Ok(Value::Object(response))
}
