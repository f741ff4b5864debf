//! Records that flow through ingestion, analysis and the archive.
//!
//! Every record is serialized with camelCase field names; that is the JSON
//! shape both the HTTP clients and the key-value store see.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a [`ContentItem`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    File,
    Youtube,
    Url,
    Text,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::File => "file",
            ContentKind::Youtube => "youtube",
            ContentKind::Url => "url",
            ContentKind::Text => "text",
        }
    }
}

/// One ingested unit, stored under `content:<id>`.
///
/// File uploads carry `name` and `size`; the other sources carry `title`
/// and a source-specific `metadata` object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
    pub uploaded_at: DateTime<Utc>,
}

/// A content item as supplied to `/api/analyze`.
///
/// Clients send back whatever ingestion returned, so every field is
/// optional and unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisSource {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl AnalysisSource {
    /// Display label: `name`, then `title`, then empty.
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningStep {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
}

/// Output of the analysis generator, stored under `analysis:<id>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub source_name: String,
    pub confidence: u8,
    pub summary: String,
    pub learning_plan: Vec<LearningStep>,
    pub insights: Vec<Insight>,
    pub questions: Vec<QaPair>,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Fresh opaque identifier for any record namespace.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_item_uses_camel_case_and_type_tag() {
        let item = ContentItem {
            id: "abc".into(),
            kind: ContentKind::Youtube,
            title: Some("YouTube Video".into()),
            name: None,
            size: None,
            content: "transcript".into(),
            metadata: None,
            uploaded_at: Utc::now(),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "youtube");
        assert!(json.get("uploadedAt").is_some());
        assert!(json.get("name").is_none());
        assert!(json.get("metadata").is_none());
    }

    #[test]
    fn analysis_source_label_falls_back_to_title() {
        let named: AnalysisSource =
            serde_json::from_value(serde_json::json!({"name": "notes.md", "title": "x"})).unwrap();
        assert_eq!(named.label(), "notes.md");

        let titled: AnalysisSource =
            serde_json::from_value(serde_json::json!({"title": "Web Article", "extra": 1}))
                .unwrap();
        assert_eq!(titled.label(), "Web Article");

        assert_eq!(AnalysisSource::default().label(), "");
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(new_id(), new_id());
    }
}
