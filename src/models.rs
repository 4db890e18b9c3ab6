//! Data models shared by the selection pipeline.
//!
//! - [`NewsItem`]: a candidate produced by one of the extractors
//! - [`NamedSource`] and [`SourcePool`]: where candidates are fetched from
//! - [`PublicationRecord`]: the persisted snapshot of the last accepted item
//!
//! The record keeps the historical JSON key names (`Title`, `Publication Date`,
//! ...) so existing state files stay readable.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Format of `Publication Date` in the persisted record.
pub const RECORD_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M %z";

/// Which extraction strategy produced an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Rss,
    Html,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Rss => f.write_str("rss"),
            SourceKind::Html => f.write_str("html"),
        }
    }
}

/// A candidate news item.
///
/// Items are not mutated after extraction except for `image_url` and
/// `image_path`, which are resolved once the item has been accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsItem {
    pub title: String,
    /// Plain text, markup already stripped.
    pub description: String,
    pub published_at: DateTime<FixedOffset>,
    pub guid: String,
    /// Article page the item points to.
    pub link: String,
    /// Remote image, when the extractor already knows it.
    pub image_url: Option<String>,
    /// Local copy of the image after retrieval.
    pub image_path: Option<PathBuf>,
    pub kind: SourceKind,
}

/// A configured source: base url plus the endpoints under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedSource {
    pub name: String,
    pub base_url: String,
    pub endpoints: Vec<String>,
}

/// An ordered group of sources sharing one attempt budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePool {
    pub name: String,
    pub sources: Vec<NamedSource>,
}

impl SourcePool {
    /// Number of (source, endpoint) pairs, which is also the attempt budget.
    pub fn size(&self) -> usize {
        self.sources.iter().map(|s| s.endpoints.len()).sum()
    }
}

/// The single persisted record of the last accepted item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationRecord {
    #[serde(rename = "Title", default)]
    pub title: String,
    #[serde(rename = "Description", default)]
    pub description: String,
    #[serde(rename = "Publication Date", default)]
    pub publication_date: String,
    #[serde(rename = "ImageFileName", default)]
    pub image_file_name: Option<String>,
    #[serde(rename = "Guid")]
    pub guid: String,
}

impl From<&NewsItem> for PublicationRecord {
    fn from(item: &NewsItem) -> Self {
        Self {
            title: item.title.clone(),
            description: item.description.clone(),
            publication_date: item.published_at.format(RECORD_DATE_FORMAT).to_string(),
            image_file_name: item
                .image_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            guid: item.guid.clone(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_pool_size_counts_endpoints() {
        let pool = SourcePool {
            name: "TravelLinks".to_string(),
            sources: vec![
                NamedSource {
                    name: "a".to_string(),
                    base_url: "https://a.example".to_string(),
                    endpoints: vec!["x".to_string(), "y".to_string()],
                },
                NamedSource {
                    name: "b".to_string(),
                    base_url: "https://b.example".to_string(),
                    endpoints: vec!["z".to_string()],
                },
            ],
        };
        assert_eq!(pool.size(), 3);
    }

    #[test]
    fn test_record_uses_historical_keys() {
        let mut news = item("abc", utc(2025, 5, 6, 14));
        news.image_path = Some(PathBuf::from("image_temp.jpg"));
        let record = PublicationRecord::from(&news);

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""Title":"Title abc""#));
        assert!(json.contains(r#""Publication Date":"Tue, 06 May 2025 14:00 +0000""#));
        assert!(json.contains(r#""ImageFileName":"image_temp.jpg""#));
        assert!(json.contains(r#""Guid":"abc""#));
    }

    #[test]
    fn test_record_without_image_serializes_null() {
        let record = PublicationRecord::from(&item("abc", utc(2025, 5, 6, 14)));
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""ImageFileName":null"#));
    }

    #[test]
    fn test_record_only_needs_guid() {
        let record: PublicationRecord = serde_json::from_str(r#"{"Guid": "xyz"}"#).unwrap();
        assert_eq!(record.guid, "xyz");
        assert!(record.title.is_empty());
    }

    #[test]
    fn test_source_kind_display() {
        assert_eq!(SourceKind::Rss.to_string(), "rss");
        assert_eq!(SourceKind::Html.to_string(), "html");
    }
}
