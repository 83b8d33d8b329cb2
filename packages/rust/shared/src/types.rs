//! Core domain types for Snap2Listing.
//!
//! Everything here crosses the HTTP boundary, so field names serialize in
//! camelCase to match the web client.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Keywords
// ---------------------------------------------------------------------------

/// A mined search phrase with its derived metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keyword {
    /// The phrase itself, lowercase.
    pub keyword: String,
    /// Search volume proxy, 0–100.
    pub volume: f32,
    /// Competition proxy, 0–1 (lower is easier to rank for).
    pub competition: f32,
    /// Share of the phrase grounded in the product title/category, 0–1.
    pub relevance: f32,
    /// Combined ranking score, 0–100.
    pub score: f32,
    /// Number of words in the phrase.
    pub word_count: usize,
}

/// Keywords grouped by theme, in mining priority order
/// (`core`, `descriptive`, `category`, `intent`).
pub type KeywordGroups = IndexMap<String, Vec<Keyword>>;

// ---------------------------------------------------------------------------
// Listing content
// ---------------------------------------------------------------------------

/// Listing copy for a single channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingContent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A part of a listing an optimization pass may rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusArea {
    Title,
    Description,
    Tags,
}

impl FocusArea {
    /// Every focus area, in the order they are applied.
    pub const ALL: [FocusArea; 3] = [Self::Title, Self::Description, Self::Tags];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Description => "description",
            Self::Tags => "tags",
        }
    }
}

impl std::str::FromStr for FocusArea {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "title" => Ok(Self::Title),
            "description" => Ok(Self::Description),
            "tags" => Ok(Self::Tags),
            other => Err(format!("unknown focus area '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// A sales marketplace listing content can be exported to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    /// Display name (sort key for listings).
    pub name: String,
    /// Stable machine name, e.g. `etsy`.
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Video jobs
// ---------------------------------------------------------------------------

/// Lifecycle state of a video generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for VideoStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown video status '{other}'")),
        }
    }
}

/// A recorded video generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoJob {
    pub id: String,
    /// Provider-side request id, used for status lookups.
    pub request_id: String,
    pub user_id: String,
    pub prompt: String,
    pub base_image_url: String,
    pub status: VideoStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// 0–100.
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Quota bucket for a point in time: the UTC calendar month, `YYYY-MM`.
pub fn usage_period(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn keyword_serializes_camel_case() {
        let kw = Keyword {
            keyword: "ceramic coffee mug".into(),
            volume: 42.0,
            competition: 0.45,
            relevance: 1.0,
            score: 80.5,
            word_count: 3,
        };
        let json = serde_json::to_value(&kw).expect("serialize");
        assert_eq!(json["wordCount"], 3);
        assert_eq!(json["keyword"], "ceramic coffee mug");
    }

    #[test]
    fn listing_content_tolerates_missing_fields() {
        let content: ListingContent =
            serde_json::from_str(r#"{"title":"Mug"}"#).expect("deserialize");
        assert_eq!(content.title, "Mug");
        assert!(content.description.is_empty());
        assert!(content.tags.is_empty());
    }

    #[test]
    fn focus_area_parsing() {
        assert_eq!("Title".parse::<FocusArea>().unwrap(), FocusArea::Title);
        assert_eq!(" tags ".parse::<FocusArea>().unwrap(), FocusArea::Tags);
        assert!("price".parse::<FocusArea>().is_err());

        let parsed: Vec<FocusArea> = serde_json::from_str(r#"["title","description"]"#).unwrap();
        assert_eq!(parsed, vec![FocusArea::Title, FocusArea::Description]);
    }

    #[test]
    fn video_status_string_roundtrip() {
        for status in [
            VideoStatus::Queued,
            VideoStatus::Processing,
            VideoStatus::Completed,
            VideoStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<VideoStatus>().unwrap(), status);
        }
    }

    #[test]
    fn usage_period_is_calendar_month() {
        let at = Utc.with_ymd_and_hms(2026, 3, 31, 23, 59, 59).unwrap();
        assert_eq!(usage_period(at), "2026-03");
    }
}
