//! Copy model seam: the component that actually writes listing text.
//!
//! [`TemplateCopyModel`] is the deterministic offline writer. The hosted
//! model lives in [`crate::openrouter`].

use async_trait::async_trait;

use snap2listing_shared::{FocusArea, ListingContent, Result};

use crate::channels::ChannelProfile;
use crate::text;

/// Input for writing a fresh listing for one channel.
#[derive(Debug, Clone)]
pub struct ListingBrief {
    pub channel: ChannelProfile,
    /// Image URL or data URL of the product photo.
    pub product_image: String,
    pub short_description: String,
    pub category: String,
    /// Mined keywords, best first.
    pub keywords: Vec<String>,
}

/// Input for rewriting existing copy around target keywords.
#[derive(Debug, Clone)]
pub struct RewriteBrief {
    pub channel: ChannelProfile,
    pub current: ListingContent,
    /// Target keywords, primary first.
    pub target_keywords: Vec<String>,
    pub focus: Vec<FocusArea>,
}

/// Writes and rewrites listing copy.
///
/// Output is not trusted: callers clamp it to channel limits afterwards.
#[async_trait]
pub trait CopyModel: Send + Sync {
    /// Identifier reported alongside generated drafts.
    fn model_id(&self) -> &str;

    async fn write_listing(&self, brief: &ListingBrief) -> Result<ListingContent>;

    /// Rewrite the focused fields of `brief.current`. Unfocused fields may be
    /// returned as-is or omitted.
    async fn rewrite_listing(&self, brief: &RewriteBrief) -> Result<ListingContent>;
}

// ---------------------------------------------------------------------------
// Template model
// ---------------------------------------------------------------------------

/// Keyword-template writer that needs no network access.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateCopyModel;

#[async_trait]
impl CopyModel for TemplateCopyModel {
    fn model_id(&self) -> &str {
        "template"
    }

    async fn write_listing(&self, brief: &ListingBrief) -> Result<ListingContent> {
        let summary = text::normalize_phrase(&brief.short_description);
        let primary = brief.keywords.first().cloned().unwrap_or_else(|| summary.clone());

        let mut title_parts = vec![text::title_case(&primary)];
        if let Some(second) = brief.keywords.get(1) {
            title_parts.push(text::title_case(second));
        }
        let category = brief.category.trim();
        if !category.is_empty() {
            title_parts.push(category.to_string());
        }
        dedupe_ignoring_case(&mut title_parts);

        let lead = brief.short_description.trim().trim_end_matches('.');
        let mut description = format!("{}.", text::capitalize(lead));
        let extras: Vec<&str> = brief.keywords.iter().skip(1).take(3).map(String::as_str).collect();
        if !extras.is_empty() {
            description.push_str(&format!(
                " A thoughtful pick for anyone shopping for {}.",
                extras.join(", ")
            ));
        }
        if !category.is_empty() {
            description.push_str(&format!("\n\nCategory: {category}."));
        }

        let mut tags = brief.keywords.clone();
        tags.extend(text::content_words(category));
        tags.extend(text::content_words(&brief.short_description));

        Ok(ListingContent {
            title: title_parts.join(" | "),
            description,
            tags,
        })
    }

    async fn rewrite_listing(&self, brief: &RewriteBrief) -> Result<ListingContent> {
        let mut content = brief.current.clone();

        if brief.focus.contains(&FocusArea::Title) {
            let have = text::normalize_phrase(&content.title);
            let mut parts = vec![content.title.trim().to_string()];
            for kw in brief.target_keywords.iter().skip(1).take(2) {
                let kw = text::normalize_phrase(kw);
                if !kw.is_empty() && !have.contains(&kw) {
                    parts.push(text::title_case(&kw));
                }
            }
            parts.retain(|p| !p.is_empty());
            content.title = parts.join(" | ");
        }

        if brief.focus.contains(&FocusArea::Tags) {
            let mut tags = brief.target_keywords.clone();
            tags.extend(content.tags);
            content.tags = tags;
        }

        Ok(content)
    }
}

fn dedupe_ignoring_case(parts: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    parts.retain(|p| !p.is_empty() && seen.insert(p.to_lowercase()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels;

    fn brief() -> ListingBrief {
        ListingBrief {
            channel: channels::profile("etsy").unwrap(),
            product_image: "https://cdn.example.com/mug.jpg".into(),
            short_description: "handmade ceramic coffee mug".into(),
            category: "Kitchen & Dining".into(),
            keywords: vec![
                "ceramic coffee mug".into(),
                "handmade coffee mug".into(),
                "coffee mug gift".into(),
            ],
        }
    }

    #[tokio::test]
    async fn template_writes_keyword_led_copy() {
        let content = TemplateCopyModel.write_listing(&brief()).await.unwrap();
        assert!(content.title.starts_with("Ceramic Coffee Mug"));
        assert!(content.description.starts_with("Handmade ceramic coffee mug."));
        assert!(content.description.contains("coffee mug gift"));
        assert_eq!(content.tags[0], "ceramic coffee mug");
    }

    #[tokio::test]
    async fn template_rewrite_leaves_unfocused_fields() {
        let rewrite = RewriteBrief {
            channel: channels::profile("etsy").unwrap(),
            current: ListingContent {
                title: "Blue Mug".into(),
                description: "A mug.".into(),
                tags: vec!["mug".into()],
            },
            target_keywords: vec!["blue mug".into(), "stoneware mug".into()],
            focus: vec![FocusArea::Title],
        };

        let content = TemplateCopyModel.rewrite_listing(&rewrite).await.unwrap();
        assert_eq!(content.title, "Blue Mug | Stoneware Mug");
        assert_eq!(content.description, "A mug.");
        assert_eq!(content.tags, vec!["mug"]);
    }
}
