//! SEO Brain: channel-aware listing drafts and keyword optimization.
//!
//! The copy model writes the prose; the brain owns the guarantees. Whatever
//! the model returns is clamped to the channel profile, and optimization
//! passes re-check that target keywords actually landed where they belong.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use snap2listing_shared::{FocusArea, Keyword, ListingContent, Result, Snap2ListingError};

use crate::channels::{self, ChannelProfile};
use crate::keywords::KeywordEngine;
use crate::model::{CopyModel, ListingBrief, RewriteBrief};
use crate::text;

/// Keywords handed to the copy model per draft.
const DRAFT_KEYWORDS: usize = 10;

// ---------------------------------------------------------------------------
// Requests and results
// ---------------------------------------------------------------------------

/// Input for [`SeoBrain::generate_draft`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRequest {
    #[serde(default)]
    pub product_image: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub channels: Vec<String>,
}

/// A generated draft: one listing per requested channel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub id: String,
    pub product_image: String,
    pub short_description: String,
    pub category: String,
    /// Listings keyed by channel slug.
    pub channels: BTreeMap<String, ListingContent>,
    /// Keywords the copy was written around, best first.
    pub keywords: Vec<Keyword>,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

/// Input for [`SeoBrain::optimize`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRequest {
    #[serde(default)]
    pub current_content: ListingContent,
    #[serde(default)]
    pub target_keywords: Vec<String>,
    #[serde(default)]
    pub channels: Vec<String>,
    /// `None` or empty means every focus area.
    #[serde(default)]
    pub focus_areas: Option<Vec<FocusArea>>,
}

/// Which target keywords appear anywhere in a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordCoverage {
    pub matched: Vec<String>,
    pub missing: Vec<String>,
    pub ratio: f32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedListing {
    pub content: ListingContent,
    /// Human-readable summary of what changed on this channel.
    pub changes: Vec<String>,
    pub coverage_before: KeywordCoverage,
    pub coverage_after: KeywordCoverage,
}

/// Output of [`SeoBrain::optimize`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    /// Listings keyed by channel slug.
    pub channels: BTreeMap<String, OptimizedListing>,
    pub focus_areas: Vec<FocusArea>,
    /// Normalized targets, primary first.
    pub target_keywords: Vec<String>,
    pub model: String,
}

// ---------------------------------------------------------------------------
// SeoBrain
// ---------------------------------------------------------------------------

pub struct SeoBrain {
    model: Arc<dyn CopyModel>,
    keywords: Arc<KeywordEngine>,
}

impl SeoBrain {
    pub fn new(model: Arc<dyn CopyModel>, keywords: Arc<KeywordEngine>) -> Self {
        Self { model, keywords }
    }

    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    /// Write a listing per channel from a product photo and short description.
    #[instrument(skip_all, fields(channels = request.channels.len()))]
    pub async fn generate_draft(&self, request: &DraftRequest) -> Result<Draft> {
        require("productImage", &request.product_image)?;
        require("shortDescription", &request.short_description)?;
        require("category", &request.category)?;
        if request.channels.is_empty() {
            return Err(Snap2ListingError::validation("channels must not be empty"));
        }
        let profiles = channels::resolve(&request.channels)?;

        let groups =
            self.keywords
                .mine_long_tails(&request.short_description, "", &request.category)?;
        let mut ranked: Vec<Keyword> = groups.into_values().flatten().collect();
        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.keyword.cmp(&b.keyword))
        });
        ranked.truncate(DRAFT_KEYWORDS);
        let keyword_list: Vec<String> = ranked.iter().map(|k| k.keyword.clone()).collect();

        let listings = futures::future::try_join_all(profiles.iter().map(|profile| {
            let brief = ListingBrief {
                channel: *profile,
                product_image: request.product_image.clone(),
                short_description: request.short_description.clone(),
                category: request.category.clone(),
                keywords: keyword_list.clone(),
            };
            async move {
                let content = self.model.write_listing(&brief).await?;
                Ok::<_, Snap2ListingError>((profile.slug.to_string(), profile.fit(content)))
            }
        }))
        .await?;

        info!(
            model = self.model.model_id(),
            listings = listings.len(),
            keywords = ranked.len(),
            "draft generated"
        );

        Ok(Draft {
            id: Uuid::now_v7().to_string(),
            product_image: request.product_image.trim().to_string(),
            short_description: request.short_description.trim().to_string(),
            category: request.category.trim().to_string(),
            channels: listings.into_iter().collect(),
            keywords: ranked,
            model: self.model.model_id().to_string(),
            created_at: Utc::now(),
        })
    }

    /// Rewrite existing copy around target keywords, per channel.
    #[instrument(skip_all, fields(channels = request.channels.len()))]
    pub async fn optimize(&self, request: &OptimizeRequest) -> Result<OptimizationResult> {
        let current = &request.current_content;
        if current.title.trim().is_empty()
            && current.description.trim().is_empty()
            && current.tags.is_empty()
        {
            return Err(Snap2ListingError::validation("currentContent must not be empty"));
        }

        let targets = normalize_targets(&request.target_keywords);
        if targets.is_empty() {
            return Err(Snap2ListingError::validation("targetKeywords must not be empty"));
        }
        if request.channels.is_empty() {
            return Err(Snap2ListingError::validation("channels must not be empty"));
        }
        let profiles = channels::resolve(&request.channels)?;
        let focus = resolve_focus(request.focus_areas.as_deref());

        let rewrites = futures::future::try_join_all(profiles.iter().map(|profile| {
            let brief = RewriteBrief {
                channel: *profile,
                current: current.clone(),
                target_keywords: targets.clone(),
                focus: focus.clone(),
            };
            async move {
                let rewritten = self.model.rewrite_listing(&brief).await?;
                Ok::<_, Snap2ListingError>((*profile, rewritten))
            }
        }))
        .await?;

        let coverage_before = coverage(current, &targets);
        let mut listings = BTreeMap::new();

        for (profile, rewritten) in rewrites {
            let mut changes = Vec::new();
            let content = apply_rewrite(&profile, current, rewritten, &targets, &focus, &mut changes);
            let coverage_after = coverage(&content, &targets);
            listings.insert(
                profile.slug.to_string(),
                OptimizedListing {
                    content,
                    changes,
                    coverage_before: coverage_before.clone(),
                    coverage_after,
                },
            );
        }

        info!(
            model = self.model.model_id(),
            listings = listings.len(),
            changes = listings.values().map(|l| l.changes.len()).sum::<usize>(),
            "listing optimized"
        );

        Ok(OptimizationResult {
            channels: listings,
            focus_areas: focus,
            target_keywords: targets,
            model: self.model.model_id().to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Optimization rules
// ---------------------------------------------------------------------------

/// Merge a model rewrite into `current`, enforcing keyword placement on the
/// focused fields. Unfocused fields are copied from `current` verbatim.
fn apply_rewrite(
    profile: &ChannelProfile,
    current: &ListingContent,
    rewritten: ListingContent,
    targets: &[String],
    focus: &[FocusArea],
    changes: &mut Vec<String>,
) -> ListingContent {
    let primary = &targets[0];
    let mut content = current.clone();

    if focus.contains(&FocusArea::Title) {
        let mut title = non_empty_or(&rewritten.title, &current.title);
        if !contains_phrase(&title, primary) {
            title = if title.is_empty() {
                text::title_case(primary)
            } else {
                format!("{} | {}", text::title_case(primary), title)
            };
            changes.push(format!("front-loaded '{primary}' in title"));
        }
        let title = profile.fit_title(&title);
        if title != current.title {
            changes.push("title rewritten".to_string());
        }
        content.title = title;
    }

    if focus.contains(&FocusArea::Description) {
        let mut description = non_empty_or(&rewritten.description, &current.description);
        let first_sentence = text::sentences(&description).first().map(|s| s.to_string());
        if !first_sentence.is_some_and(|s| contains_phrase(&s, primary)) {
            description = if description.is_empty() {
                format!("{}.", text::capitalize(primary))
            } else {
                format!("{}. {}", text::capitalize(primary), description)
            };
            changes.push(format!("opened description with '{primary}'"));
        }
        let description = profile.fit_description(&description);
        if description != current.description {
            changes.push("description rewritten".to_string());
        }
        content.description = description;
    }

    if focus.contains(&FocusArea::Tags) {
        let source = if rewritten.tags.is_empty() {
            &current.tags
        } else {
            &rewritten.tags
        };
        let mut tags: Vec<String> = targets
            .iter()
            .filter(|t| profile.accepts_tag(t))
            .cloned()
            .collect();
        tags.extend(source.iter().cloned());
        let tags = profile.fit_tags(&tags);

        let before: HashSet<String> = current.tags.iter().map(|t| t.trim().to_lowercase()).collect();
        let added = tags.iter().filter(|t| !before.contains(*t)).count();
        if added > 0 {
            changes.push(format!("added {added} tag(s)"));
        }
        content.tags = tags;
    }

    content
}

/// Keyword coverage over title, description, and tags.
pub fn coverage(content: &ListingContent, targets: &[String]) -> KeywordCoverage {
    let haystack = format!(
        "{} {} {}",
        content.title,
        content.description,
        content.tags.join(" ")
    );
    let (matched, missing): (Vec<String>, Vec<String>) = targets
        .iter()
        .cloned()
        .partition(|t| contains_phrase(&haystack, t));

    let ratio = if targets.is_empty() {
        0.0
    } else {
        text::round2(matched.len() as f32 / targets.len() as f32)
    };

    KeywordCoverage {
        matched,
        missing,
        ratio,
    }
}

/// Whole-word phrase containment after normalization.
fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    let needle = text::normalize_phrase(phrase);
    if needle.is_empty() {
        return false;
    }
    format!(" {} ", text::normalize_phrase(haystack)).contains(&format!(" {needle} "))
}

fn normalize_targets(raw: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.iter()
        .map(|k| text::normalize_phrase(k))
        .filter(|k| !k.is_empty() && seen.insert(k.clone()))
        .collect()
}

fn resolve_focus(requested: Option<&[FocusArea]>) -> Vec<FocusArea> {
    match requested {
        Some(areas) if !areas.is_empty() => {
            FocusArea::ALL.into_iter().filter(|a| areas.contains(a)).collect()
        }
        _ => FocusArea::ALL.to_vec(),
    }
}

fn non_empty_or(preferred: &str, fallback: &str) -> String {
    let preferred = preferred.trim();
    if preferred.is_empty() {
        fallback.trim().to_string()
    } else {
        preferred.to_string()
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Snap2ListingError::validation(format!("{field} is required")))
    } else {
        Ok(())
    }
}
