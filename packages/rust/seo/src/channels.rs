//! Per-marketplace listing limits.

use std::collections::HashSet;

use snap2listing_shared::{ListingContent, Result, Snap2ListingError};

use crate::text;

/// Listing limits for one sales channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelProfile {
    pub slug: &'static str,
    pub display_name: &'static str,
    /// Maximum title length in characters.
    pub title_max: usize,
    pub description_max: usize,
    /// Maximum number of tags (0 = channel has no tags).
    pub tag_limit: usize,
    pub tag_max_chars: usize,
}

const PROFILES: &[ChannelProfile] = &[
    ChannelProfile {
        slug: "etsy",
        display_name: "Etsy",
        title_max: 140,
        description_max: 5000,
        tag_limit: 13,
        tag_max_chars: 20,
    },
    ChannelProfile {
        slug: "shopify",
        display_name: "Shopify",
        title_max: 255,
        description_max: 5000,
        tag_limit: 20,
        tag_max_chars: 255,
    },
    ChannelProfile {
        slug: "amazon",
        display_name: "Amazon",
        title_max: 200,
        description_max: 2000,
        tag_limit: 5,
        tag_max_chars: 50,
    },
    ChannelProfile {
        slug: "ebay",
        display_name: "eBay",
        title_max: 80,
        description_max: 4000,
        tag_limit: 0,
        tag_max_chars: 0,
    },
];

/// All known channel profiles.
pub fn profiles() -> &'static [ChannelProfile] {
    PROFILES
}

/// Look up a profile by slug (case-insensitive).
pub fn profile(slug: &str) -> Result<ChannelProfile> {
    let wanted = slug.trim().to_ascii_lowercase();
    PROFILES
        .iter()
        .find(|p| p.slug == wanted)
        .copied()
        .ok_or_else(|| Snap2ListingError::validation(format!("unknown channel '{slug}'")))
}

/// Resolve a list of slugs, failing on the first unknown one.
pub fn resolve(slugs: &[String]) -> Result<Vec<ChannelProfile>> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(slugs.len());
    for slug in slugs {
        let p = profile(slug)?;
        if seen.insert(p.slug) {
            out.push(p);
        }
    }
    Ok(out)
}

impl ChannelProfile {
    /// Clamp every field of `content` to this channel's limits.
    pub fn fit(&self, content: ListingContent) -> ListingContent {
        ListingContent {
            title: self.fit_title(&content.title),
            description: self.fit_description(&content.description),
            tags: self.fit_tags(&content.tags),
        }
    }

    pub fn fit_title(&self, title: &str) -> String {
        let collapsed = title.split_whitespace().collect::<Vec<_>>().join(" ");
        text::truncate_at_word(&collapsed, self.title_max)
    }

    pub fn fit_description(&self, description: &str) -> String {
        text::truncate_at_word(description.trim(), self.description_max)
    }

    /// Lowercase, dedupe, drop over-long tags, and cap the count.
    pub fn fit_tags(&self, tags: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        tags.iter()
            .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
            .filter(|t| !t.is_empty() && t.chars().count() <= self.tag_max_chars)
            .filter(|t| seen.insert(t.clone()))
            .take(self.tag_limit)
            .collect()
    }

    /// Whether `tag` would survive [`fit_tags`](Self::fit_tags) on length alone.
    pub fn accepts_tag(&self, tag: &str) -> bool {
        let len = tag.trim().chars().count();
        len > 0 && len <= self.tag_max_chars
    }
}
