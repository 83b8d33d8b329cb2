//! Keyword Engine: long-tail mining, autosuggest fusion, and keyword analysis.
//!
//! Mining is purely lexical. Candidate phrases come from the product's own
//! words; every phrase is scored with proxies for search volume, competition,
//! and relevance to the product title and category.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use snap2listing_shared::{Keyword, KeywordGroups, Result, Snap2ListingError};

use crate::suggest::{NoSuggestions, SuggestionSource};
use crate::text;

/// Keywords kept per group.
pub const MAX_GROUP_SIZE: usize = 12;

/// Upper bound on the candidate list handed to [`KeywordEngine::analyze_keywords`].
pub const MAX_ANALYZED_KEYWORDS: usize = 30;

/// Autosuggests kept by [`KeywordEngine::research`].
pub const AUTOSUGGEST_LIMIT: usize = 10;

/// Marketplace tag count used for tag recommendations.
pub const MAX_RECOMMENDED_TAGS: usize = 13;

/// Longest phrase that still fits a marketplace tag.
pub const TAG_MAX_CHARS: usize = 20;

/// Reciprocal-rank-fusion damping constant.
const RRF_K: f32 = 60.0;

/// Group names, in dedup priority order.
const GROUP_ORDER: [&str; 4] = ["core", "descriptive", "category", "intent"];

/// Buyer-intent prefixes applied to the head phrase.
const INTENT_PREFIXES: [&str; 4] = ["handmade", "personalized", "custom", "unique"];

/// Words that many sellers stuff into listings (raise competition).
const GENERIC_MODIFIERS: &[&str] = &[
    "best", "custom", "cute", "gift", "handmade", "personalized", "unique",
];

// ---------------------------------------------------------------------------
// Analysis types
// ---------------------------------------------------------------------------

/// Per-keyword analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordInsight {
    pub keyword: String,
    pub word_count: usize,
    /// Length in characters.
    pub length: usize,
    /// Three or more words.
    pub long_tail: bool,
    pub competition: f32,
    /// Short enough to be used as a marketplace tag.
    pub fits_tag: bool,
    pub score: f32,
}

/// Aggregate view over an analyzed keyword set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub total: usize,
    pub long_tail_ratio: f32,
    pub average_words: f32,
    /// Highest-scoring keywords that fit as tags.
    pub recommended_tags: Vec<String>,
    /// Best keywords to work into a title.
    pub title_keywords: Vec<String>,
}

/// Output of [`KeywordEngine::analyze_keywords`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordAnalysis {
    pub keywords: Vec<KeywordInsight>,
    pub summary: AnalysisSummary,
}

/// Full keyword research for one product.
#[derive(Debug, Clone, Serialize)]
pub struct KeywordResearch {
    pub grouped: KeywordGroups,
    pub autosuggests: Vec<String>,
    pub analysis: KeywordAnalysis,
}

// ---------------------------------------------------------------------------
// KeywordEngine
// ---------------------------------------------------------------------------

/// Mines and scores search keywords for a product.
pub struct KeywordEngine {
    source: Arc<dyn SuggestionSource>,
}

impl KeywordEngine {
    /// Create an engine backed by `source` for autosuggest mining.
    pub fn new(source: Arc<dyn SuggestionSource>) -> Self {
        Self { source }
    }

    /// Engine with autosuggest mining disabled.
    pub fn offline() -> Self {
        Self::new(Arc::new(NoSuggestions))
    }

    /// Mine long-tail keywords from the product text, grouped by theme.
    ///
    /// Fails with a validation error when the title is blank or nothing
    /// searchable can be mined; on success at least one group is present.
    #[instrument(skip_all, fields(title = %title))]
    pub fn mine_long_tails(
        &self,
        title: &str,
        description: &str,
        category: &str,
    ) -> Result<KeywordGroups> {
        if title.trim().is_empty() {
            return Err(Snap2ListingError::validation("product title must not be empty"));
        }

        let profile = TextProfile::new(title, description, category);
        let title_words = text::words(title);
        let title_content = text::content_words(title);
        let category_content = text::content_words(category);

        // Head phrase: product titles usually end with the noun ("... Coffee Mug").
        let head_noun = title_content.last().cloned();
        let head_bigram = match title_content.as_slice() {
            [.., a, b] => Some(format!("{a} {b}")),
            _ => None,
        };
        let head = head_bigram.clone().or_else(|| head_noun.clone());

        let mut candidates: Vec<(&str, Vec<String>)> = Vec::with_capacity(GROUP_ORDER.len());

        candidates.push(("core", ngrams(&title_words)));

        let descriptive = text::sentences(description)
            .into_iter()
            .flat_map(|s| ngrams(&text::words(s)))
            .filter(|phrase| profile.is_anchored(phrase))
            .collect();
        candidates.push(("descriptive", descriptive));

        let mut category_phrases = Vec::new();
        if category_content.len() >= 2 {
            category_phrases.push(category_content.join(" "));
        }
        for term in &category_content {
            if profile.title_tokens.contains(term) {
                continue;
            }
            if let Some(head) = &head {
                category_phrases.push(format!("{term} {head}"));
            }
        }
        if let (true, Some(noun)) = (category_content.len() >= 2, &head_noun) {
            category_phrases.push(format!("{} {noun}", category_content.join(" ")));
        }
        candidates.push(("category", category_phrases));

        let mut intent = Vec::new();
        if let Some(head) = &head {
            for prefix in INTENT_PREFIXES {
                if !head.split(' ').any(|w| w == prefix) {
                    intent.push(format!("{prefix} {head}"));
                }
            }
            if !head.split(' ').any(|w| w == "gift" || w == "gifts") {
                intent.push(format!("{head} gift"));
            }
        }
        candidates.push(("intent", intent));

        let mut seen: HashSet<String> = HashSet::new();
        let mut groups = KeywordGroups::new();

        for (name, phrases) in candidates {
            let mut scored: Vec<Keyword> = phrases
                .into_iter()
                .map(|p| text::normalize_phrase(&p))
                .filter(|p| p.contains(' '))
                .filter(|p| seen.insert(p.clone()))
                .map(|p| profile.score(&p))
                .collect();

            sort_by_score(&mut scored);
            scored.truncate(MAX_GROUP_SIZE);

            debug!(group = name, kept = scored.len(), "keyword group mined");
            if !scored.is_empty() {
                groups.insert(name.to_string(), scored);
            }
        }

        if groups.is_empty() {
            return Err(Snap2ListingError::validation(
                "no keyword candidates could be mined from the product text",
            ));
        }

        info!(
            groups = groups.len(),
            keywords = groups.values().map(Vec::len).sum::<usize>(),
            "long-tail keywords mined"
        );
        Ok(groups)
    }

    /// Mine query completions for the title and fuse them into one ranking.
    ///
    /// Seeds are queried concurrently; any source error fails the call.
    #[instrument(skip_all, fields(title = %title, source = self.source.name()))]
    pub async fn fuse_autosuggests(&self, title: &str) -> Result<Vec<String>> {
        let content = text::content_words(title);
        if content.is_empty() {
            return Err(Snap2ListingError::validation(
                "product title has no searchable words",
            ));
        }

        let seeds = autosuggest_seeds(&content);
        let lists =
            futures::future::try_join_all(seeds.iter().map(|seed| self.source.suggest(seed)))
                .await?;

        let mut fused: HashMap<String, f32> = HashMap::new();
        for list in &lists {
            let mut in_list = HashSet::new();
            for (rank, raw) in list.iter().enumerate() {
                let norm = text::normalize_phrase(raw);
                if norm.is_empty() || seeds.contains(&norm) || !in_list.insert(norm.clone()) {
                    continue;
                }
                *fused.entry(norm).or_insert(0.0) += 1.0 / (RRF_K + rank as f32 + 1.0);
            }
        }

        let title_set: HashSet<&str> = content.iter().map(String::as_str).collect();
        let mut ranked: Vec<(String, f32)> = fused
            .into_iter()
            .map(|(phrase, score)| {
                let words = text::content_words(&phrase);
                let overlap = if words.is_empty() {
                    0.0
                } else {
                    words.iter().filter(|w| title_set.contains(w.as_str())).count() as f32
                        / words.len() as f32
                };
                (phrase, score * (1.0 + overlap))
            })
            .collect();

        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        info!(seeds = seeds.len(), fused = ranked.len(), "autosuggests fused");
        Ok(ranked.into_iter().map(|(phrase, _)| phrase).collect())
    }

    /// Score a candidate list. Inputs past [`MAX_ANALYZED_KEYWORDS`] are dropped.
    pub fn analyze_keywords(&self, candidates: &[String]) -> KeywordAnalysis {
        if candidates.len() > MAX_ANALYZED_KEYWORDS {
            warn!(
                received = candidates.len(),
                max = MAX_ANALYZED_KEYWORDS,
                "truncating keyword analysis input"
            );
        }

        let mut seen = HashSet::new();
        let keywords: Vec<KeywordInsight> = candidates
            .iter()
            .take(MAX_ANALYZED_KEYWORDS)
            .map(|c| text::normalize_phrase(c))
            .filter(|c| !c.is_empty() && seen.insert(c.clone()))
            .map(|c| insight(&c))
            .collect();

        let total = keywords.len();
        let (long_tail_ratio, average_words) = if total == 0 {
            (0.0, 0.0)
        } else {
            let long_tail = keywords.iter().filter(|k| k.long_tail).count();
            let words: usize = keywords.iter().map(|k| k.word_count).sum();
            (
                text::round2(long_tail as f32 / total as f32),
                text::round2(words as f32 / total as f32),
            )
        };

        let mut by_score: Vec<&KeywordInsight> = keywords.iter().collect();
        by_score.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.keyword.cmp(&b.keyword)));

        let recommended_tags = by_score
            .iter()
            .filter(|k| k.fits_tag)
            .take(MAX_RECOMMENDED_TAGS)
            .map(|k| k.keyword.clone())
            .collect();
        let title_keywords = by_score.iter().take(3).map(|k| k.keyword.clone()).collect();

        KeywordAnalysis {
            summary: AnalysisSummary {
                total,
                long_tail_ratio,
                average_words,
                recommended_tags,
                title_keywords,
            },
            keywords,
        }
    }

    /// Mine, fuse, and analyze in one pass.
    ///
    /// Autosuggests are cut to [`AUTOSUGGEST_LIMIT`]; the analyzed list is
    /// every mined phrase followed by new autosuggests, cut to
    /// [`MAX_ANALYZED_KEYWORDS`].
    #[instrument(skip_all, fields(title = %title))]
    pub async fn research(
        &self,
        title: &str,
        description: &str,
        category: &str,
    ) -> Result<KeywordResearch> {
        let grouped = self.mine_long_tails(title, description, category)?;

        let mut autosuggests = self.fuse_autosuggests(title).await?;
        autosuggests.truncate(AUTOSUGGEST_LIMIT);

        let combined = combine_candidates(&grouped, &autosuggests);
        let analysis = self.analyze_keywords(&combined);

        Ok(KeywordResearch {
            grouped,
            autosuggests,
            analysis,
        })
    }
}

/// Mined phrases (group priority order) then autosuggests not already mined,
/// capped at [`MAX_ANALYZED_KEYWORDS`].
pub fn combine_candidates(grouped: &KeywordGroups, autosuggests: &[String]) -> Vec<String> {
    let ordered_groups = GROUP_ORDER
        .iter()
        .filter_map(|name| grouped.get(*name))
        .chain(
            grouped
                .iter()
                .filter(|(name, _)| !GROUP_ORDER.contains(&name.as_str()))
                .map(|(_, keywords)| keywords),
        );

    let mut seen = HashSet::new();
    let mut combined: Vec<String> = ordered_groups
        .flatten()
        .map(|k| k.keyword.clone())
        .filter(|k| seen.insert(k.clone()))
        .collect();

    combined.extend(
        autosuggests
            .iter()
            .map(|s| text::normalize_phrase(s))
            .filter(|s| !s.is_empty() && seen.insert(s.clone())),
    );

    combined.truncate(MAX_ANALYZED_KEYWORDS);
    combined
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Token weights and anchor sets derived from one product's text.
struct TextProfile {
    weights: HashMap<String, f32>,
    max_weight: f32,
    title_tokens: HashSet<String>,
    category_tokens: HashSet<String>,
}

impl TextProfile {
    fn new(title: &str, description: &str, category: &str) -> Self {
        let mut weights: HashMap<String, f32> = HashMap::new();
        for (source, weight) in [(title, 3.0), (category, 2.0), (description, 1.0)] {
            for word in text::content_words(source) {
                *weights.entry(word).or_insert(0.0) += weight;
            }
        }
        let max_weight = weights.values().copied().fold(1.0, f32::max);

        Self {
            weights,
            max_weight,
            title_tokens: text::content_words(title).into_iter().collect(),
            category_tokens: text::content_words(category).into_iter().collect(),
        }
    }

    /// Whether a phrase mentions the product title or category.
    fn is_anchored(&self, phrase: &str) -> bool {
        text::content_words(phrase)
            .iter()
            .any(|w| self.title_tokens.contains(w) || self.category_tokens.contains(w))
    }

    fn score(&self, phrase: &str) -> Keyword {
        let words = text::words(phrase);
        let content: Vec<&String> = words.iter().filter(|w| !text::is_stop_word(w)).collect();
        let word_count = words.len();

        let volume = if content.is_empty() {
            0.0
        } else {
            let mean = content
                .iter()
                .map(|w| self.weights.get(w.as_str()).copied().unwrap_or(0.5))
                .sum::<f32>()
                / content.len() as f32;
            let damping = 1.0 + 0.15 * word_count.saturating_sub(1) as f32;
            (mean / self.max_weight * 100.0 / damping).min(100.0)
        };

        let relevance = if content.is_empty() {
            0.0
        } else {
            content
                .iter()
                .map(|w| {
                    if self.title_tokens.contains(w.as_str()) {
                        1.0
                    } else if self.category_tokens.contains(w.as_str()) {
                        0.8
                    } else {
                        0.0
                    }
                })
                .sum::<f32>()
                / content.len() as f32
        };

        let competition = competition_for(&words);
        let score = 100.0 * (0.5 * relevance + 0.3 * volume / 100.0 + 0.2 * (1.0 - competition));

        Keyword {
            keyword: words.join(" "),
            volume: text::round2(volume),
            competition: text::round2(competition),
            relevance: text::round2(relevance),
            score: text::round2(score),
            word_count,
        }
    }
}

/// Competition proxy: longer phrases are easier to rank for.
fn competition_for(words: &[String]) -> f32 {
    let base: f32 = match words.len() {
        0 | 1 => 0.9,
        2 => 0.7,
        3 => 0.45,
        _ => 0.3,
    };
    if words.iter().any(|w| GENERIC_MODIFIERS.contains(&w.as_str())) {
        (base + 0.1).min(1.0)
    } else {
        base
    }
}

fn insight(keyword: &str) -> KeywordInsight {
    let words = text::words(keyword);
    let word_count = words.len();
    let length = keyword.chars().count();
    let competition = competition_for(&words);
    let fits_tag = length <= TAG_MAX_CHARS;
    let specificity = word_count.min(4) as f32 / 4.0;
    let score = 100.0
        * (0.45 * specificity + 0.35 * (1.0 - competition) + 0.2 * if fits_tag { 1.0 } else { 0.0 });

    KeywordInsight {
        keyword: keyword.to_string(),
        word_count,
        length,
        long_tail: word_count >= 3,
        competition: text::round2(competition),
        fits_tag,
        score: text::round2(score),
    }
}

fn sort_by_score(keywords: &mut [Keyword]) {
    keywords.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.keyword.cmp(&b.keyword)));
}

/// All 2–4 word windows that neither start nor end with a stop word.
fn ngrams(words: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for start in 0..words.len() {
        for n in 2..=4 {
            let Some(window) = words.get(start..start + n) else {
                break;
            };
            let (first, last) = (&window[0], &window[n - 1]);
            if text::is_stop_word(first) || text::is_stop_word(last) {
                continue;
            }
            out.push(window.join(" "));
        }
    }
    out
}

/// Query seeds for autosuggest mining, most specific first.
fn autosuggest_seeds(content: &[String]) -> Vec<String> {
    let mut seeds = vec![content.iter().take(5).cloned().collect::<Vec<_>>().join(" ")];
    if let [.., a, b] = content {
        seeds.push(format!("{a} {b}"));
    }
    if content.len() >= 3 {
        seeds.push(format!("{} {}", content[0], content[content.len() - 1]));
    }

    let mut seen = HashSet::new();
    seeds.retain(|s| seen.insert(s.clone()));
    seeds
}
