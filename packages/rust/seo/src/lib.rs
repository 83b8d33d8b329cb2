//! Keyword research and listing copy for Snap2Listing.
//!
//! - [`KeywordEngine`] mines long-tail phrases, fuses autosuggests, and
//!   analyzes keyword sets.
//! - [`SeoBrain`] writes channel-specific drafts and optimizes existing copy
//!   through a pluggable [`CopyModel`].

pub mod brain;
pub mod channels;
pub mod keywords;
pub mod model;
pub mod openrouter;
pub mod suggest;
mod text;

pub use brain::{
    Draft, DraftRequest, KeywordCoverage, OptimizationResult, OptimizeRequest, OptimizedListing,
    SeoBrain,
};
pub use channels::ChannelProfile;
pub use keywords::{
    AnalysisSummary, KeywordAnalysis, KeywordEngine, KeywordInsight, KeywordResearch,
    MAX_ANALYZED_KEYWORDS,
};
pub use model::{CopyModel, ListingBrief, RewriteBrief, TemplateCopyModel};
pub use openrouter::OpenRouterCopyModel;
pub use suggest::{HttpSuggestionSource, NoSuggestions, SuggestionSource};
