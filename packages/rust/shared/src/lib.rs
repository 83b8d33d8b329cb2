//! Shared types, error model, and configuration for Snap2Listing.
//!
//! This crate is the foundation depended on by all other Snap2Listing crates.
//! It provides:
//! - [`Snap2ListingError`]: the unified error type
//! - Domain types ([`Keyword`], [`ListingContent`], [`Channel`], [`VideoJob`])
//! - Configuration ([`AppConfig`], config loading, secret lookup)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DatabaseConfig, FalConfig, ObjectStorageConfig, OpenRouterConfig, ServerConfig,
    StripeConfig, SuggestConfig, UsageConfig, VideoConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, read_secret,
};
pub use error::{Result, Snap2ListingError};
pub use types::{
    Channel, FocusArea, Keyword, KeywordGroups, ListingContent, VideoJob, VideoStatus,
    usage_period,
};
