//! Application configuration for Snap2Listing.
//!
//! User config lives at `~/.snap2listing/snap2listing.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets never live in the file: each section names the env var holding them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, Snap2ListingError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "snap2listing.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".snap2listing";

// ---------------------------------------------------------------------------
// Config structs (matching snap2listing.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Data store location.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// OpenRouter settings for copy generation.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Search-suggestion source for autosuggest mining.
    #[serde(default)]
    pub suggest: SuggestConfig,

    /// Billing portal (Stripe).
    #[serde(default)]
    pub stripe: StripeConfig,

    /// Video generation (FAL queue API).
    #[serde(default)]
    pub fal: FalConfig,

    /// Object storage for uploaded images.
    #[serde(default)]
    pub object_storage: ObjectStorageConfig,

    /// Usage quotas.
    #[serde(default)]
    pub usage: UsageConfig,

    /// Video status polling.
    #[serde(default)]
    pub video: VideoConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Public origin of the web app, used to build redirect URLs.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Maximum accepted request body, in megabytes.
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,

    /// Let the download proxy reach loopback/private hosts.
    #[serde(default)]
    pub allow_private_downloads: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            public_base_url: default_public_base_url(),
            body_limit_mb: default_body_limit_mb(),
            allow_private_downloads: false,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".into()
}
fn default_public_base_url() -> String {
    "http://localhost:3000".into()
}
fn default_body_limit_mb() -> usize {
    12
}

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the libSQL database file. `~` expands to the home directory.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "~/.snap2listing/snap2listing.db".into()
}

impl DatabaseConfig {
    /// Resolve the configured path, expanding a leading `~/`.
    pub fn resolved_path(&self) -> Result<PathBuf> {
        match self.path.strip_prefix("~/") {
            Some(rest) => {
                let home = dirs::home_dir().ok_or_else(|| {
                    Snap2ListingError::config("could not determine home directory")
                })?;
                Ok(home.join(rest))
            }
            None => Ok(PathBuf::from(&self.path)),
        }
    }
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_openrouter_key_env")]
    pub api_key_env: String,

    /// Model used for listing copy.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// API base URL.
    #[serde(default = "default_openrouter_base_url")]
    pub base_url: String,

    /// Per-request timeout.
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_openrouter_key_env(),
            default_model: default_model(),
            base_url: default_openrouter_base_url(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

fn default_openrouter_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_openrouter_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_generation_timeout() -> u64 {
    60
}

/// `[suggest]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestConfig {
    /// When false, autosuggest mining yields nothing.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Query-completion endpoint (Firefox/OpenSearch JSON format).
    #[serde(default = "default_suggest_endpoint")]
    pub endpoint: String,

    /// Per-request timeout.
    #[serde(default = "default_suggest_timeout")]
    pub timeout_secs: u64,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_suggest_endpoint(),
            timeout_secs: default_suggest_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_suggest_endpoint() -> String {
    "https://suggestqueries.google.com/complete/search".into()
}
fn default_suggest_timeout() -> u64 {
    5
}

/// `[stripe]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeConfig {
    /// Name of the env var holding the secret key.
    #[serde(default = "default_stripe_key_env")]
    pub secret_key_env: String,

    /// API base URL.
    #[serde(default = "default_stripe_base_url")]
    pub api_base: String,

    /// Path on the web app the portal returns to.
    #[serde(default = "default_return_path")]
    pub return_path: String,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key_env: default_stripe_key_env(),
            api_base: default_stripe_base_url(),
            return_path: default_return_path(),
        }
    }
}

fn default_stripe_key_env() -> String {
    "STRIPE_SECRET_KEY".into()
}
fn default_stripe_base_url() -> String {
    "https://api.stripe.com".into()
}
fn default_return_path() -> String {
    "/app/settings/billing".into()
}

/// `[fal]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FalConfig {
    /// Name of the env var holding the FAL key.
    #[serde(default = "default_fal_key_env")]
    pub api_key_env: String,

    /// Image-to-video model id.
    #[serde(default = "default_fal_model")]
    pub model: String,

    /// Queue API base URL.
    #[serde(default = "default_fal_queue_base")]
    pub queue_base: String,

    /// Delay between status polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Give up waiting for a result after this long.
    #[serde(default = "default_max_wait")]
    pub max_wait_secs: u64,
}

impl Default for FalConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_fal_key_env(),
            model: default_fal_model(),
            queue_base: default_fal_queue_base(),
            poll_interval_ms: default_poll_interval(),
            max_wait_secs: default_max_wait(),
        }
    }
}

fn default_fal_key_env() -> String {
    "FAL_KEY".into()
}
fn default_fal_model() -> String {
    "fal-ai/kling-video/v1.6/standard/image-to-video".into()
}
fn default_fal_queue_base() -> String {
    "https://queue.fal.run".into()
}
fn default_poll_interval() -> u64 {
    2000
}
fn default_max_wait() -> u64 {
    600
}

/// `[object_storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    /// Base URL of the storage API (`<base>/storage/v1/object/...`).
    #[serde(default)]
    pub base_url: String,

    /// Bucket receiving uploads.
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Name of the env var holding the service key.
    #[serde(default = "default_storage_key_env")]
    pub service_key_env: String,

    /// Maximum decoded upload size, in megabytes.
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            bucket: default_bucket(),
            service_key_env: default_storage_key_env(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

fn default_bucket() -> String {
    "product-images".into()
}
fn default_storage_key_env() -> String {
    "STORAGE_SERVICE_KEY".into()
}
fn default_max_upload_mb() -> usize {
    8
}

/// `[usage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageConfig {
    /// Videos per user per calendar month, unless overridden per user.
    #[serde(default = "default_video_limit")]
    pub video_monthly_limit: u32,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            video_monthly_limit: default_video_limit(),
        }
    }
}

fn default_video_limit() -> u32 {
    3
}

/// `[video]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Artificial delay before the status endpoint answers.
    #[serde(default = "default_status_delay")]
    pub status_delay_ms: u64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            status_delay_ms: default_status_delay(),
        }
    }
}

fn default_status_delay() -> u64 {
    1500
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.snap2listing/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Snap2ListingError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.snap2listing/snap2listing.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| Snap2ListingError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        Snap2ListingError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    tracing::debug!(?path, bind = %config.server.bind, "loaded config file");
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| Snap2ListingError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| Snap2ListingError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| Snap2ListingError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a secret from the named env var. Empty values count as unset.
pub fn read_secret(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Some(val),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("public_base_url"));
        assert!(toml_str.contains("OPENROUTER_API_KEY"));
        assert!(toml_str.contains("STRIPE_SECRET_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.usage.video_monthly_limit, 3);
        assert_eq!(parsed.fal.api_key_env, "FAL_KEY");
        assert_eq!(parsed.server.bind, "127.0.0.1:3000");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[server]
bind = "0.0.0.0:8080"

[usage]
video_monthly_limit = 25
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.server.public_base_url, "http://localhost:3000");
        assert_eq!(config.usage.video_monthly_limit, 25);
        assert!(config.suggest.enabled);
        assert_eq!(config.object_storage.bucket, "product-images");
    }

    #[test]
    fn db_path_without_tilde_is_kept() {
        let db = DatabaseConfig {
            path: "/var/lib/snap2listing.db".into(),
        };
        assert_eq!(
            db.resolved_path().unwrap(),
            PathBuf::from("/var/lib/snap2listing.db")
        );
    }

    #[test]
    fn missing_secret_is_none() {
        // Use a unique env var name to avoid interfering with other tests
        assert!(read_secret("S2L_TEST_NONEXISTENT_KEY_12345").is_none());
    }

    #[test]
    fn load_from_file() {
        let path = std::env::temp_dir().join(format!("s2l_cfg_{}.toml", uuid::Uuid::now_v7()));
        std::fs::write(&path, "[video]\nstatus_delay_ms = 0\n").unwrap();
        let config = load_config_from(&path).expect("load");
        assert_eq!(config.video.status_delay_ms, 0);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn malformed_file_is_config_error() {
        let path = std::env::temp_dir().join(format!("s2l_cfg_{}.toml", uuid::Uuid::now_v7()));
        std::fs::write(&path, "[server\nbind = ").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().starts_with("config error"));
        std::fs::remove_file(&path).ok();
    }
}
