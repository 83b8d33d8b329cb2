//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use snap2listing_seo::{
    CopyModel, DraftRequest, HttpSuggestionSource, KeywordEngine, OpenRouterCopyModel, SeoBrain,
    SuggestionSource, TemplateCopyModel,
};
use snap2listing_server::AppState;
use snap2listing_shared::{AppConfig, init_config, load_config, usage_period};
use snap2listing_storage::{Storage, VIDEO_RESOURCE};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Snap2Listing: product photos to marketplace-ready listings.
#[derive(Parser)]
#[command(
    name = "snap2listing",
    version,
    about = "Keyword research, listing copy, and the Snap2Listing HTTP API.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the HTTP API.
    Serve {
        /// Address to bind (overrides `server.bind`).
        #[arg(long)]
        bind: Option<String>,

        /// Database file (overrides `database.path`).
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Research keywords for a product.
    Keywords {
        /// Product title.
        #[arg(long)]
        title: String,

        /// Product description.
        #[arg(long, default_value = "")]
        description: String,

        /// Product category.
        #[arg(long, default_value = "")]
        category: String,

        /// Skip autosuggest mining (no network).
        #[arg(long)]
        offline: bool,

        /// Print the full research as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate listing drafts for one or more channels.
    Draft {
        /// Product image URL.
        #[arg(long)]
        image: String,

        /// Short description of the product.
        #[arg(long)]
        description: String,

        /// Product category.
        #[arg(long)]
        category: String,

        /// Target channel slug (repeatable).
        #[arg(long = "channel", required = true)]
        channels: Vec<String>,
    },

    /// Manage sales channels.
    Channels {
        #[command(subcommand)]
        action: ChannelsAction,
    },

    /// Inspect and adjust usage quotas.
    Usage {
        #[command(subcommand)]
        action: UsageAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Channel subcommands.
#[derive(Subcommand)]
pub(crate) enum ChannelsAction {
    /// List channels sorted by name.
    List,
    /// Register a new channel.
    Add {
        /// Display name.
        name: String,

        /// Machine name (defaults to the lowercased name).
        #[arg(long)]
        slug: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },
}

/// Usage subcommands.
#[derive(Subcommand)]
pub(crate) enum UsageAction {
    /// Show this month's video usage for a user.
    Show { user: String },
    /// Override a user's monthly video limit.
    SetLimit { user: String, limit: u32 },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "snap2listing=info,tower_http=info",
        1 => "snap2listing=debug,tower_http=debug",
        _ => "snap2listing=trace,tower_http=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve { bind, db } => cmd_serve(bind, db).await,
        Command::Keywords {
            title,
            description,
            category,
            offline,
            json,
        } => cmd_keywords(&title, &description, &category, offline, json).await,
        Command::Draft {
            image,
            description,
            category,
            channels,
        } => cmd_draft(image, description, category, channels).await,
        Command::Channels { action } => match action {
            ChannelsAction::List => cmd_channels_list().await,
            ChannelsAction::Add {
                name,
                slug,
                description,
            } => cmd_channels_add(&name, slug.as_deref(), description.as_deref()).await,
        },
        Command::Usage { action } => match action {
            UsageAction::Show { user } => cmd_usage_show(&user).await,
            UsageAction::SetLimit { user, limit } => cmd_usage_set_limit(&user, limit).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

async fn open_storage(config: &AppConfig, db: Option<PathBuf>) -> Result<Storage> {
    let path = match db {
        Some(path) => path,
        None => config.database.resolved_path()?,
    };
    info!(path = %path.display(), "opening database");
    Ok(Storage::open(&path).await?)
}

fn keyword_engine(config: &AppConfig, offline: bool) -> Result<KeywordEngine> {
    if offline || !config.suggest.enabled {
        return Ok(KeywordEngine::offline());
    }
    let source: Arc<dyn SuggestionSource> = Arc::new(HttpSuggestionSource::from_config(&config.suggest)?);
    Ok(KeywordEngine::new(source))
}

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(bind: Option<String>, db: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, db).await?;
    let state = Arc::new(AppState::from_config(&config, storage)?);

    let addr = bind.unwrap_or_else(|| config.server.bind.clone());
    let body_limit = config.server.body_limit_mb * 1024 * 1024;
    snap2listing_server::serve(state, &addr, body_limit).await?;
    Ok(())
}

async fn cmd_keywords(
    title: &str,
    description: &str,
    category: &str,
    offline: bool,
    json: bool,
) -> Result<()> {
    let config = load_config()?;
    let engine = keyword_engine(&config, offline)?;

    let progress = spinner("Researching keywords...");
    let research = engine.research(title, description, category).await;
    progress.finish_and_clear();
    let research = research?;

    if json {
        println!("{}", serde_json::to_string_pretty(&research)?);
        return Ok(());
    }

    println!();
    for (group, keywords) in &research.grouped {
        println!("  [{group}]");
        for kw in keywords {
            println!(
                "    {:<40} score {:>5.1}  volume {:>5.1}  competition {:.2}",
                kw.keyword, kw.score, kw.volume, kw.competition
            );
        }
    }
    if !research.autosuggests.is_empty() {
        println!("  [autosuggest]");
        for suggestion in &research.autosuggests {
            println!("    {suggestion}");
        }
    }
    let summary = &research.analysis.summary;
    println!();
    println!("  Analyzed:       {}", summary.total);
    println!("  Long-tail:      {:.0}%", summary.long_tail_ratio * 100.0);
    println!("  Title keywords: {}", summary.title_keywords.join(", "));
    println!("  Tags:           {}", summary.recommended_tags.join(", "));
    println!();
    Ok(())
}

async fn cmd_draft(
    image: String,
    description: String,
    category: String,
    channels: Vec<String>,
) -> Result<()> {
    let config = load_config()?;
    // Drafts mine keywords from the description only.
    let keywords = Arc::new(KeywordEngine::offline());
    let model: Arc<dyn CopyModel> = match OpenRouterCopyModel::from_config(&config.openrouter)? {
        Some(model) => Arc::new(model),
        None => Arc::new(TemplateCopyModel),
    };
    let brain = SeoBrain::new(model, keywords);

    let request = DraftRequest {
        product_image: image,
        short_description: description,
        category,
        channels,
    };

    let progress = spinner(&format!("Writing drafts with {}...", brain.model_id()));
    let draft = brain.generate_draft(&request).await;
    progress.finish_and_clear();
    let draft = draft?;

    for (channel, listing) in &draft.channels {
        println!();
        println!("  == {channel} ==");
        println!("  Title: {}", listing.title);
        if !listing.tags.is_empty() {
            println!("  Tags:  {}", listing.tags.join(", "));
        }
        println!();
        for line in listing.description.lines() {
            println!("  {line}");
        }
    }
    println!();
    Ok(())
}

async fn cmd_channels_list() -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, None).await?;

    for channel in storage.list_channels().await? {
        let state = if channel.is_active { "active" } else { "inactive" };
        println!(
            "  {:<16} {:<12} {:<8} {}",
            channel.name,
            channel.slug,
            state,
            channel.description.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

async fn cmd_channels_add(name: &str, slug: Option<&str>, description: Option<&str>) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(eyre!("channel name must not be empty"));
    }
    let slug = slug
        .map(str::to_string)
        .unwrap_or_else(|| name.to_lowercase().split_whitespace().collect::<Vec<_>>().join("-"));

    let config = load_config()?;
    let storage = open_storage(&config, None).await?;
    let channel = storage.insert_channel(name, &slug, description).await?;
    println!("Channel added: {} ({})", channel.name, channel.slug);
    Ok(())
}

async fn cmd_usage_show(user: &str) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, None).await?;
    let period = usage_period(Utc::now());
    let usage = storage
        .get_usage(user, VIDEO_RESOURCE, &period, config.usage.video_monthly_limit)
        .await?;

    println!("  User:      {user}");
    println!("  Period:    {period}");
    println!("  Videos:    {} / {}", usage.used, usage.limit);
    println!("  Remaining: {}", usage.remaining());
    Ok(())
}

async fn cmd_usage_set_limit(user: &str, limit: u32) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, None).await?;
    storage.set_user_limit(user, VIDEO_RESOURCE, limit).await?;
    println!("Monthly video limit for {user} set to {limit}");
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
