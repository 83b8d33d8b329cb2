//! SQL migration definitions for the Snap2Listing database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: channels, usage quotas, user limits, video jobs",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Sales channels listing content can be exported to
CREATE TABLE IF NOT EXISTS channels (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    slug        TEXT NOT NULL UNIQUE,
    description TEXT,
    is_active   INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL
);

-- Per-user, per-resource, per-month usage counters
CREATE TABLE IF NOT EXISTS usage_quotas (
    user_id  TEXT NOT NULL,
    resource TEXT NOT NULL,
    period   TEXT NOT NULL,
    used     INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (user_id, resource, period)
);

-- Per-user limit overrides (plan upgrades)
CREATE TABLE IF NOT EXISTS user_limits (
    user_id       TEXT NOT NULL,
    resource      TEXT NOT NULL,
    monthly_limit INTEGER NOT NULL,
    PRIMARY KEY (user_id, resource)
);

-- Video generation history
CREATE TABLE IF NOT EXISTS video_jobs (
    id             TEXT PRIMARY KEY,
    request_id     TEXT NOT NULL UNIQUE,
    user_id        TEXT NOT NULL,
    prompt         TEXT NOT NULL,
    base_image_url TEXT NOT NULL,
    status         TEXT NOT NULL,
    url            TEXT,
    progress       INTEGER NOT NULL DEFAULT 0,
    error          TEXT,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_video_jobs_user ON video_jobs(user_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Seed default sales channels",
            sql: r#"
INSERT OR IGNORE INTO channels (id, name, slug, description, is_active, created_at) VALUES
    ('ch-etsy',    'Etsy',    'etsy',    'Handmade and vintage marketplace', 1, '2025-01-01T00:00:00+00:00'),
    ('ch-shopify', 'Shopify', 'shopify', 'Your own storefront',              1, '2025-01-01T00:00:00+00:00'),
    ('ch-amazon',  'Amazon',  'amazon',  'Amazon Handmade and Marketplace',  1, '2025-01-01T00:00:00+00:00'),
    ('ch-ebay',    'eBay',    'ebay',    'Auction and fixed-price listings', 1, '2025-01-01T00:00:00+00:00');

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
