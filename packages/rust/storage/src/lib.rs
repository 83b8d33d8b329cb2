//! libSQL storage layer for Snap2Listing.
//!
//! The [`Storage`] struct wraps a libSQL database holding sales channels,
//! usage quotas, per-user limit overrides, and video generation history.
//!
//! Quota enforcement goes through [`Storage::reserve_quota`], a single
//! conditional upsert, so concurrent requests from one user cannot exceed
//! their limit.

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use snap2listing_shared::{Channel, Result, Snap2ListingError, VideoJob, VideoStatus};
use uuid::Uuid;

/// Quota resource name for generated videos.
pub const VIDEO_RESOURCE: &str = "video";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

/// Current usage of a quota bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaUsage {
    /// Reservations made in the period.
    pub used: u32,
    /// Effective limit (per-user override, else the default).
    pub limit: u32,
}

impl QuotaUsage {
    /// Reservations left before the limit is hit.
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used)
    }
}

impl Storage {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Snap2ListingError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| Snap2ListingError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| Snap2ListingError::Storage(e.to_string()))?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        Snap2ListingError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Channel operations
    // -----------------------------------------------------------------------

    /// List all channels, ordered by display name (case-insensitive).
    pub async fn list_channels(&self) -> Result<Vec<Channel>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, slug, description, is_active, created_at
                 FROM channels ORDER BY name COLLATE NOCASE, id",
                params![],
            )
            .await
            .map_err(|e| Snap2ListingError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Snap2ListingError::Storage(e.to_string()))?
        {
            results.push(row_to_channel(&row)?);
        }
        Ok(results)
    }

    /// Insert a new channel. Fails if the slug is already taken.
    pub async fn insert_channel(
        &self,
        name: &str,
        slug: &str,
        description: Option<&str>,
    ) -> Result<Channel> {
        let channel = Channel {
            id: Uuid::now_v7().to_string(),
            name: name.to_string(),
            slug: slug.to_string(),
            description: description.map(String::from),
            is_active: true,
            created_at: Utc::now(),
        };

        self.conn
            .execute(
                "INSERT INTO channels (id, name, slug, description, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, 1, ?5)",
                params![
                    channel.id.as_str(),
                    channel.name.as_str(),
                    channel.slug.as_str(),
                    channel.description.as_deref(),
                    channel.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| Snap2ListingError::Storage(e.to_string()))?;

        tracing::info!(slug, "channel added");
        Ok(channel)
    }

    // -----------------------------------------------------------------------
    // Usage quota operations
    // -----------------------------------------------------------------------

    /// Atomically take one unit of `resource` for `user_id` in `period`.
    ///
    /// Returns `false` without changing anything when the effective limit
    /// (per-user override, else `default_limit`) is already used up.
    pub async fn reserve_quota(
        &self,
        user_id: &str,
        resource: &str,
        period: &str,
        default_limit: u32,
    ) -> Result<bool> {
        // The SELECT needs a WHERE clause for SQLite to parse the upsert.
        let changed = self
            .conn
            .execute(
                "INSERT INTO usage_quotas (user_id, resource, period, used)
                 SELECT ?1, ?2, ?3, 1
                 WHERE COALESCE(
                     (SELECT monthly_limit FROM user_limits WHERE user_id = ?1 AND resource = ?2),
                     ?4
                 ) > 0
                 ON CONFLICT(user_id, resource, period) DO UPDATE SET used = used + 1
                 WHERE usage_quotas.used < COALESCE(
                     (SELECT monthly_limit FROM user_limits WHERE user_id = ?1 AND resource = ?2),
                     ?4
                 )",
                params![user_id, resource, period, i64::from(default_limit)],
            )
            .await
            .map_err(|e| Snap2ListingError::Storage(e.to_string()))?;

        let reserved = changed > 0;
        tracing::debug!(user_id, resource, period, reserved, "quota reservation");
        Ok(reserved)
    }

    /// Give back one unit taken by [`Storage::reserve_quota`].
    pub async fn release_quota(&self, user_id: &str, resource: &str, period: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE usage_quotas SET used = used - 1
                 WHERE user_id = ?1 AND resource = ?2 AND period = ?3 AND used > 0",
                params![user_id, resource, period],
            )
            .await
            .map_err(|e| Snap2ListingError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Read the usage counter and effective limit for a quota bucket.
    pub async fn get_usage(
        &self,
        user_id: &str,
        resource: &str,
        period: &str,
        default_limit: u32,
    ) -> Result<QuotaUsage> {
        let mut rows = self
            .conn
            .query(
                "SELECT
                    COALESCE((SELECT used FROM usage_quotas
                              WHERE user_id = ?1 AND resource = ?2 AND period = ?3), 0),
                    COALESCE((SELECT monthly_limit FROM user_limits
                              WHERE user_id = ?1 AND resource = ?2), ?4)",
                params![user_id, resource, period, i64::from(default_limit)],
            )
            .await
            .map_err(|e| Snap2ListingError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let used: i64 = row
                    .get(0)
                    .map_err(|e| Snap2ListingError::Storage(e.to_string()))?;
                let limit: i64 = row
                    .get(1)
                    .map_err(|e| Snap2ListingError::Storage(e.to_string()))?;
                Ok(QuotaUsage {
                    used: used.max(0) as u32,
                    limit: limit.max(0) as u32,
                })
            }
            Ok(None) => Ok(QuotaUsage {
                used: 0,
                limit: default_limit,
            }),
            Err(e) => Err(Snap2ListingError::Storage(e.to_string())),
        }
    }

    /// Override the monthly limit of `resource` for one user (upserts).
    pub async fn set_user_limit(&self, user_id: &str, resource: &str, limit: u32) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO user_limits (user_id, resource, monthly_limit) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id, resource) DO UPDATE SET monthly_limit = excluded.monthly_limit",
                params![user_id, resource, i64::from(limit)],
            )
            .await
            .map_err(|e| Snap2ListingError::Storage(e.to_string()))?;

        tracing::info!(user_id, resource, limit, "user limit updated");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Video job operations
    // -----------------------------------------------------------------------

    /// Record a video job (upserts on `request_id`).
    pub async fn upsert_video_job(&self, job: &VideoJob) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO video_jobs (id, request_id, user_id, prompt, base_image_url, status, url, progress, error, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(request_id) DO UPDATE SET
                   status = excluded.status,
                   url = excluded.url,
                   progress = excluded.progress,
                   error = excluded.error,
                   updated_at = excluded.updated_at",
                params![
                    job.id.as_str(),
                    job.request_id.as_str(),
                    job.user_id.as_str(),
                    job.prompt.as_str(),
                    job.base_image_url.as_str(),
                    job.status.as_str(),
                    job.url.as_deref(),
                    i64::from(job.progress),
                    job.error.as_deref(),
                    job.created_at.to_rfc3339(),
                    job.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| Snap2ListingError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Look up a video job by its provider request id.
    pub async fn get_video_job(&self, request_id: &str) -> Result<Option<VideoJob>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, request_id, user_id, prompt, base_image_url, status, url, progress, error, created_at, updated_at
                 FROM video_jobs WHERE request_id = ?1",
                params![request_id],
            )
            .await
            .map_err(|e| Snap2ListingError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_video_job(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(Snap2ListingError::Storage(e.to_string())),
        }
    }
}

/// Parse an RFC 3339 timestamp column.
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Snap2ListingError::Storage(format!("invalid date: {e}")))
}

/// Convert a database row to a [`Channel`].
fn row_to_channel(row: &libsql::Row) -> Result<Channel> {
    Ok(Channel {
        id: row
            .get::<String>(0)
            .map_err(|e| Snap2ListingError::Storage(e.to_string()))?,
        name: row
            .get::<String>(1)
            .map_err(|e| Snap2ListingError::Storage(e.to_string()))?,
        slug: row
            .get::<String>(2)
            .map_err(|e| Snap2ListingError::Storage(e.to_string()))?,
        description: row.get::<String>(3).ok(),
        is_active: row.get::<i64>(4).unwrap_or(1) != 0,
        created_at: {
            let s: String = row
                .get(5)
                .map_err(|e| Snap2ListingError::Storage(e.to_string()))?;
            parse_timestamp(&s)?
        },
    })
}

/// Convert a database row to a [`VideoJob`].
fn row_to_video_job(row: &libsql::Row) -> Result<VideoJob> {
    let status: String = row
        .get(5)
        .map_err(|e| Snap2ListingError::Storage(e.to_string()))?;
    let created_at: String = row
        .get(9)
        .map_err(|e| Snap2ListingError::Storage(e.to_string()))?;
    let updated_at: String = row
        .get(10)
        .map_err(|e| Snap2ListingError::Storage(e.to_string()))?;

    Ok(VideoJob {
        id: row
            .get::<String>(0)
            .map_err(|e| Snap2ListingError::Storage(e.to_string()))?,
        request_id: row
            .get::<String>(1)
            .map_err(|e| Snap2ListingError::Storage(e.to_string()))?,
        user_id: row
            .get::<String>(2)
            .map_err(|e| Snap2ListingError::Storage(e.to_string()))?,
        prompt: row
            .get::<String>(3)
            .map_err(|e| Snap2ListingError::Storage(e.to_string()))?,
        base_image_url: row
            .get::<String>(4)
            .map_err(|e| Snap2ListingError::Storage(e.to_string()))?,
        status: status
            .parse::<VideoStatus>()
            .map_err(Snap2ListingError::Storage)?,
        url: row.get::<String>(6).ok(),
        progress: row.get::<i64>(7).unwrap_or(0).clamp(0, 100) as u8,
        error: row.get::<String>(8).ok(),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("s2l_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn sample_job(request_id: &str, status: VideoStatus) -> VideoJob {
        VideoJob {
            id: Uuid::now_v7().to_string(),
            request_id: request_id.into(),
            user_id: "user-1".into(),
            prompt: "slow pan across the mug".into(),
            base_image_url: "https://cdn.example.com/mug.png".into(),
            status,
            url: None,
            progress: 0,
            error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 2);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("s2l_test_{}.db", Uuid::now_v7()));
        let _s1 = Storage::open(&tmp).await.expect("first open");
        drop(_s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 2);
        assert_eq!(s2.list_channels().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn channels_sorted_by_name() {
        let storage = test_storage().await;
        storage
            .insert_channel("Ai Market", "ai-market", None)
            .await
            .expect("insert channel");

        let names: Vec<String> = storage
            .list_channels()
            .await
            .expect("list channels")
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Ai Market", "Amazon", "eBay", "Etsy", "Shopify"]);
    }

    #[tokio::test]
    async fn unreadable_channel_row_fails_the_listing() {
        let storage = test_storage().await;
        storage
            .conn
            .execute(
                "INSERT INTO channels (id, name, slug, description, is_active, created_at)
                 VALUES ('ch-bad', 'Broken', 'broken', NULL, 1, 'not a timestamp')",
                params![],
            )
            .await
            .expect("insert raw row");

        let err = storage.list_channels().await.unwrap_err();
        assert!(matches!(err, Snap2ListingError::Storage(_)), "{err}");
    }

    #[tokio::test]
    async fn duplicate_channel_slug_rejected() {
        let storage = test_storage().await;
        let result = storage.insert_channel("Etsy Again", "etsy", None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn reserve_until_limit() {
        let storage = test_storage().await;

        for _ in 0..3 {
            assert!(storage.reserve_quota("u1", VIDEO_RESOURCE, "2026-10", 3).await.unwrap());
        }
        assert!(!storage.reserve_quota("u1", VIDEO_RESOURCE, "2026-10", 3).await.unwrap());

        let usage = storage.get_usage("u1", VIDEO_RESOURCE, "2026-10", 3).await.unwrap();
        assert_eq!(usage, QuotaUsage { used: 3, limit: 3 });
        assert_eq!(usage.remaining(), 0);

        // A new month starts a fresh bucket
        assert!(storage.reserve_quota("u1", VIDEO_RESOURCE, "2026-11", 3).await.unwrap());
    }

    #[tokio::test]
    async fn zero_limit_never_reserves() {
        let storage = test_storage().await;
        assert!(!storage.reserve_quota("u1", VIDEO_RESOURCE, "2026-10", 0).await.unwrap());
        let usage = storage.get_usage("u1", VIDEO_RESOURCE, "2026-10", 0).await.unwrap();
        assert_eq!(usage.used, 0);
    }

    #[tokio::test]
    async fn user_override_beats_default() {
        let storage = test_storage().await;
        storage.set_user_limit("pro", VIDEO_RESOURCE, 5).await.unwrap();

        let mut granted = 0;
        for _ in 0..10 {
            if storage.reserve_quota("pro", VIDEO_RESOURCE, "2026-10", 1).await.unwrap() {
                granted += 1;
            }
        }
        assert_eq!(granted, 5);

        storage.set_user_limit("pro", VIDEO_RESOURCE, 6).await.unwrap();
        let usage = storage.get_usage("pro", VIDEO_RESOURCE, "2026-10", 1).await.unwrap();
        assert_eq!(usage.limit, 6);
        assert_eq!(usage.remaining(), 1);
    }

    #[tokio::test]
    async fn release_returns_unit() {
        let storage = test_storage().await;
        assert!(storage.reserve_quota("u1", VIDEO_RESOURCE, "2026-10", 1).await.unwrap());
        assert!(!storage.reserve_quota("u1", VIDEO_RESOURCE, "2026-10", 1).await.unwrap());

        storage.release_quota("u1", VIDEO_RESOURCE, "2026-10").await.unwrap();
        assert!(storage.reserve_quota("u1", VIDEO_RESOURCE, "2026-10", 1).await.unwrap());

        // Releasing an empty bucket never goes negative
        storage.release_quota("u2", VIDEO_RESOURCE, "2026-10").await.unwrap();
        let usage = storage.get_usage("u2", VIDEO_RESOURCE, "2026-10", 1).await.unwrap();
        assert_eq!(usage.used, 0);
    }

    #[tokio::test]
    async fn concurrent_reservations_respect_limit() {
        let storage = Arc::new(test_storage().await);

        let mut handles = Vec::new();
        for _ in 0..12 {
            let storage = storage.clone();
            handles.push(tokio::spawn(async move {
                storage
                    .reserve_quota("racer", VIDEO_RESOURCE, "2026-10", 4)
                    .await
                    .unwrap()
            }));
        }

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }
        assert_eq!(granted, 4);
    }

    #[tokio::test]
    async fn video_job_lifecycle() {
        let storage = test_storage().await;
        let mut job = sample_job("req-1", VideoStatus::Processing);
        storage.upsert_video_job(&job).await.expect("insert job");

        job.status = VideoStatus::Completed;
        job.url = Some("https://cdn.example.com/video.mp4".into());
        job.progress = 100;
        storage.upsert_video_job(&job).await.expect("update job");

        let found = storage.get_video_job("req-1").await.unwrap().unwrap();
        assert_eq!(found.status, VideoStatus::Completed);
        assert_eq!(found.progress, 100);
        assert_eq!(found.url.as_deref(), Some("https://cdn.example.com/video.mp4"));
        assert!(found.error.is_none());

        assert!(storage.get_video_job("missing").await.unwrap().is_none());
    }
}
