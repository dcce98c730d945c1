use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;
use sqlx::{
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use time::{OffsetDateTime, UtcOffset};
use uuid::Uuid;

static MIGRATOR: Migrator = sqlx::migrate!();

pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("bad DATABASE_URL {database_url:?}"))?
        .create_if_missing(true)
        .foreign_keys(true);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect_with(options)
        .await
        .context("unable to open database")?;

    MIGRATOR.run(&db_pool).await.context("unable to run migrations")?;
    Ok(db_pool)
}

/// A private in-memory database. Single connection, since every sqlite
/// connection to `:memory:` sees its own database.
pub async fn memory() -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    MIGRATOR.run(&db_pool).await?;
    Ok(db_pool)
}

pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Timestamps are stored as text, so keep them all in UTC to compare correctly.
pub fn utc(at: OffsetDateTime) -> OffsetDateTime {
    at.to_offset(UtcOffset::UTC)
}

pub const DEFAULT_PAGE: i64 = 50;
pub const MAX_PAGE: i64 = 200;

/// Keyset paging over UUIDv7 ids, which sort by creation time.
#[derive(Debug, Default, Deserialize)]
pub struct Page {
    pub before: Option<Uuid>,
    pub limit: Option<i64>,
}

impl Page {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE)
    }

    /// Upper bound for `id < ?`. The max UUID stands in for "no cursor".
    pub fn cursor(&self) -> Uuid {
        self.before.unwrap_or(Uuid::from_u128(u128::MAX))
    }
}
