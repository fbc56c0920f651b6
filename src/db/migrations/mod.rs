//! Versioned schema for the finviz database.
//!
//! `schema_NN.sql` moves the schema from version `NN-1` to `NN`. Scripts only ever move forward
//! and each one runs in its own transaction together with the bump of `schema_version`.

use anyhow::{bail, Context, Result};
use sqlx::{Executor, SqliteConnection, SqlitePool};
use tracing::{debug, info};

/// Schema scripts in version order; the script at index `i` produces version `i + 1`.
const SCHEMA: &[&str] = &[include_str!("schema_01.sql")];

/// The schema version this build of finviz expects.
pub(crate) const CURRENT_VERSION: i32 = SCHEMA.len() as i32;

/// Brings the database up to `CURRENT_VERSION` and returns the version it started at. A database
/// written by a newer finviz is refused untouched.
pub(crate) async fn migrate(pool: &SqlitePool) -> Result<i32> {
    bootstrap(pool).await?;
    let found = current_version(pool).await?;
    if found > CURRENT_VERSION {
        bail!(
            "The database schema version {found} is newer than this program supports \
            ({CURRENT_VERSION})"
        );
    }
    if found == CURRENT_VERSION {
        debug!("Database already at schema version {found}");
        return Ok(found);
    }

    for (version, sql) in (1..).zip(SCHEMA).skip(found as usize) {
        debug!("Applying schema {version:02}");
        apply(pool, sql, version)
            .await
            .with_context(|| format!("Failed to apply schema {version:02}"))?;
    }
    info!("Upgraded the database schema from version {found} to {CURRENT_VERSION}");
    Ok(found)
}

async fn bootstrap(pool: &SqlitePool) -> Result<()> {
    sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
        .execute(pool)
        .await
        .context("Failed to create schema_version table")?;
    sqlx::query(
        "INSERT INTO schema_version (version) \
         SELECT 0 WHERE NOT EXISTS (SELECT 1 FROM schema_version)",
    )
    .execute(pool)
    .await
    .context("Failed to insert initial schema version")?;
    Ok(())
}

async fn current_version(pool: &SqlitePool) -> Result<i32> {
    let (version,): (Option<i32>,) = sqlx::query_as("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await
        .context("Failed to query schema version")?;
    Ok(version.unwrap_or_default())
}

async fn apply(pool: &SqlitePool, sql: &str, version: i32) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    (&mut *tx).execute(sql).await.context("Schema SQL failed")?;
    set_version(&mut tx, version).await?;
    tx.commit().await.context("Failed to commit transaction")
}

async fn set_version(conn: &mut SqliteConnection, version: i32) -> Result<()> {
    sqlx::query("UPDATE schema_version SET version = ?")
        .bind(version)
        .execute(&mut *conn)
        .await
        .context("Failed to update schema_version")?;
    Ok(())
}
