//! This module is responsible for reading, writing and managing the SQLite database.
//!
//! `Db` owns a connection pool. It is cheap to clone and is handed explicitly to the upload and
//! retrieval operations; there is no process-wide connection.

mod migrations;

use crate::model::{Amount, FinancialRecord, Month, ParsedRow, Year};
use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

const MAX_CONNECTIONS: u32 = 8;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub(crate) struct Db {
    pool: SqlitePool,
}

impl Db {
    /// - Validates that no file currently exists at `path`
    /// - Creates a new SQLite file at `path`
    /// - Initializes the database schema
    pub(crate) async fn init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            bail!("A database already exists at '{}'", path.display());
        }
        let db = Self::connect(path, true).await?;
        migrations::migrate(&db.pool).await?;
        debug!("Created database at {}", path.display());
        Ok(db)
    }

    /// - Validates that there is a SQLite file at `path`
    /// - Updates the database schema with migrations if it is out-of-date
    pub(crate) async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            bail!("The database file is missing '{}'", path.display());
        }
        let db = Self::connect(path, false).await?;
        migrations::migrate(&db.pool).await?;
        Ok(db)
    }

    async fn connect(path: &Path, create: bool) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .context("Failed to parse SQLite connection string")?
            .create_if_missing(create)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open SQLite database at {}", path.display()))?;
        Ok(Self { pool })
    }

    /// Closes the pool and deletes the database at `path` along with its WAL files. Failures are
    /// logged, not returned.
    pub(crate) async fn remove(self, path: &Path) {
        self.pool.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let file = PathBuf::from(format!("{}{suffix}", path.display()));
            match tokio::fs::remove_file(&file).await {
                Ok(()) => debug!("Removed {}", file.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Unable to remove {}: {e}", file.display()),
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the user, or renames it if it already exists.
    pub(crate) async fn upsert_user(&self, user_id: &str, name: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (user_id, name) VALUES (?, ?) \
             ON CONFLICT (user_id) DO UPDATE SET name = excluded.name",
        )
        .bind(user_id)
        .bind(name)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to save user '{user_id}'"))?;
        Ok(())
    }

    /// Returns the display name of the user, or `None` if there is no such user.
    pub(crate) async fn user_name(&self, user_id: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT name FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to look up user '{user_id}'"))?;
        Ok(row.map(|(name,)| name))
    }

    /// Deletes every record for (`user_id`, `year`) and inserts `rows` in their place, all inside
    /// one transaction. If any statement fails the transaction is rolled back and the previous
    /// records are left exactly as they were.
    ///
    /// The `DELETE` is the first statement of the transaction, so it takes SQLite's write lock
    /// before anything else happens. Two uploads for the same key therefore run one after the
    /// other and readers only ever see the committed state before or after a replacement.
    pub(crate) async fn replace_records(
        &self,
        user_id: &str,
        year: Year,
        rows: &[ParsedRow],
    ) -> Result<usize> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        match write_records(&mut tx, user_id, year, rows).await {
            Ok(count) => {
                tx.commit().await.context("Failed to commit transaction")?;
                Ok(count)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!("Rollback failed after '{e:#}': {rollback}");
                }
                Err(e)
            }
        }
    }

    /// Returns the records for (`user_id`, `year`) in calendar order, each tagged with the owning
    /// user's display name.
    pub(crate) async fn records(&self, user_id: &str, year: Year) -> Result<Vec<FinancialRecord>> {
        let rows: Vec<(i64, String, String, String)> = sqlx::query_as(
            "SELECT r.record_id, r.month, r.amount, u.name \
             FROM financial_records r \
             JOIN users u ON r.user_id = u.user_id \
             WHERE r.user_id = ? AND r.year = ?",
        )
        .bind(user_id)
        .bind(i32::from(year.value()))
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to query records for '{user_id}' in {year}"))?;

        let mut records = rows
            .into_iter()
            .map(|(record_id, month, amount, name)| {
                let month = Month::from_str(&month)
                    .with_context(|| format!("Bad month stored in record {record_id}"))?;
                let amount = Decimal::from_str(&amount)
                    .with_context(|| format!("Bad amount stored in record {record_id}"))?;
                Ok(FinancialRecord {
                    record_id,
                    month,
                    amount: Amount::new(amount),
                    name,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        records.sort_by_key(|r| r.month.ordinal());
        Ok(records)
    }
}

async fn write_records(
    conn: &mut SqliteConnection,
    user_id: &str,
    year: Year,
    rows: &[ParsedRow],
) -> Result<usize> {
    let deleted = sqlx::query("DELETE FROM financial_records WHERE user_id = ? AND year = ?")
        .bind(user_id)
        .bind(i32::from(year.value()))
        .execute(&mut *conn)
        .await
        .context("Failed to delete existing records")?
        .rows_affected();
    debug!("Deleted {deleted} existing records for '{user_id}' in {year}");

    for row in rows {
        sqlx::query(
            "INSERT INTO financial_records (user_id, year, month, amount) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(i32::from(year.value()))
        .bind(row.month.to_string())
        .bind(row.amount.value().to_string())
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Failed to insert the {} record", row.month))?;
    }
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn row(month: Month, amount: &str) -> ParsedRow {
        ParsedRow::new(month, Amount::from_str(amount).unwrap())
    }

    fn year() -> Year {
        Year::new(2024).unwrap()
    }

    async fn test_db() -> (TempDir, Db) {
        let dir = TempDir::new().unwrap();
        let db = Db::init(dir.path().join("finviz.sqlite")).await.unwrap();
        db.upsert_user("u1", "Ada").await.unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn test_init_refuses_existing_file() {
        let (dir, _db) = test_db().await;
        assert!(Db::init(dir.path().join("finviz.sqlite")).await.is_err());
    }

    #[tokio::test]
    async fn test_remove_deletes_the_database() {
        let (dir, db) = test_db().await;
        let path = dir.path().join("finviz.sqlite");
        db.remove(&path).await;
        assert!(!path.exists());
        assert!(Db::init(&path).await.is_ok());
    }

    #[tokio::test]
    async fn test_load_requires_existing_file() {
        let dir = TempDir::new().unwrap();
        assert!(Db::load(dir.path().join("missing.sqlite")).await.is_err());
    }

    #[tokio::test]
    async fn test_load_existing_database() {
        let (dir, db) = test_db().await;
        drop(db);
        let db = Db::load(dir.path().join("finviz.sqlite")).await.unwrap();
        assert_eq!(db.user_name("u1").await.unwrap().as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn test_user_name() {
        let (_dir, db) = test_db().await;
        assert_eq!(db.user_name("u1").await.unwrap().as_deref(), Some("Ada"));
        assert!(db.user_name("nobody").await.unwrap().is_none());
        db.upsert_user("u1", "Ada Lovelace").await.unwrap();
        assert_eq!(
            db.user_name("u1").await.unwrap().as_deref(),
            Some("Ada Lovelace")
        );
    }

    #[tokio::test]
    async fn test_records_are_in_calendar_order() {
        let (_dir, db) = test_db().await;
        let rows = vec![
            row(Month::December, "12"),
            row(Month::April, "4"),
            row(Month::August, "8"),
            row(Month::February, "2"),
        ];
        assert_eq!(db.replace_records("u1", year(), &rows).await.unwrap(), 4);

        let months: Vec<Month> = db
            .records("u1", year())
            .await
            .unwrap()
            .iter()
            .map(|r| r.month)
            .collect();
        assert_eq!(
            months,
            vec![Month::February, Month::April, Month::August, Month::December]
        );
    }

    #[tokio::test]
    async fn test_replace_does_not_touch_other_years() {
        let (_dir, db) = test_db().await;
        let other = Year::new(2023).unwrap();
        db.replace_records("u1", other, &[row(Month::May, "5")])
            .await
            .unwrap();
        db.replace_records("u1", year(), &[row(Month::June, "6")])
            .await
            .unwrap();
        db.replace_records("u1", year(), &[row(Month::July, "7")])
            .await
            .unwrap();

        let this_year = db.records("u1", year()).await.unwrap();
        assert_eq!(this_year.len(), 1);
        assert_eq!(this_year[0].month, Month::July);
        assert_eq!(this_year[0].name, "Ada");
        assert_eq!(db.records("u1", other).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_rolls_back_on_constraint_failure() {
        let (_dir, db) = test_db().await;
        db.replace_records("u1", year(), &[row(Month::May, "5")])
            .await
            .unwrap();

        // The unique constraint fails on the second insert.
        let dupes = vec![row(Month::June, "1"), row(Month::June, "2")];
        assert!(db.replace_records("u1", year(), &dupes).await.is_err());

        let records = db.records("u1", year()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].month, Month::May);
        assert_eq!(records[0].amount.value(), Decimal::from(5));
    }

    #[tokio::test]
    async fn test_amounts_round_trip_exactly() {
        let (_dir, db) = test_db().await;
        let rows = vec![row(Month::January, "100.5"), row(Month::March, "-20")];
        db.replace_records("u1", year(), &rows).await.unwrap();
        let records = db.records("u1", year()).await.unwrap();
        assert_eq!(records[0].amount.value(), Decimal::from_str("100.5").unwrap());
        assert_eq!(records[1].amount.value(), Decimal::from(-20));
    }
}
