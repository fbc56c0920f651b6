//! Shared test utilities for creating test environments and spreadsheets.
//!
//! This module is only compiled when running tests (`#[cfg(test)]`).

use crate::model::{FinancialRecord, Month, Year};
use crate::staging::StagedUpload;
use crate::Config;
use rust_decimal::Decimal;
use rust_xlsxwriter::Workbook;
use tempfile::TempDir;

/// Test environment that sets up a finviz home directory with Config and database.
/// Holds TempDir to keep the directory alive for the duration of the test.
pub struct TestEnv {
    _temp_dir: TempDir,
    config: Config,
}

impl TestEnv {
    /// Creates a test environment with an initialized database and the user `u1` named `Ada`.
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::create(temp_dir.path().join("finviz"))
            .await
            .unwrap();
        config.db().upsert_user("u1", "Ada").await.unwrap();
        Self {
            _temp_dir: temp_dir,
            config,
        }
    }

    /// Returns a clone of the Config.
    pub fn config(&self) -> Config {
        self.config.clone()
    }

    /// Stages an `.xlsx` built from `rows` in the uploads directory.
    pub async fn stage(&self, rows: &[&[Cell]]) -> StagedUpload {
        StagedUpload::write(self.config.uploads(), "year.xlsx", xlsx_bytes(rows))
            .await
            .unwrap()
    }

    /// Returns the stored records as `(month, amount)` pairs in the order they were returned.
    pub async fn records(&self, user_id: &str, year: u16) -> Vec<(Month, Decimal)> {
        let year = Year::new(year).unwrap();
        self.config
            .db()
            .records(user_id, year)
            .await
            .unwrap()
            .iter()
            .map(|r: &FinancialRecord| (r.month, r.amount.value()))
            .collect()
    }

    /// The number of files currently sitting in the uploads directory.
    pub fn staged_files(&self) -> usize {
        std::fs::read_dir(self.config.uploads()).unwrap().count()
    }
}

/// A cell of a spreadsheet fixture.
#[derive(Debug, Clone, Copy)]
pub enum Cell {
    Text(&'static str),
    Number(f64),
    Empty,
}

/// A two-column `Month`/`Amount` sheet body (header included) from `(month, amount)` pairs.
pub fn month_rows(rows: &[(&'static str, f64)]) -> Vec<Vec<Cell>> {
    let mut out = vec![vec![Cell::Text("Month"), Cell::Text("Amount")]];
    for (month, amount) in rows {
        out.push(vec![Cell::Text(month), Cell::Number(*amount)]);
    }
    out
}

/// Borrows a `Vec<Vec<Cell>>` in the shape `xlsx_bytes` and `TestEnv::stage` take.
pub fn as_rows(rows: &[Vec<Cell>]) -> Vec<&[Cell]> {
    rows.iter().map(Vec::as_slice).collect()
}

/// Builds an in-memory `.xlsx` workbook whose first worksheet holds `rows`.
pub fn xlsx_bytes(rows: &[&[Cell]]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            match cell {
                Cell::Text(s) => {
                    worksheet.write_string(r as u32, c as u16, *s).unwrap();
                }
                Cell::Number(n) => {
                    worksheet.write_number(r as u32, c as u16, *n).unwrap();
                }
                Cell::Empty => {}
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}
