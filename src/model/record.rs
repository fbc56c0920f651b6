use crate::model::{Amount, Month, Year};
use serde::Serialize;

/// One usable row of an uploaded spreadsheet.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct ParsedRow {
    pub month: Month,
    pub amount: Amount,
}

impl ParsedRow {
    pub fn new(month: Month, amount: Amount) -> Self {
        Self { month, amount }
    }
}

/// A stored record as returned to the dashboard. `name` is the owning user's display name.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct FinancialRecord {
    pub record_id: i64,
    pub month: Month,
    pub amount: Amount,
    pub name: String,
}

/// The user portion of a `FinanceReport`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct UserName {
    pub name: String,
}

/// Everything the dashboard needs to render one user's year.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct FinanceReport {
    pub user: UserName,
    pub year: Year,
    /// Ordered January through December.
    pub records: Vec<FinancialRecord>,
}

/// The outcome of a successful upload.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    pub user_id: String,
    pub year: Year,
    pub records_processed: usize,
}
