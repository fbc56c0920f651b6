//! Types that represent the core data model, such as `Month`, `Amount` and `FinancialRecord`.
mod amount;
mod period;
mod record;

pub use amount::{Amount, AmountError};
pub use period::{Month, MonthError, Year, YearError};
pub use record::{FinanceReport, FinancialRecord, ParsedRow, UploadSummary, UserName};
