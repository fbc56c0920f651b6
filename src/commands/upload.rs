use crate::commands::retrieve::require_user;
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::import;
use crate::model::{UploadSummary, Year};
use crate::staging::StagedUpload;
use crate::{Config, Result};
use anyhow::Context;
use tracing::{debug, info};

pub(crate) const UPLOAD_SUCCESS: &str = "File processed successfully";

/// Replaces a user's records for `year` with the rows of an uploaded spreadsheet.
///
/// The steps are:
/// 1. Check that the user exists.
/// 2. Parse the first worksheet of `staged` into `(Month, Amount)` rows, skipping rows that have
///    no recognizable month or no numeric amount.
/// 3. In one transaction, delete the user's records for `year` and insert the parsed rows.
///
/// The staged file is removed before this function returns, whatever the outcome.
///
/// # Errors
///
/// - `ErrorType::NotFound` if the user does not exist. Nothing is written.
/// - `ErrorType::InvalidFormat` if the spreadsheet lacks the `Month` and `Amount` columns or has
///   no usable rows. Nothing is written.
/// - `ErrorType::Storage` if the transaction fails. It is rolled back and the previous records
///   remain.
pub async fn upload(
    config: &Config,
    user_id: &str,
    year: Year,
    staged: StagedUpload,
) -> Result<Out<UploadSummary>> {
    let result = process(config, user_id, year, &staged).await;
    staged.discard();
    result
}

async fn process(
    config: &Config,
    user_id: &str,
    year: Year,
    staged: &StagedUpload,
) -> Result<Out<UploadSummary>> {
    require_user(config, user_id).await?;

    debug!(
        "Parsing '{}' ({} bytes) for '{user_id}' in {year}",
        staged.original_name(),
        staged.len()
    );
    let path = staged.path().to_path_buf();
    let rows = blocking(move || import::parse_workbook(&path)).await?;

    let records_processed = config
        .db()
        .replace_records(user_id, year, &rows)
        .await
        .context("Failed to process file")
        .pub_result(ErrorType::Storage)?;

    info!("Replaced the {year} records of '{user_id}' with {records_processed} rows");
    Ok(Out::new(
        UPLOAD_SUCCESS,
        UploadSummary {
            user_id: user_id.to_string(),
            year,
            records_processed,
        },
    ))
}

/// Runs `f` on the blocking pool. A task that panics or is cancelled is an `Internal` error.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("The spreadsheet parsing task failed")
        .pub_result(ErrorType::Internal)?
}
