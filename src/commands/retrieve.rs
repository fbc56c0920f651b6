use crate::commands::Out;
use crate::error::{Error, ErrorType, IntoResult};
use crate::model::{FinanceReport, UserName, Year};
use crate::{Config, Result};
use anyhow::Context;

pub(crate) const USER_NOT_FOUND: &str = "User not found";

/// Returns the user's display name and their records for `year`, ordered January through
/// December. A user with no records for the year gets an empty list.
///
/// # Errors
///
/// - `ErrorType::NotFound` if the user does not exist.
/// - `ErrorType::Storage` if the database cannot be read.
pub async fn retrieve(config: &Config, user_id: &str, year: Year) -> Result<Out<FinanceReport>> {
    let name = require_user(config, user_id).await?;
    let records = config
        .db()
        .records(user_id, year)
        .await
        .context("Failed to retrieve data")
        .pub_result(ErrorType::Storage)?;

    let message = format!("{} records for {name} in {year}", records.len());
    Ok(Out::new(
        message,
        FinanceReport {
            user: UserName { name },
            year,
            records,
        },
    ))
}

/// Returns the user's display name, or a `NotFound` error.
pub(crate) async fn require_user(config: &Config, user_id: &str) -> Result<String> {
    config
        .db()
        .user_name(user_id)
        .await
        .context("Failed to look up user")
        .pub_result(ErrorType::Storage)?
        .ok_or_else(|| Error::new(ErrorType::NotFound, USER_NOT_FOUND))
}
