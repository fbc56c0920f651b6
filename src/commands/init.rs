use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::utils;
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the home directory with a default `config.json`, an `uploads` staging directory and an
/// empty, fully migrated SQLite database. When `frontend` is given it is stored, as an absolute
/// path, as the dashboard directory `serve` will use.
///
/// # Errors
/// - Returns an error if the home directory already holds a config file, if `frontend` does not
///   exist, or if any file or database operation fails.
pub async fn init(finviz_home: &Path, frontend: Option<&Path>) -> Result<Out<()>> {
    let frontend = match frontend {
        Some(dir) => Some(
            utils::canonicalize(dir)
                .await
                .context("The dashboard directory does not exist")
                .pub_result(ErrorType::Config)?,
        ),
        None => None,
    };
    let config = Config::create_with_frontend(finviz_home, frontend)
        .await
        .context("Unable to create the finviz home directory and config")
        .pub_result(ErrorType::Config)?;
    Ok(format!(
        "Successfully created the finviz home directory at {}",
        config.root().display()
    )
    .into())
}
