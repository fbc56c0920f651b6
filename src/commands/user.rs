use crate::commands::Out;
use crate::error::{Error, ErrorType, IntoResult};
use crate::{Config, Result};

/// Creates a user, or renames an existing one. Users are otherwise managed outside of finviz;
/// this exists so an administrator can register the people who will upload spreadsheets.
pub async fn add_user(config: &Config, user_id: &str, name: &str) -> Result<Out<String>> {
    let user_id = user_id.trim();
    let name = name.trim();
    if user_id.is_empty() || name.is_empty() {
        return Err(Error::new(
            ErrorType::BadRequest,
            "A user needs a non-empty id and name",
        ));
    }
    config
        .db()
        .upsert_user(user_id, name)
        .await
        .pub_result(ErrorType::Storage)?;
    Ok(Out::new(
        format!("Saved user '{user_id}' ({name})"),
        user_id.to_string(),
    ))
}
